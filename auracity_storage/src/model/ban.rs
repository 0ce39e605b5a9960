use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{event, Level};

use crate::db::{execute_for_user, from_db_id, to_db_id, DiscordId, Repo, Repository};

const INSERT_QUERY: &str = "INSERT INTO bans (discord_id, reason) VALUES (?, ?) RETURNING id;";

const GET_ONE_QUERY: &str = "SELECT * FROM bans WHERE discord_id = ? ORDER BY id LIMIT 1";

const DELETE_QUERY: &str = "DELETE FROM bans WHERE discord_id = ?;";

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Ban {
    pub id: i64,
    pub discord_id: DiscordId,
    pub reason: String,
}

pub type BanRepo<'r> = Repo<'r, Ban>;

impl Ban {
    pub fn new(discord_id: DiscordId, reason: impl Into<String>) -> Self {
        Self { id: 0, discord_id, reason: reason.into() }
    }

    /// Create a `Ban` repository that connects to the database with the borrowed pool.
    pub fn repository(pool: &SqlitePool) -> BanRepo {
        Repo::new(pool)
    }
}

#[async_trait]
impl<'r> Repository<Ban, DiscordId> for BanRepo<'r> {

    /// Records a ban. The user does not have to be stored.
    async fn insert(&self, entity: &Ban) -> Result<i64> {
        event!(Level::TRACE, "Adding ban {:?}", entity);

        let mut trans = self.pool.begin().await?;

        let row = sqlx::query(INSERT_QUERY)
            .bind(to_db_id(entity.discord_id)?)
            .bind(&entity.reason)
            .fetch_one(&mut *trans).await.with_context(|| format!("Error saving ban for {}", entity.discord_id))?;

        trans.commit().await?;
        Ok(row.try_get(0)?)
    }

    async fn delete(&self, discord_id: DiscordId) -> Result<u64> {
        event!(Level::TRACE, "Deleting bans of {}", discord_id);

        execute_for_user(self.pool, DELETE_QUERY, discord_id).await
            .with_context(|| format!("Error deleting bans of {}", discord_id))
    }

    async fn get(&self, discord_id: DiscordId) -> Result<Option<Ban>> {
        event!(Level::TRACE, "Retrieving ban of {}", discord_id);

        let entity = sqlx::query_as::<_, BanEntity>(GET_ONE_QUERY)
            .bind(to_db_id(discord_id)?)
            .fetch_optional(self.pool).await.with_context(|| "Error getting ban")?;

        match entity {
            Some(entity) => Ok(Some(entity.try_into()?)),
            None => {
                event!(Level::DEBUG, "Ban for {} not found", discord_id);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BanEntity {
    pub id: i64,
    pub discord_id: i64,
    pub reason: String,
}

impl TryFrom<BanEntity> for Ban {
    type Error = anyhow::Error;

    fn try_from(value: BanEntity) -> Result<Self> {
        Ok(Self { id: value.id, discord_id: from_db_id(value.discord_id)?, reason: value.reason })
    }
}
