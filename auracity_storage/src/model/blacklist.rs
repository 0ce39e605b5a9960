use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{event, Level};

use crate::db::{execute_for_user, from_db_id, to_db_id, DiscordId, Repo, Repository};

const INSERT_QUERY: &str = "INSERT INTO blacklist (discord_id, reason) VALUES (?, ?) RETURNING id;";

const GET_ONE_QUERY: &str = "SELECT * FROM blacklist WHERE discord_id = ? ORDER BY id LIMIT 1";

const DELETE_QUERY: &str = "DELETE FROM blacklist WHERE discord_id = ?;";

/// A user that may not apply to any faction.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BlacklistEntry {
    pub id: i64,
    pub discord_id: DiscordId,
    pub reason: String,
}

pub type BlacklistRepo<'r> = Repo<'r, BlacklistEntry>;

impl BlacklistEntry {
    pub fn new(discord_id: DiscordId, reason: impl Into<String>) -> Self {
        Self { id: 0, discord_id, reason: reason.into() }
    }

    pub fn repository(pool: &SqlitePool) -> BlacklistRepo {
        Repo::new(pool)
    }
}

#[async_trait]
impl<'r> Repository<BlacklistEntry, DiscordId> for BlacklistRepo<'r> {
    async fn insert(&self, entity: &BlacklistEntry) -> Result<i64> {
        event!(Level::TRACE, "Blacklisting {:?}", entity);

        let mut trans = self.pool.begin().await?;

        let row = sqlx::query(INSERT_QUERY)
            .bind(to_db_id(entity.discord_id)?)
            .bind(&entity.reason)
            .fetch_one(&mut *trans).await.with_context(|| format!("Error blacklisting {}", entity.discord_id))?;

        trans.commit().await?;
        Ok(row.try_get(0)?)
    }

    async fn delete(&self, discord_id: DiscordId) -> Result<u64> {
        event!(Level::TRACE, "Removing {} from the blacklist", discord_id);

        execute_for_user(self.pool, DELETE_QUERY, discord_id).await
            .with_context(|| format!("Error removing {} from the blacklist", discord_id))
    }

    async fn get(&self, discord_id: DiscordId) -> Result<Option<BlacklistEntry>> {
        let entity = sqlx::query_as::<_, BlacklistEntity>(GET_ONE_QUERY)
            .bind(to_db_id(discord_id)?)
            .fetch_optional(self.pool).await.with_context(|| "Error getting blacklist entry")?;

        match entity {
            Some(entity) => Ok(Some(entity.try_into()?)),
            None => {
                event!(Level::DEBUG, "Blacklist entry for {} not found", discord_id);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BlacklistEntity {
    pub id: i64,
    pub discord_id: i64,
    pub reason: String,
}

impl TryFrom<BlacklistEntity> for BlacklistEntry {
    type Error = anyhow::Error;

    fn try_from(value: BlacklistEntity) -> Result<Self> {
        Ok(Self { id: value.id, discord_id: from_db_id(value.discord_id)?, reason: value.reason })
    }
}
