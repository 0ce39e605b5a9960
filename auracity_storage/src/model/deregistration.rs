use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{event, Level};

use crate::db::{execute_for_user, from_db_id, to_db_id, DiscordId, Repo, Repository};

const INSERT_QUERY: &str = r#"INSERT INTO deregistrations
(discord_id, time_stamp, deregistration_count, reason, message)
VALUES(?, ?, ?, ?, ?) RETURNING id;"#;

const GET_ONE_QUERY: &str = "SELECT * FROM deregistrations WHERE discord_id = ? ORDER BY id LIMIT 1";

const DELETE_QUERY: &str = "DELETE FROM deregistrations WHERE discord_id = ?;";

/// A member signing off for a while, e.g. on holiday.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Deregistration {
    pub id: i64,
    pub discord_id: DiscordId,
    pub time_stamp: DateTime<Utc>,
    /// How many times this member has deregistered so far.
    pub deregistration_count: u32,
    pub reason: String,
    pub message: String,
}

pub type DeregistrationRepo<'r> = Repo<'r, Deregistration>;

impl Deregistration {
    pub fn repository(pool: &SqlitePool) -> DeregistrationRepo {
        Repo::new(pool)
    }
}

#[async_trait]
impl<'r> Repository<Deregistration, DiscordId> for DeregistrationRepo<'r> {
    async fn insert(&self, entity: &Deregistration) -> Result<i64> {
        event!(Level::TRACE, "Adding deregistration {:?}", entity);

        let mut trans = self.pool.begin().await?;

        let row = sqlx::query(INSERT_QUERY)
            .bind(to_db_id(entity.discord_id)?)
            .bind(entity.time_stamp)
            .bind(i64::from(entity.deregistration_count))
            .bind(&entity.reason)
            .bind(&entity.message)
            .fetch_one(&mut *trans).await.with_context(|| format!("Error saving deregistration for {}", entity.discord_id))?;

        trans.commit().await?;
        Ok(row.try_get(0)?)
    }

    async fn delete(&self, discord_id: DiscordId) -> Result<u64> {
        event!(Level::TRACE, "Deleting deregistrations of {}", discord_id);

        execute_for_user(self.pool, DELETE_QUERY, discord_id).await
            .with_context(|| format!("Error deleting deregistrations of {}", discord_id))
    }

    async fn get(&self, discord_id: DiscordId) -> Result<Option<Deregistration>> {
        let entity = sqlx::query_as::<_, DeregistrationEntity>(GET_ONE_QUERY)
            .bind(to_db_id(discord_id)?)
            .fetch_optional(self.pool).await.with_context(|| "Error getting deregistration")?;

        match entity {
            Some(entity) => Ok(Some(entity.try_into().with_context(|| "Error converting entity to deregistration")?)),
            None => {
                event!(Level::DEBUG, "Deregistration for {} not found", discord_id);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeregistrationEntity {
    pub id: i64,
    pub discord_id: i64,
    pub time_stamp: DateTime<Utc>,
    pub deregistration_count: i64,
    pub reason: String,
    pub message: String,
}

impl TryFrom<DeregistrationEntity> for Deregistration {
    type Error = anyhow::Error;

    fn try_from(value: DeregistrationEntity) -> Result<Self> {
        Ok(Self {
            id: value.id,
            discord_id: from_db_id(value.discord_id)?,
            time_stamp: value.time_stamp,
            deregistration_count: value.deregistration_count.try_into()?,
            reason: value.reason,
            message: value.message,
        })
    }
}
