use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{event, Level};

use crate::db::{execute_for_user, from_db_id, to_db_id, DiscordId, Repo, Repository};

const INSERT_QUERY: &str = r#"INSERT INTO complaints
(discord_id, message, category, complaint)
VALUES(?, ?, ?, ?) RETURNING id;"#;

const GET_ONE_QUERY: &str = "SELECT * FROM complaints WHERE discord_id = ? ORDER BY id LIMIT 1";

const DELETE_QUERY: &str = "DELETE FROM complaints WHERE discord_id = ?;";

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Complaint {
    pub id: i64,
    /// The member the complaint was filed by.
    pub discord_id: DiscordId,
    pub message: String,
    pub category: String,
    /// Content of the message the complaint refers to, if it could be captured.
    pub complaint: Option<String>,
}

pub type ComplaintRepo<'r> = Repo<'r, Complaint>;

impl Complaint {
    pub fn repository(pool: &SqlitePool) -> ComplaintRepo {
        Repo::new(pool)
    }
}

#[async_trait]
impl<'r> Repository<Complaint, DiscordId> for ComplaintRepo<'r> {
    async fn insert(&self, entity: &Complaint) -> Result<i64> {
        event!(Level::TRACE, "Adding complaint {:?}", entity);

        let mut trans = self.pool.begin().await?;

        let row = sqlx::query(INSERT_QUERY)
            .bind(to_db_id(entity.discord_id)?)
            .bind(&entity.message)
            .bind(&entity.category)
            .bind(entity.complaint.as_deref())
            .fetch_one(&mut *trans).await.with_context(|| format!("Error saving complaint for {}", entity.discord_id))?;

        trans.commit().await?;
        Ok(row.try_get(0)?)
    }

    async fn delete(&self, discord_id: DiscordId) -> Result<u64> {
        execute_for_user(self.pool, DELETE_QUERY, discord_id).await
            .with_context(|| format!("Error deleting complaints of {}", discord_id))
    }

    async fn get(&self, discord_id: DiscordId) -> Result<Option<Complaint>> {
        let entity = sqlx::query_as::<_, ComplaintEntity>(GET_ONE_QUERY)
            .bind(to_db_id(discord_id)?)
            .fetch_optional(self.pool).await.with_context(|| "Error getting complaint")?;

        match entity {
            Some(entity) => Ok(Some(entity.try_into()?)),
            None => {
                event!(Level::DEBUG, "Complaint for {} not found", discord_id);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ComplaintEntity {
    pub id: i64,
    pub discord_id: i64,
    pub message: String,
    pub category: String,
    pub complaint: Option<String>,
}

impl TryFrom<ComplaintEntity> for Complaint {
    type Error = anyhow::Error;

    fn try_from(value: ComplaintEntity) -> Result<Self> {
        Ok(Self {
            id: value.id,
            discord_id: from_db_id(value.discord_id)?,
            message: value.message,
            category: value.category,
            complaint: value.complaint,
        })
    }
}
