use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{event, Level};

use crate::db::{execute_for_user, from_db_id, to_db_id, DiscordId, Repo, Repository};

const INSERT_QUERY: &str = "INSERT INTO users (discord_id, discriminator) VALUES (?, ?) RETURNING id;";

const GET_ONE_QUERY: &str = "SELECT * FROM users WHERE discord_id = ?";

const EXISTS_QUERY: &str = "SELECT EXISTS(SELECT 1 FROM users WHERE discord_id = ?)";

const DELETE_QUERY: &str = "DELETE FROM users WHERE discord_id = ?;";

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct User {
    pub id: i64,
    pub discord_id: DiscordId,
    /// The legacy `#1234` tag, `"0"` for accounts on the new username system.
    pub discriminator: String,
}

pub type UserRepo<'r> = Repo<'r, User>;

impl User {
    pub fn new(discord_id: DiscordId, discriminator: impl Into<String>) -> Self {
        Self { id: 0, discord_id, discriminator: discriminator.into() }
    }

    /// Create a `User` repository that connects to the database with the borrowed pool.
    pub fn repository(pool: &SqlitePool) -> UserRepo {
        Repo::new(pool)
    }
}

impl<'r> UserRepo<'r> {
    /// Check whether we have seen this user before.
    pub async fn exists(&self, discord_id: DiscordId) -> Result<bool> {
        event!(Level::TRACE, "Checking if user {} exists", discord_id);

        let exists: i64 = sqlx::query_scalar(EXISTS_QUERY)
            .bind(to_db_id(discord_id)?)
            .fetch_one(self.pool).await.with_context(|| "Error checking for user")?;

        Ok(exists != 0)
    }
}

#[async_trait]
impl<'r> Repository<User, DiscordId> for UserRepo<'r> {

    /// Inserts a user and returns the row id. Inserting a known discord id is an error.
    async fn insert(&self, entity: &User) -> Result<i64> {
        event!(Level::TRACE, "Adding user {:?}", entity);
        let db_ent = UserEntity::try_from(entity)?;

        let mut trans = self.pool.begin().await?;

        let row = sqlx::query(INSERT_QUERY)
            .bind(db_ent.discord_id)
            .bind(db_ent.discriminator)
            .fetch_one(&mut *trans).await.with_context(|| format!("Error saving user {}", entity.discord_id))?;

        trans.commit().await?;
        Ok(row.try_get(0)?)
    }

    async fn delete(&self, discord_id: DiscordId) -> Result<u64> {
        event!(Level::TRACE, "Deleting user {}", discord_id);

        execute_for_user(self.pool, DELETE_QUERY, discord_id).await
            .with_context(|| format!("Error deleting user {}", discord_id))
    }

    async fn get(&self, discord_id: DiscordId) -> Result<Option<User>> {
        event!(Level::TRACE, "Retrieving user {}", discord_id);

        if let Some(entity) = sqlx::query_as::<_, UserEntity>(GET_ONE_QUERY)
                .bind(to_db_id(discord_id)?)
                .fetch_optional(self.pool).await.with_context(|| "Error getting user")? {
            Ok(Some(entity.try_into().with_context(|| "Error converting entity to user")?))
        } else {
            event!(Level::DEBUG, "User {} not found", discord_id);
            Ok(None)
        }
    }
}

/// Row shape of the `users` table
#[derive(Debug, sqlx::FromRow)]
struct UserEntity {
    pub id: i64,
    pub discord_id: i64,
    pub discriminator: String,
}

impl TryFrom<&User> for UserEntity {
    type Error = anyhow::Error;

    fn try_from(value: &User) -> Result<Self> {
        Ok(Self { id: value.id, discord_id: to_db_id(value.discord_id)?, discriminator: value.discriminator.clone() })
    }
}

impl TryFrom<UserEntity> for User {
    type Error = anyhow::Error;

    fn try_from(value: UserEntity) -> Result<Self> {
        Ok(Self { id: value.id, discord_id: from_db_id(value.discord_id)?, discriminator: value.discriminator })
    }
}
