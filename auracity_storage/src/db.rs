use std::marker::PhantomData;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{event, instrument, Level};

/// A Discord snowflake as used by the domain models.
pub type DiscordId = u64;

/// Create a database connection and run any pending migrations.
///
/// The pool holds exactly one connection. Every repository call acquires it for the duration of
/// its statement or transaction, so reads and writes never interleave.
#[instrument]
pub async fn setup(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("Invalid database url {}", url))?
        .create_if_missing(true)
        // the tables are independent, references to users are not enforced
        .foreign_keys(false);

    let filename = options.clone().get_filename();
    if let Some(parent) = filename.parent() {
        if !parent.as_os_str().is_empty() {
            event!(Level::DEBUG, "Making sure database directory {} exists", parent.display());
            tokio::fs::create_dir_all(parent).await
                .with_context(|| format!("Error creating database directory {}", parent.display()))?;
        }
    }

    event!(Level::DEBUG, "Connecting to the database");
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options).await.with_context(|| "Error connecting to database")?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let migrations = sqlx::migrate!("migrations/sqlite");

    event!(Level::DEBUG, "Running any pending migrations");
    migrations.run(pool).await.with_context(|| "Error applying migrations")?;

    Ok(())
}

/// Repository over the rows of one model, borrowing the shared pool.
pub struct Repo<'r, E>
{
    pub(crate) pool: &'r SqlitePool,
    entity: PhantomData<E>,
}

impl<'r, E> Repo<'r, E> {
    pub(crate) fn new(pool: &'r SqlitePool) -> Self {
        Self { pool, entity: PhantomData }
    }
}

#[async_trait]
/// Basic repository interface
pub trait Repository<E, I>
    where I: Sized
{
    /// Insert a record and return its row id.
    async fn insert(&self, entity: &E) -> Result<i64>;
    /// Delete every record matching `id` and return how many were removed.
    async fn delete(&self, id: I) -> Result<u64>;
    /// Get the first record matching `id`.
    async fn get(&self, id: I) -> Result<Option<E>>;
}

/// Snowflakes are unsigned, SQLite integers are signed.
pub(crate) fn to_db_id(id: DiscordId) -> Result<i64> {
    i64::try_from(id).with_context(|| format!("Discord id {} does not fit in the database", id))
}

pub(crate) fn from_db_id(id: i64) -> Result<DiscordId> {
    DiscordId::try_from(id).with_context(|| format!("Stored discord id {} is negative", id))
}

/// Run a statement bound to a single discord id inside a transaction, returning the affected rows.
pub(crate) async fn execute_for_user(pool: &SqlitePool, query: &str, discord_id: DiscordId) -> Result<u64> {
    let mut trans = pool.begin().await.with_context(|| "Error starting transaction")?;

    let result = sqlx::query(query)
        .bind(to_db_id(discord_id)?)
        .execute(&mut *trans).await?;

    trans.commit().await.with_context(|| "Error committing transaction")?;

    Ok(result.rows_affected())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    setup("sqlite::memory:").await.expect("in-memory database should open")
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn setup_creates_the_database_directory() -> Result<()> {
        let dir = TempDir::new()?;
        let file = dir.path().join("data").join("auracity.db");

        let pool = setup(&format!("sqlite://{}", file.display())).await?;
        pool.close().await;

        assert!(file.is_file());
        Ok(())
    }
}
