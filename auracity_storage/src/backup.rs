use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, TimeZone};
use sqlx::SqlitePool;
use tracing::{event, instrument, Level};

const BACKUP_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Path of the backup taken at `now`: `{prefix}_{YYYYmmdd_HHMMSS}.db`.
pub fn backup_path<Tz>(prefix: &Path, now: &DateTime<Tz>) -> PathBuf
    where Tz: TimeZone,
    Tz::Offset: std::fmt::Display
{
    let mut file: OsString = prefix.as_os_str().to_owned();
    file.push(format!("_{}.db", now.format(BACKUP_TIMESTAMP)));

    PathBuf::from(file)
}

/// Write a consistent copy of the database next to `prefix`.
///
/// Uses `VACUUM INTO`, so the copy is taken on the shared connection and never sees a half-written
/// transaction. Refuses to overwrite an existing file.
#[instrument(skip(pool, now))]
pub async fn backup_database<Tz>(pool: &SqlitePool, prefix: &Path, now: DateTime<Tz>) -> Result<PathBuf>
    where Tz: TimeZone,
    Tz::Offset: std::fmt::Display
{
    let target = backup_path(prefix, &now);

    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        bail!("Backup {} already exists", target.display());
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await
            .with_context(|| format!("Error creating backup directory {}", parent.display()))?;
    }

    let target_str = target.to_str()
        .ok_or_else(|| anyhow!("Backup path {} is not valid UTF-8", target.display()))?;

    event!(Level::DEBUG, "Backing up database to {}", target_str);

    sqlx::query("VACUUM INTO ?")
        .bind(target_str)
        .execute(pool).await
        .with_context(|| format!("Error backing up database to {}", target_str))?;

    event!(Level::INFO, "Database backed up successfully to {}", target_str);

    Ok(target)
}
