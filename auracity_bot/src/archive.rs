use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{event, instrument, Level};

const BACKUP_PREFIX: &str = "backup_";

/// Copy the current log files into a new timestamped directory under `backup_dir`, then drop the
/// oldest archives until `keep` remain.
#[instrument]
pub async fn backup_logs(log_dir: &Path, backup_dir: &Path, keep: usize, now: DateTime<Local>) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(log_dir).await
        .with_context(|| format!("Error reading log directory {}", log_dir.display()))?;

    let target = backup_dir.join(format!("{}{}", BACKUP_PREFIX, now.format("%Y-%m-%d_%H-%M-%S")));
    tokio::fs::create_dir_all(&target).await
        .with_context(|| format!("Error creating log backup {}", target.display()))?;

    let mut copied = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        tokio::fs::copy(entry.path(), target.join(entry.file_name())).await
            .with_context(|| format!("Error copying {}", entry.path().display()))?;
        copied += 1;
    }

    event!(Level::INFO, "Archived {} log files to {}", copied, target.display());

    prune_backups(backup_dir, keep.max(1)).await?;

    Ok(target)
}

async fn prune_backups(backup_dir: &Path, keep: usize) -> Result<()> {
    let mut backups = Vec::new();
    let mut entries = tokio::fs::read_dir(backup_dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let is_backup = entry.file_name().to_string_lossy().starts_with(BACKUP_PREFIX);

        if is_backup && entry.file_type().await?.is_dir() {
            backups.push(entry.path());
        }
    }

    // timestamps sort chronologically by name
    backups.sort();

    let excess = backups.len().saturating_sub(keep);
    for old in backups.into_iter().take(excess) {
        event!(Level::DEBUG, "Removing old log backup {}", old.display());
        tokio::fs::remove_dir_all(&old).await
            .with_context(|| format!("Error removing old log backup {}", old.display()))?;
    }

    Ok(())
}
