use std::time::Duration;

use chrono::{Local, Utc};
use poise::async_trait;
use poise::serenity_prelude::ActivityData;
use tracing::{event, Level};

use auracity_common::prelude::*;
use auracity_storage::prelude::*;

use crate::archive;
use crate::job::{Job, JobArgs, JobResult, Schedule};
use crate::status::presence_text;

struct DatabaseBackupJob;

#[async_trait]
impl Job for DatabaseBackupJob {
    fn name(&self) -> &'static str {
        "database_backup"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Daily
    }

    fn run_at_startup(&self) -> bool {
        true
    }

    async fn run(&self, args: &JobArgs) -> JobResult {
        let path = backup_database(&args.db_pool, &args.config.storage.backup_prefix, Local::now()).await?;

        if let Some(channel) = args.config.channels.backup_logs {
            args.queue.enqueue(channel, format!("Database backup created: {}", path.display()))?;
        }

        Ok(())
    }
}

struct LogArchiveJob;

#[async_trait]
impl Job for LogArchiveJob {
    fn name(&self) -> &'static str {
        "log_archive"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Daily
    }

    async fn run(&self, args: &JobArgs) -> JobResult {
        let logging = &args.config.logging;
        archive::backup_logs(&logging.log_dir, &logging.backup_dir, logging.keep_backups, Local::now()).await?;

        Ok(())
    }
}

struct PresenceJob {
    interval: Duration,
}

#[async_trait]
impl Job for PresenceJob {
    fn name(&self) -> &'static str {
        "presence"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn run(&self, args: &JobArgs) -> JobResult {
        let previous = args.status.cached().await;
        let snapshot = args.status.refresh().await;

        args.discord.set_activity(Some(ActivityData::watching(presence_text(&snapshot))));

        let went_up_or_down = previous.is_some_and(|previous| previous.online != snapshot.online);
        if let (true, Some(channel)) = (went_up_or_down, args.config.channels.server_status) {
            event!(Level::INFO, online = snapshot.online, "Server status changed");
            args.queue.enqueue(channel, status_change_notice(snapshot.online))?;
        }

        Ok(())
    }
}

struct ServerPollJob {
    interval: Duration,
}

#[async_trait]
impl Job for ServerPollJob {
    fn name(&self) -> &'static str {
        "server_poll"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn run(&self, args: &JobArgs) -> JobResult {
        let written = args.status.poll_and_download(Utc::now()).await;
        event!(Level::DEBUG, "Saved {} server snapshots", written.len());

        Ok(())
    }
}

pub fn status_change_notice(online: bool) -> &'static str {
    if online {
        "The server is back online."
    } else {
        "The server went offline."
    }
}

/// Every background job of the bot.
pub fn all(config: &BotConfig) -> Vec<Box<dyn Job>> {
    vec![
        Box::new(DatabaseBackupJob),
        Box::new(LogArchiveJob),
        Box::new(PresenceJob { interval: config.presence_interval() }),
        Box::new(ServerPollJob { interval: config.fivem.poll_interval() }),
    ]
}
