use std::num::NonZeroU64;
use std::path::PathBuf;

use auracity_common::prelude::*;
use auracity_storage::prelude::*;

/// A complete configuration with made up ids and a local server address.
pub(crate) fn test_config() -> BotConfig {
    let id = |value: u64| NonZeroU64::new(value).expect("test ids are nonzero");

    BotConfig {
        discord_token: "test-token".into(),
        dev_mode: false,
        guild_id: id(1),
        log_guild_id: None,
        presence_interval_secs: 120,
        channels: ChannelConfig {
            welcome: id(1000),
            join_logs: id(1001),
            leave_logs: id(1002),
            error_logs: id(1003),
            backup_logs: None,
            server_status: None,
        },
        fivem: FivemConfig {
            server_url: "http://127.0.0.1:30120/info.json".into(),
            players_url: "http://127.0.0.1:30120/players.json".into(),
            info_url: "http://127.0.0.1:30120/info.json".into(),
            dynamic_url: "http://127.0.0.1:30120/dynamic.json".into(),
            poll_interval_secs: 300,
            snapshot_refresh_secs: 86_400,
            cache_dir: PathBuf::from("cache"),
        },
        storage: StorageConfig {
            database_url: "sqlite::memory:".into(),
            backup_prefix: PathBuf::from("backups/auracity"),
        },
        logging: LoggingConfig::default(),
        queue: QueueConfig::default(),
        spam: SpamConfig::default(),
    }
}

pub(crate) async fn memory_pool() -> SqlitePool {
    db::setup("sqlite::memory:").await.expect("in-memory database should open")
}
