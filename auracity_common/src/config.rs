//! Everything used to handle the application configuration.
//!
//! Create a new configuration as follows:
//! ```no_run
//! use auracity_common::prelude::*;
//! let config = BotConfig::from_env().unwrap();
//! // or when you want to use a file and only overwrite from env
//! let config = BotConfig::from_env_and_file("../.config/config.toml").unwrap();
//! ```

use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{event, Level};

pub use figment::Error;
use figment::{providers::{Env, Format, Toml}, Figment};

/// The application configuration.
///
/// You can use [from_env()](#from_env) or [from_env_and_file(path: &str)](#from_env_and_file) to create a configuration.
///
/// Settings:
/// * `discord_token`: `String` (environment only)
/// * `dev_mode`: `bool`
/// * `guild_id`: `NonZeroU64`
/// * `log_guild_id`: `Option<NonZeroU64>`
/// * `presence_interval_secs`: `u64`
/// * `channels`, `fivem`, `storage`, `logging`, `queue`, `spam`: see the section structs
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct BotConfig {
    /// The Discord API token. For security reasons this can only be set from the environment.
    pub discord_token: String,
    /// Development mode enables verbose logging.
    #[serde(default)]
    pub dev_mode: bool,
    /// The community guild.
    pub guild_id: NonZeroU64,
    /// The guild holding the log channels, when it is not the community guild.
    #[serde(default)]
    pub log_guild_id: Option<NonZeroU64>,
    /// How often the presence line is refreshed.
    #[serde(default = "default_presence_interval")]
    pub presence_interval_secs: u64,
    pub channels: ChannelConfig,
    pub fivem: FivemConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub spam: SpamConfig,
}

/// Channels the bot posts to.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct ChannelConfig {
    pub welcome: NonZeroU64,
    pub join_logs: NonZeroU64,
    pub leave_logs: NonZeroU64,
    pub error_logs: NonZeroU64,
    #[serde(default)]
    pub backup_logs: Option<NonZeroU64>,
    #[serde(default)]
    pub server_status: Option<NonZeroU64>,
}

/// Endpoints of the FiveM server that gets polled.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct FivemConfig {
    /// Liveness endpoint. A 200 means the server is up.
    pub server_url: String,
    /// Returns a JSON array with one entry per connected player.
    pub players_url: String,
    pub info_url: String,
    pub dynamic_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Minimum age of the info and dynamic snapshots before they are downloaded again.
    #[serde(default = "default_snapshot_refresh")]
    pub snapshot_refresh_secs: u64,
    /// Where the downloaded snapshots are written.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
pub struct StorageConfig {
    /// Usual format: `sqlite://data/auracity.db`
    pub database_url: String,
    /// Path stem of database backups, a timestamp and `.db` get appended.
    pub backup_prefix: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub crash_dir: PathBuf,
    /// Number of rotated log files and of log archives to keep.
    pub keep_backups: usize,
    /// Default filter directive, `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("cache/logs"),
            backup_dir: PathBuf::from("resources/backups/logs_backup"),
            crash_dir: PathBuf::from("cache/crash_report"),
            keep_backups: 5,
            level: "info".into(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct QueueConfig {
    pub rate_per_second: u32,
    pub batch_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { rate_per_second: 1, batch_size: 5 }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct SpamConfig {
    pub window_secs: u64,
    pub max_messages: usize,
}

impl Default for SpamConfig {
    fn default() -> Self {
        Self { window_secs: 60, max_messages: 5 }
    }
}

fn default_presence_interval() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    300
}

fn default_snapshot_refresh() -> u64 {
    86_400
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

const ENV_PREFIX: &str = "AURACITY_";
const ENV_SEPARATOR: &str = "__";

impl BotConfig {
    /// Create a configuration just from environment variables.
    ///
    /// This will read all variables prefixed with `AURACITY_` and try to serialize them into a `BotConfig`.
    /// Nested keys are separated by a double underscore, e.g. `AURACITY_CHANNELS__WELCOME`.
    #[allow(dead_code)]
    #[tracing::instrument]
    pub fn from_env() -> Result<Self, Error> {
        let figment = Figment::new()
            .merge(env_provider());

        figment.extract()
    }

    /// Create a configuration from the environment variables and the indicated file.
    ///
    /// The file is prioritised. You can use the environment variables to overwrite certain file values.
    ///
    /// For more info about how the environment variables are read, see [from_env()](#from_env).
    #[tracing::instrument]
    pub fn from_env_and_file(path: &str) -> Result<Self, Error> {
        event!(
            Level::DEBUG,
            "Building configuration from environment and file {}",
            path
        );

        let file_figment = Figment::new()
            .merge(Toml::file_exact(path));

        if file_figment.extract_inner::<String>("discord_token").is_ok() {
            return Err(Error::from("Setting the discord token is not allowed from a config file"));
        }

        file_figment.merge(env_provider()).extract()
    }

    /// The guilds slash commands get registered in.
    pub fn command_guilds(&self) -> Vec<NonZeroU64> {
        let mut guilds = vec![self.guild_id];

        if let Some(log_guild) = self.log_guild_id.filter(|g| *g != self.guild_id) {
            guilds.push(log_guild);
        }

        guilds
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_secs(self.presence_interval_secs)
    }
}

impl FivemConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn snapshot_refresh(&self) -> Duration {
        Duration::from_secs(self.snapshot_refresh_secs)
    }
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR)
}
