/**
 AuraCity_common
 */

pub mod cli;
pub mod config;

/// AuraCity common prelude
pub mod prelude {
    pub use clap::Parser;

    pub use crate::config::{BotConfig, ChannelConfig, FivemConfig, LoggingConfig, QueueConfig, SpamConfig, StorageConfig};
    pub use crate::cli::Args;
    pub use crate::cli::Commands;
}
