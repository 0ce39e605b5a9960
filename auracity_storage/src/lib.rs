//! All things storage for the bot.

extern crate tracing;

/// All the storage models
pub mod model;

/// Database access
pub mod db;

/// Database backups
pub mod backup;

/// auracity_storage prelude
pub mod prelude {
    pub use sqlx::SqlitePool;

    pub use crate::backup::backup_database;
    pub use crate::db::{self, DiscordId, Repository};
    pub use crate::model::{self, ban::Ban, blacklist::BlacklistEntry, complaint::Complaint, deregistration::Deregistration, user::User};
}
