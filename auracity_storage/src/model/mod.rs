//! All models for the bot

/// Members that have been seen on the guild
pub mod user;

/// Bans issued by the moderation team
pub mod ban;

/// Users that are not allowed to apply
pub mod blacklist;

/// Leave of absence records
pub mod deregistration;

/// Complaints filed against users
pub mod complaint;

#[cfg(test)]
mod tests;
