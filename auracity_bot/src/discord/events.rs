use std::num::NonZeroU16;

use anyhow::{Context as _, Result};
use poise::serenity_prelude as serenity;
use tracing::{event, field, info_span, Instrument, Level};

use auracity_common::prelude::*;
use auracity_storage::prelude::*;

use crate::spam::SpamTracker;
use crate::ServerData;

type FrameworkContext<'a> = poise::FrameworkContext<'a, ServerData, anyhow::Error>;

const BOT_BAN_REASON: &str = "Bot accounts are not allowed.";

/// Messages posted when a member joins.
#[derive(Debug, PartialEq, Eq)]
pub struct Greeting {
    pub welcome: String,
    pub join_log: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JoinAction {
    /// The event belongs to a guild we don't manage.
    Ignore,
    BanBot,
    Welcome,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SpamAction {
    /// The guild owner is never kicked.
    Spare,
    Kick { reason: String },
}

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: FrameworkContext<'_>,
    data: &ServerData,
) -> Result<()> {
    let outcome = match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            event!(Level::INFO, "{} is connected to {} guilds", data_about_bot.user.name, data_about_bot.guilds.len());
            Ok(())
        }
        serenity::FullEvent::CacheReady { guilds } => {
            log_guilds(ctx, guilds);
            Ok(())
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            let span = info_span!("auracity.discord.member_join", user_id = %new_member.user.id);
            member_joined(ctx, data, new_member).instrument(span).await
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => member_left(data, *guild_id, user),
        serenity::FullEvent::Message { new_message } => message_sent(ctx, data, new_message).await,
        _ => Ok(()),
    };

    // Handled here so a failing event never reaches the framework.
    if let Err(error) = outcome {
        report_failure(data, &error, event.snake_case_name()).await;
    }

    Ok(())
}

/// Log the error, save a crash report and tell the staff in the error log channel.
pub async fn report_failure(data: &ServerData, error: &anyhow::Error, context: &str) {
    event!(Level::ERROR, ?error, "Error during {}", context);

    if let Err(report_error) = data.crash_reporter.save_error(error, context).await {
        event!(Level::ERROR, ?report_error, "Could not save crash report");
    }

    let notice = format!("An error occurred during {}: {}", context, error);
    if let Err(queue_error) = data.queue.enqueue(data.config.channels.error_logs, notice) {
        event!(Level::ERROR, %queue_error, "Could not announce the error");
    }
}

fn log_guilds(ctx: &serenity::Context, guilds: &[serenity::GuildId]) {
    for guild_id in guilds {
        match ctx.cache.guild(*guild_id) {
            Some(guild) => event!(Level::INFO, guild_id = %guild_id, members = guild.member_count, "Serving guild {}", guild.name),
            None => event!(Level::WARN, guild_id = %guild_id, "Guild missing from the cache"),
        }
    }
}

pub fn is_community_guild(config: &BotConfig, guild_id: serenity::GuildId) -> bool {
    guild_id.get() == config.guild_id.get()
}

pub fn join_action(config: &BotConfig, guild_id: serenity::GuildId, is_bot: bool) -> JoinAction {
    if !is_community_guild(config, guild_id) {
        JoinAction::Ignore
    } else if is_bot {
        JoinAction::BanBot
    } else {
        JoinAction::Welcome
    }
}

async fn member_joined(ctx: &serenity::Context, data: &ServerData, member: &serenity::Member) -> Result<()> {
    let user = &member.user;

    match join_action(&data.config, member.guild_id, user.bot) {
        JoinAction::Ignore => return Ok(()),
        JoinAction::BanBot => {
            event!(Level::WARN, "Banning bot account {}", user.name);
            member.ban_with_reason(ctx, 0, BOT_BAN_REASON).await
                .with_context(|| format!("Error banning bot account {}", user.id))?;

            return Ok(());
        }
        JoinAction::Welcome => {}
    }

    let greeting = register_member(&data.db_pool, user.id, user.discriminator).await?;
    let channels = &data.config.channels;

    data.queue.enqueue(channels.welcome, greeting.welcome)?;
    data.queue.enqueue(channels.join_logs, greeting.join_log)?;

    Ok(())
}

/// Store the member unless we have seen them before and pick the matching greeting.
pub async fn register_member(pool: &SqlitePool, user: serenity::UserId, discriminator: Option<NonZeroU16>) -> Result<Greeting> {
    let repo = User::repository(pool);
    let returning = repo.exists(user.get()).await?;

    if !returning {
        let discriminator = discriminator
            .map(|d| d.get().to_string())
            .unwrap_or_else(|| "0".to_string());

        event!(Level::DEBUG, "Storing new member {}", user);
        repo.insert(&User::new(user.get(), discriminator)).await?;
    }

    Ok(greeting(user, returning))
}

fn member_left(data: &ServerData, guild_id: serenity::GuildId, user: &serenity::User) -> Result<()> {
    if !is_community_guild(&data.config, guild_id) {
        return Ok(());
    }

    data.queue.enqueue(data.config.channels.leave_logs, leave_notice(user.id, &user.name))?;

    Ok(())
}

async fn message_sent(ctx: &serenity::Context, data: &ServerData, message: &serenity::Message) -> Result<()> {
    let Some(guild_id) = message.guild_id else {
        return Ok(());
    };

    let limit = {
        let mut spam = data.spam.lock().await;

        match check_spam(&mut spam, message) {
            Some(limit) => limit,
            None => return Ok(()),
        }
    };

    let span = info_span!("auracity.discord.spam", user_id = %message.author.id, kicked = field::Empty);
    kick_spammer(ctx, message, guild_id, limit).instrument(span).await
}

/// Count the message at the time it was sent. When the author went over the limit their history
/// is cleared and the limit is returned.
pub fn check_spam(tracker: &mut SpamTracker, message: &serenity::Message) -> Option<usize> {
    if message.guild_id.is_none() || message.author.bot {
        return None;
    }

    let author = message.author.id;
    if !tracker.record(author, *message.timestamp) {
        return None;
    }

    tracker.clear(author);
    Some(tracker.max_messages())
}

pub fn spam_action(author: serenity::UserId, owner: serenity::UserId, limit: usize) -> SpamAction {
    if author == owner {
        SpamAction::Spare
    } else {
        SpamAction::Kick { reason: spam_reason(limit) }
    }
}

async fn kick_spammer(ctx: &serenity::Context, message: &serenity::Message, guild_id: serenity::GuildId, limit: usize) -> Result<()> {
    let author = message.author.id;
    let span = tracing::Span::current();

    let owner = guild_owner(ctx, guild_id).await?;
    let reason = match spam_action(author, owner, limit) {
        SpamAction::Spare => {
            span.record("kicked", false);
            event!(Level::WARN, "The guild owner triggered the spam filter");
            return Ok(());
        }
        SpamAction::Kick { reason } => reason,
    };

    let dm = serenity::CreateMessage::new().content(format!("You were kicked from the server. {}", reason));
    if let Err(error) = message.author.dm(ctx, dm).await {
        event!(Level::DEBUG, %error, "Could not DM the kicked member");
    }

    guild_id.kick_with_reason(ctx, author, &reason).await
        .with_context(|| format!("Error kicking spammer {}", author))?;

    span.record("kicked", true);
    event!(Level::INFO, "Kicked {} for spamming", message.author.name);

    Ok(())
}

async fn guild_owner(ctx: &serenity::Context, guild_id: serenity::GuildId) -> Result<serenity::UserId> {
    let cached = guild_id.to_guild_cached(ctx).map(|guild| guild.owner_id);

    match cached {
        Some(owner) => Ok(owner),
        None => {
            let guild = guild_id.to_partial_guild(ctx).await
                .with_context(|| format!("Error fetching guild {}", guild_id))?;

            Ok(guild.owner_id)
        }
    }
}

pub fn greeting(user: serenity::UserId, returning: bool) -> Greeting {
    let mention = serenity::Mention::from(user);

    if returning {
        Greeting {
            welcome: format!("Welcome back, {}!", mention),
            join_log: format!("{} joined the server (returning).", mention),
        }
    } else {
        Greeting {
            welcome: format!("Welcome to the server, {}!", mention),
            join_log: format!("{} joined the server (first time).", mention),
        }
    }
}

pub fn leave_notice(user: serenity::UserId, name: &str) -> String {
    format!("{} ({}) has left the server.", serenity::Mention::from(user), name)
}

pub fn spam_reason(limit: usize) -> String {
    format!("Spam detected: more than {} messages in a short time.", limit)
}
