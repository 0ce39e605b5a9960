use anyhow::Result;
use chrono::Local;
use poise::serenity_prelude as serenity;
use tracing::{event, Level};

use crate::discord::events::report_failure;
use crate::discord::Context;
use crate::status::presence_text;
use crate::ServerData;

pub const NO_PERMISSION: &str = "You do not have the required permissions to use this command.";
const GENERIC_FAILURE: &str = "Something went wrong. The team has been notified.";

/// Delete recent messages in this channel. Pinned messages are kept.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    default_member_permissions = "MANAGE_MESSAGES"
)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "How many messages to delete (1 to 100)"]
    #[min = 1]
    #[max = 100]
    amount: u8,
) -> Result<()> {
    if !(1..=100).contains(&amount) {
        ctx.send(poise::CreateReply::default().content(usage_hint("clear")).ephemeral(true)).await?;
        return Ok(());
    }

    ctx.defer_ephemeral().await?;

    let channel = ctx.channel_id();
    let messages = channel.messages(ctx, serenity::GetMessages::new().limit(amount)).await?;

    let mut cleared = 0;
    for message in messages.iter().filter(|message| !message.pinned) {
        channel.delete_message(ctx, message.id).await?;
        cleared += 1;
    }

    event!(Level::INFO, channel_id = %channel, requested = amount, "Cleared {} messages", cleared);
    ctx.say(format!("Successfully cleared {} messages.", cleared)).await?;

    Ok(())
}

/// Write a database backup right now.
#[poise::command(
    slash_command,
    required_permissions = "ADMINISTRATOR",
    default_member_permissions = "ADMINISTRATOR"
)]
pub async fn backup_database(ctx: Context<'_>) -> Result<()> {
    ctx.defer_ephemeral().await?;

    let data = ctx.data();
    let path = auracity_storage::backup::backup_database(&data.db_pool, &data.config.storage.backup_prefix, Local::now()).await?;

    let name = path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    ctx.say(format!("Backup created successfully: {}", name)).await?;

    Ok(())
}

/// Show whether the game server is up and how many players are on it.
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<()> {
    let poller = &ctx.data().status;

    let snapshot = match poller.cached().await {
        Some(snapshot) => snapshot,
        None => poller.refresh().await,
    };

    ctx.say(format!("{} (checked at {})", presence_text(&snapshot), snapshot.checked_at.format("%H:%M UTC"))).await?;

    Ok(())
}

/// Replies for the errors users can fix themselves, crash reports for everything the commands
/// themselves fail at.
pub async fn on_error(error: poise::FrameworkError<'_, ServerData, anyhow::Error>) {
    match error {
        poise::FrameworkError::MissingUserPermissions { ctx, .. } => {
            reply_ephemeral(ctx, NO_PERMISSION).await;
        }
        poise::FrameworkError::ArgumentParse { ctx, error, .. } => {
            event!(Level::DEBUG, %error, "Invalid arguments for {}", ctx.command().name);
            reply_ephemeral(ctx, &usage_hint(&ctx.command().name)).await;
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            report_failure(ctx.data(), &error, &ctx.command().name).await;
            reply_ephemeral(ctx, GENERIC_FAILURE).await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                event!(Level::ERROR, ?e, "Error while handling a framework error");
            }
        }
    }
}

async fn reply_ephemeral(ctx: Context<'_>, content: &str) {
    let reply = poise::CreateReply::default().content(content).ephemeral(true);

    if let Err(e) = ctx.send(reply).await {
        event!(Level::ERROR, ?e, "Error sending error reply");
    }
}

pub fn usage_hint(command: &str) -> String {
    match command {
        "clear" => "Please provide the amount of messages you would like to clear (1 to 100).".to_string(),
        other => format!("Invalid arguments for /{}.", other),
    }
}
