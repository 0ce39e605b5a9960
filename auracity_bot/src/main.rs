use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use poise::serenity_prelude as serenity;
use tokio::sync::Mutex;
use tracing::*;

use auracity_common::prelude::*;
use auracity_storage::prelude::*;

use crate::crash::CrashReporter;
use crate::discord::{commands, events};
use crate::healthchecks::perform_healthchecks;
use crate::job::{job_scheduler, JobArgs};
use crate::queue::MessageQueue;
use crate::spam::SpamTracker;
use crate::status::StatusPoller;

mod archive;
mod crash;
mod discord;
mod healthchecks;
mod job;
mod logging;
mod queue;
mod spam;
mod status;
#[cfg(test)]
mod test_support;

pub struct ServerData {
    pub db_pool: SqlitePool,
    pub config: BotConfig,
    pub queue: MessageQueue,
    pub status: Arc<StatusPoller>,
    pub crash_reporter: CrashReporter,
    pub spam: Mutex<SpamTracker>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config_file_path = args.config;

    // Load application config
    let config = BotConfig::from_env_and_file(&config_file_path)
        .with_context(|| format!("Error reading configuration from {}", config_file_path))?;

    let _log_guards = logging::init(&config.logging, config.dev_mode)?;
    event!(Level::DEBUG, %config_file_path, "Configuration loaded");

    match args.command {
        Some(Commands::Healthcheck) => {
            let checks_output = perform_healthchecks(&config).await?;
            println!("{}", checks_output);
            return Ok(());
        }
        Some(Commands::Backup) => {
            let db_pool = db::setup(&config.storage.database_url).await
                .with_context(|| "Error setting up database connection")?;
            let path = backup_database(&db_pool, &config.storage.backup_prefix, Local::now()).await?;
            println!("{}", path.display());
            return Ok(());
        }
        None => {}
    }

    // Db Setup
    event!(Level::DEBUG, "Database setup");
    let db_pool = db::setup(&config.storage.database_url).await
        .with_context(|| "Error setting up database connection")?;

    let status = Arc::new(StatusPoller::new(config.fivem.clone())
        .with_context(|| "Error building the status poller")?);
    let crash_reporter = CrashReporter::new(&config.logging.crash_dir)?;
    let spam = Mutex::new(SpamTracker::new(
        std::time::Duration::from_secs(config.spam.window_secs),
        config.spam.max_messages,
    ));

    // Discord setup
    event!(Level::DEBUG, "Discord client setup");

    let discord_config = config.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![commands::clear(), commands::backup_database(), commands::status()],
            event_handler: |ctx, event, framework, data| {
                Box::pin(events::event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(commands::on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                for guild_id in discord_config.command_guilds() {
                    event!(Level::INFO, %guild_id, "Registering slash commands");
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, serenity::GuildId::from(guild_id)).await
                        .with_context(|| format!("Error registering commands in guild {}", guild_id))?;
                }

                let queue = MessageQueue::spawn(ctx.http.clone(), discord_config.queue.rate_per_second, discord_config.queue.batch_size)?;

                // Set up background scheduling
                event!(Level::INFO, "Setting up background jobs");
                let job_args = Arc::new(JobArgs {
                    db_pool: db_pool.clone(),
                    config: discord_config.clone(),
                    discord: ctx.clone(),
                    queue: queue.clone(),
                    status: status.clone(),
                });
                job_scheduler(discord::jobs::all(&discord_config), job_args);

                Ok(ServerData { db_pool, config: discord_config, queue, status, crash_reporter, spam })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::GUILD_MEMBERS
        | serenity::GatewayIntents::MESSAGE_CONTENT;
    let mut discord_client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework).await
        .with_context(|| "Error creating Discord client")?;

    let shard_manager = discord_client.shard_manager.clone();

    tokio::select! {
        discord_result = discord_client.start_autosharded() => {
            if let Err(discord_error) = discord_result {
                event!(Level::ERROR, "{:?}", &discord_error);
                return Err(anyhow::Error::new(discord_error).context("Discord client stopped"));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            event!(Level::INFO, "Shutting down");
            shard_manager.shutdown_all().await;
        }
    }

    Ok(())
}
