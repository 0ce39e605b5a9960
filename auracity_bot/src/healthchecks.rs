use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{event, Level};

use auracity_common::prelude::*;
use auracity_storage::prelude::*;

use crate::status::StatusPoller;

#[derive(Serialize, Debug)]
pub struct HealthCheck {
    pub time: i64,
    pub check_type: CheckType,
    pub success: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub enum CheckType {
    Database,
    FivemServer,
}

pub async fn perform_healthchecks(config: &BotConfig) -> Result<String> {
    event!(Level::DEBUG, "Performing health checks");

    let checks = vec![database_check(config).await, fivem_check(config).await];

    let result = serde_json::to_string_pretty(&checks)
        .with_context(|| "Error serializing health check json")?;
    Ok(result)
}

async fn database_check(config: &BotConfig) -> HealthCheck {
    let db_check_start = Utc::now();
    event!(Level::TRACE, %db_check_start, "Starting DB Health check");

    let success = match db::setup(&config.storage.database_url).await {
        Ok(pool) => pool.acquire().await.is_ok(),
        Err(error) => {
            event!(Level::DEBUG, ?error, "Database setup failed");
            false
        }
    };

    let db_check_end = Utc::now();
    event!(Level::TRACE, %db_check_end, "Finished DB Health check");

    HealthCheck {
        check_type: CheckType::Database,
        time: (db_check_end - db_check_start).num_milliseconds(),
        success,
    }
}

async fn fivem_check(config: &BotConfig) -> HealthCheck {
    let fivem_check_start = Utc::now();
    event!(Level::TRACE, %fivem_check_start, "Starting FiveM Health check");

    let success = match StatusPoller::new(config.fivem.clone()) {
        Ok(poller) => poller.server_online().await,
        Err(error) => {
            event!(Level::DEBUG, ?error, "Could not build the status poller");
            false
        }
    };

    let fivem_check_end = Utc::now();
    event!(Level::TRACE, %fivem_check_end, "Finished FiveM Health check");

    HealthCheck {
        check_type: CheckType::FivemServer,
        time: (fivem_check_end - fivem_check_start).num_milliseconds(),
        success,
    }
}
