//! Polling of the FiveM game server.
//!
//! The poller answers two questions, whether the server is up and how many players are on it,
//! and keeps local copies of the server's JSON endpoints in the cache directory.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{event, instrument, Level};

use auracity_common::prelude::*;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const PLAYERS_FILE: &str = "fivem_players.json";
const INFO_FILE: &str = "fivem_info.json";
const DYNAMIC_FILE: &str = "fivem_dynamic.json";

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    UnexpectedStatus { url: String, status: StatusCode },
    #[error("{url} did not return valid JSON")]
    InvalidJson {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{url} did not return a JSON array")]
    NotAnArray { url: String },
    #[error("Could not write snapshot {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of one status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub online: bool,
    pub players: usize,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SnapshotDownloads {
    info: Option<DateTime<Utc>>,
    dynamic: Option<DateTime<Utc>>,
}

pub struct StatusPoller {
    client: Client,
    config: FivemConfig,
    cache: RwLock<Option<StatusSnapshot>>,
    downloads: Mutex<SnapshotDownloads>,
}

impl StatusPoller {
    pub fn new(config: FivemConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self::with_client(config, client))
    }

    fn with_client(config: FivemConfig, client: Client) -> Self {
        Self {
            client,
            config,
            cache: RwLock::new(None),
            downloads: Mutex::new(SnapshotDownloads::default()),
        }
    }

    /// A 200 from the liveness endpoint means online, anything else means offline.
    pub async fn server_online(&self) -> bool {
        match self.client.get(&self.config.server_url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(error) => {
                event!(Level::DEBUG, %error, "Server liveness check failed");
                false
            }
        }
    }

    /// Number of connected players, 0 when the server is down or the answer is unusable.
    pub async fn player_count(&self) -> usize {
        if !self.server_online().await {
            return 0;
        }

        match self.fetch_json(&self.config.players_url).await {
            Ok(Value::Array(players)) => players.len(),
            Ok(_) => {
                let error = StatusError::NotAnArray { url: self.config.players_url.clone() };
                event!(Level::ERROR, %error, "Could not count players");
                0
            }
            Err(error) => {
                event!(Level::ERROR, ?error, "Could not count players");
                0
            }
        }
    }

    /// Check the server and store the result as the latest snapshot.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> StatusSnapshot {
        let players = self.player_count().await;
        // players are only counted on a live server
        let online = players > 0 || self.server_online().await;

        let snapshot = StatusSnapshot { online, players, checked_at: Utc::now() };
        event!(Level::DEBUG, online, players, "Server status refreshed");

        *self.cache.write().await = Some(snapshot.clone());
        snapshot
    }

    /// The latest snapshot, if any check has run yet.
    pub async fn cached(&self) -> Option<StatusSnapshot> {
        self.cache.read().await.clone()
    }

    /// Download the server endpoints into the cache directory.
    ///
    /// The player list is saved on every poll. The info and dynamic documents change rarely and
    /// are saved again only once `snapshot_refresh_secs` have passed. Returns the files written.
    #[instrument(skip(self))]
    pub async fn poll_and_download(&self, now: DateTime<Utc>) -> Vec<PathBuf> {
        if !self.server_online().await {
            event!(Level::WARN, "Server is offline, skipping snapshot download");
            return Vec::new();
        }

        let mut written = Vec::with_capacity(3);

        match self.download(&self.config.players_url, PLAYERS_FILE).await {
            Ok(path) => written.push(path),
            Err(error) => event!(Level::ERROR, ?error, "Error saving the player list"),
        }

        let mut guard = self.downloads.lock().await;
        let downloads = &mut *guard;
        let refresh = self.config.snapshot_refresh();

        for (url, file, last) in [
            (&self.config.info_url, INFO_FILE, &mut downloads.info),
            (&self.config.dynamic_url, DYNAMIC_FILE, &mut downloads.dynamic),
        ] {
            if !is_due(*last, now, refresh) {
                continue;
            }

            match self.download(url, file).await {
                Ok(path) => {
                    *last = Some(now);
                    written.push(path);
                }
                Err(error) => event!(Level::ERROR, ?error, "Error saving {}", file),
            }
        }

        written
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, StatusError> {
        let response = self.client.get(url).send().await
            .map_err(|source| StatusError::Http { url: url.to_string(), source })?;

        if response.status() != StatusCode::OK {
            return Err(StatusError::UnexpectedStatus { url: url.to_string(), status: response.status() });
        }

        let body = response.bytes().await
            .map_err(|source| StatusError::Http { url: url.to_string(), source })?;

        serde_json::from_slice(&body)
            .map_err(|source| StatusError::InvalidJson { url: url.to_string(), source })
    }

    async fn download(&self, url: &str, file_name: &str) -> Result<PathBuf, StatusError> {
        let document = self.fetch_json(url).await?;
        let path = self.config.cache_dir.join(file_name);

        let pretty = serde_json::to_string_pretty(&document)
            .map_err(|source| StatusError::InvalidJson { url: url.to_string(), source })?;

        tokio::fs::create_dir_all(&self.config.cache_dir).await
            .map_err(|source| StatusError::Io { path: self.config.cache_dir.clone(), source })?;
        tokio::fs::write(&path, pretty).await
            .map_err(|source| StatusError::Io { path: path.clone(), source })?;

        event!(Level::DEBUG, "Saved {} to {}", url, path.display());
        Ok(path)
    }
}

fn is_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, refresh: Duration) -> bool {
    match last {
        None => true,
        Some(last) => (now - last).to_std().map_or(false, |elapsed| elapsed >= refresh),
    }
}

/// The line shown in the bot's presence.
pub fn presence_text(snapshot: &StatusSnapshot) -> String {
    match (snapshot.online, snapshot.players) {
        (false, _) => "Server is offline.".to_string(),
        (true, 0) => "No players online.".to_string(),
        (true, 1) => "1 player online.".to_string(),
        (true, players) => format!("{} players online.", players),
    }
}
