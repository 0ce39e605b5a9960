//! Rate limited delivery of outgoing Discord messages.
//!
//! Everything the bot posts on its own initiative (welcomes, join and leave logs, error reports)
//! goes through one worker, so bursts of events never hit the Discord rate limits.

use std::sync::Arc;
use std::time::Duration;

use poise::async_trait;
use poise::serenity_prelude as serenity;
use serenity::ChannelId;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{event, Level};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("The message queue is no longer running")]
    Closed,
    #[error("Invalid queue setting: {0} must be at least 1")]
    InvalidSetting(&'static str),
}

/// Whatever actually delivers the messages.
#[async_trait]
pub trait MessageSink: Send + Sync + 'static {
    async fn deliver(&self, channel: ChannelId, content: &str) -> anyhow::Result<()>;
}

#[async_trait]
impl MessageSink for serenity::Http {
    async fn deliver(&self, channel: ChannelId, content: &str) -> anyhow::Result<()> {
        channel.say(self, content).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: ChannelId,
    pub content: String,
}

/// Handle to the delivery worker. Cloning is cheap, all clones feed the same worker.
#[derive(Clone)]
pub struct MessageQueue {
    sender: mpsc::UnboundedSender<OutboundMessage>,
}

impl MessageQueue {
    /// Start the worker. It sends up to `batch_size` messages, then pauses `1 / rate_per_second`
    /// seconds. The worker stops once every handle is dropped.
    pub fn spawn<S: MessageSink>(sink: Arc<S>, rate_per_second: u32, batch_size: usize) -> Result<Self, QueueError> {
        if rate_per_second == 0 {
            return Err(QueueError::InvalidSetting("rate_per_second"));
        }

        if batch_size == 0 {
            return Err(QueueError::InvalidSetting("batch_size"));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let pause = Duration::from_secs(1) / rate_per_second;

        event!(Level::DEBUG, ?pause, batch_size, "Starting message queue");
        tokio::spawn(deliver_batches(sink, receiver, pause, batch_size));

        Ok(Self { sender })
    }

    /// Queue a message for delivery. Never waits on Discord.
    pub fn enqueue(&self, channel: impl Into<ChannelId>, content: impl Into<String>) -> Result<(), QueueError> {
        let message = OutboundMessage { channel: channel.into(), content: content.into() };

        self.sender.send(message).map_err(|_| QueueError::Closed)
    }
}

async fn deliver_batches<S: MessageSink>(
    sink: Arc<S>,
    mut receiver: mpsc::UnboundedReceiver<OutboundMessage>,
    pause: Duration,
    batch_size: usize,
) {
    let mut batch = Vec::with_capacity(batch_size);

    while receiver.recv_many(&mut batch, batch_size).await > 0 {
        event!(Level::TRACE, "Delivering {} queued messages", batch.len());

        for message in batch.drain(..) {
            if let Err(error) = sink.deliver(message.channel, &message.content).await {
                event!(Level::ERROR, ?error, channel = %message.channel, "Error delivering queued message");
            }
        }

        tokio::time::sleep(pause).await;
    }

    event!(Level::DEBUG, "Message queue closed");
}
