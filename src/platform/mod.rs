pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A message received from any platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Platform-specific user ID as string
    pub user_id: String,
    /// Display name of the user
    pub user_name: String,
    /// Platform-specific chat/channel ID as string
    pub chat_id: String,
    /// Platform-specific message ID as string, used for reply threading
    pub message_id: String,
    /// The message text
    pub text: String,
    /// Whether the author is a bot account
    pub from_bot: bool,
    /// When the platform says the message was sent
    pub timestamp: DateTime<Utc>,
}

/// Outbound side of the chat platform: reply to a message, or push text
/// to the configured broadcast channel.
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    /// Reply to the message that triggered handling
    async fn reply(&self, to: &IncomingMessage, text: &str) -> Result<()>;

    /// Send text to the broadcast channel
    async fn broadcast(&self, text: &str) -> Result<()>;
}
