use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ReplyParameters};
use tracing::{info, warn};

use crate::gate::RequestGate;
use crate::platform::{ChatOutbound, IncomingMessage};

/// Outbound Telegram client: threaded replies plus broadcasts to the
/// configured channel
pub struct TelegramChat {
    bot: Bot,
    broadcast_chat_id: ChatId,
}

impl TelegramChat {
    pub fn new(bot: Bot, broadcast_chat_id: i64) -> Self {
        Self {
            bot,
            broadcast_chat_id: ChatId(broadcast_chat_id),
        }
    }
}

#[async_trait]
impl ChatOutbound for TelegramChat {
    async fn reply(&self, to: &IncomingMessage, text: &str) -> Result<()> {
        let chat_id: i64 = to
            .chat_id
            .parse()
            .with_context(|| format!("Invalid chat id: {}", to.chat_id))?;
        let message_id: i32 = to
            .message_id
            .parse()
            .with_context(|| format!("Invalid message id: {}", to.message_id))?;

        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_parameters(ReplyParameters::new(MessageId(message_id)))
            .await
            .context("Failed to send reply")?;

        Ok(())
    }

    async fn broadcast(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(self.broadcast_chat_id, text)
            .await
            .context("Failed to send broadcast")?;

        Ok(())
    }
}

/// Run the Telegram bot platform
pub async fn run(gate: Arc<RequestGate>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![gate])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, gate: Arc<RequestGate>) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    let incoming = IncomingMessage {
        user_id: user.id.0.to_string(),
        user_name: user.first_name.clone(),
        chat_id: msg.chat.id.0.to_string(),
        message_id: msg.id.0.to_string(),
        text,
        from_bot: user.is_bot,
        timestamp: msg.date,
    };

    let outcome = gate.handle(&incoming).await;
    info!("Gate outcome for user {}: {:?}", incoming.user_id, outcome);

    Ok(())
}
