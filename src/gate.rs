use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::llm::{ChatMessage, CompletionBackend, CompletionError};
use crate::platform::{ChatOutbound, IncomingMessage};
use crate::prompt;
use crate::store::GateStore;

pub const INVALID_FORMAT_REPLY: &str =
    "Please send a language followed by a word length, e.g. \"French 5\".";
pub const QUOTA_EXCEEDED_REPLY: &str =
    "You already got your word for today. Come back after the next reset!";
pub const COOLDOWN_NOTICE: &str =
    "I'm being rate limited and need a short break. Back in a bit.";
pub const RESUME_NOTICE: &str =
    "I'm back! Send me a language and a word length for a new word.";
pub const GENERIC_ERROR_REPLY: &str = "As an AI robot, I errored out.";

/// What the gate decided to do with a message. The platform adapter logs
/// this; tests assert on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    QuotaExceeded,
    InvalidFormat,
    CachedReply,
    Completed,
    CoolingDown,
    Failed,
}

/// A "<language> <length>" command extracted from free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub language: String,
    pub word_length: u64,
}

/// Tunable gate behavior, from the [gate] config table
#[derive(Debug, Clone)]
pub struct GatePolicy {
    /// How long to stop accepting messages after a provider rate limit
    pub cooldown: Duration,
}

/// The message-handling gate: decides per message whether to answer from
/// cache, ask the completion backend, or refuse. Holds no durable state.
/// The store owns all records; the gate keeps only the listening flag and
/// the last-activity instant across invocations.
pub struct RequestGate {
    llm: Arc<dyn CompletionBackend>,
    store: Arc<dyn GateStore>,
    chat: Arc<dyn ChatOutbound>,
    policy: GatePolicy,
    command: Regex,
    listening: Arc<AtomicBool>,
    last_activity: Mutex<Instant>,
}

impl RequestGate {
    pub fn new(
        llm: Arc<dyn CompletionBackend>,
        store: Arc<dyn GateStore>,
        chat: Arc<dyn ChatOutbound>,
        policy: GatePolicy,
    ) -> Self {
        Self {
            llm,
            store,
            chat,
            policy,
            command: Regex::new(r"(\w+)\s+(\d+)").unwrap(),
            listening: Arc::new(AtomicBool::new(true)),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Handle one inbound message. Every step short-circuits; all side
    /// effects (replies, store writes) happen through the collaborators.
    pub async fn handle(&self, msg: &IncomingMessage) -> Outcome {
        // Never answer other bots, and stay quiet during a cooldown
        if msg.from_bot || !self.listening.load(Ordering::SeqCst) {
            return Outcome::Ignored;
        }

        info!(
            "Message from {} ({}) at {}: {}",
            msg.user_name, msg.user_id, msg.timestamp, msg.text
        );

        // An existing quota claim blocks the user until the purge clears it
        match self.store.quota_claimed(&msg.user_id).await {
            Ok(true) => {
                self.send_reply(msg, QUOTA_EXCEEDED_REPLY).await;
                self.touch_activity().await;
                return Outcome::QuotaExceeded;
            }
            Ok(false) => {}
            Err(e) => warn!("Quota lookup failed, allowing request: {:#}", e),
        }

        let command = match self.parse_command(&msg.text) {
            Some(c) => c,
            None => {
                self.send_reply(msg, INVALID_FORMAT_REPLY).await;
                return Outcome::InvalidFormat;
            }
        };

        // Identical requests reuse the stored response and cost neither a
        // completion call nor the user's quota
        match self.store.find_cached(&msg.text).await {
            Ok(Some(hit)) => {
                info!("Cache hit for {:?} (entry {})", msg.text, hit.id);
                self.send_reply(msg, &hit.response).await;
                return Outcome::CachedReply;
            }
            Ok(None) => {}
            Err(e) => warn!("Cache probe failed, treating as miss: {:#}", e),
        }

        let messages = vec![
            ChatMessage::system(prompt::word_request(&command.language, command.word_length)),
            ChatMessage::user(msg.text.clone()),
        ];

        match self.llm.complete(&messages).await {
            Ok(generated) => {
                self.send_reply(msg, &generated).await;

                // Persistence failures after a delivered reply degrade to a
                // dropped record, never to a user-visible error
                if let Err(e) = self
                    .store
                    .insert_cached(&msg.user_id, &msg.user_name, &msg.text, &generated)
                    .await
                {
                    error!("Failed to record cache entry: {:#}", e);
                }
                match self.store.try_claim_quota(&msg.user_id).await {
                    Ok(true) => {}
                    Ok(false) => info!("Quota for {} was already claimed", msg.user_id),
                    Err(e) => error!("Failed to claim quota for {}: {:#}", msg.user_id, e),
                }

                self.touch_activity().await;
                Outcome::Completed
            }
            Err(CompletionError::RateLimited { status }) => {
                warn!("Provider rate limited (status {}), entering cooldown", status);
                self.begin_cooldown();
                self.send_reply(msg, COOLDOWN_NOTICE).await;
                Outcome::CoolingDown
            }
            Err(e) => {
                error!("Completion failed: {}", e);
                self.send_reply(msg, GENERIC_ERROR_REPLY).await;
                Outcome::Failed
            }
        }
    }

    /// How long since the gate last saw activity. Read by the idle nudge.
    pub async fn idle_for(&self) -> Duration {
        self.last_activity.lock().await.elapsed()
    }

    /// Reset the last-activity marker
    pub async fn touch_activity(&self) {
        *self.last_activity.lock().await = Instant::now();
    }

    fn parse_command(&self, text: &str) -> Option<ParsedCommand> {
        let caps = self.command.captures(text.trim())?;
        let language = caps.get(1)?.as_str().to_string();
        // Length is not range checked; zero or huge values reach the
        // template unchanged
        let word_length = caps.get(2)?.as_str().parse().ok()?;
        Some(ParsedCommand {
            language,
            word_length,
        })
    }

    /// Stop accepting messages, then re-announce and resume after the
    /// configured cooldown. The in-flight completion cannot be aborted;
    /// this only prevents new calls.
    fn begin_cooldown(&self) {
        self.listening.store(false, Ordering::SeqCst);

        let listening = self.listening.clone();
        let chat = self.chat.clone();
        let cooldown = self.policy.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            if let Err(e) = chat.broadcast(RESUME_NOTICE).await {
                warn!("Failed to announce resume: {:#}", e);
            }
            listening.store(true, Ordering::SeqCst);
            info!("Cooldown over, accepting messages again");
        });
    }

    async fn send_reply(&self, msg: &IncomingMessage, text: &str) {
        if let Err(e) = self.chat.reply(msg, text).await {
            warn!("Failed to send reply: {:#}", e);
        }
    }
}
