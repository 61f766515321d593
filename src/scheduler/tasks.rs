use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::gate::RequestGate;
use crate::llm::{ChatMessage, CompletionBackend};
use crate::platform::ChatOutbound;
use crate::prompt;
use crate::scheduler::Scheduler;
use crate::store::WordStore;

/// Register the periodic jobs: the store purge, and the optional channel
/// announcement and idle nudge.
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    config: &Config,
    store: WordStore,
    gate: Arc<RequestGate>,
    llm: Arc<dyn CompletionBackend>,
    chat: Arc<dyn ChatOutbound>,
) -> Result<()> {
    // Purge job: the only thing that ever clears quota claims or cache
    // rows, and it always wipes both in full
    {
        let store = store.clone();
        scheduler
            .add_cron_job(&config.gate.purge_cron, "store-purge", move || {
                let store = store.clone();
                Box::pin(async move {
                    match store.purge_all().await {
                        Ok(()) => info!("Purged quota claims and response cache"),
                        Err(e) => warn!("Store purge failed: {:#}", e),
                    }
                })
            })
            .await?;
    }

    // Fixed-text channel announcement
    if let Some(announce) = &config.announce {
        let chat = chat.clone();
        let text = announce.text.clone();
        scheduler
            .add_cron_job(&announce.cron, "announce", move || {
                let chat = chat.clone();
                let text = text.clone();
                Box::pin(async move {
                    if let Err(e) = chat.broadcast(&text).await {
                        warn!("Announcement failed: {:#}", e);
                    }
                })
            })
            .await?;
    }

    // Idle nudge: an independent consumer of the completion backend and
    // the chat client; it shares only the gate's activity marker
    if let Some(nudge) = &config.idle_nudge {
        let threshold = Duration::from_secs(nudge.threshold_secs);
        scheduler
            .add_cron_job(&nudge.check_cron, "idle-nudge", move || {
                let gate = gate.clone();
                let llm = llm.clone();
                let chat = chat.clone();
                Box::pin(async move {
                    if let Err(e) =
                        run_idle_check(&gate, llm.as_ref(), chat.as_ref(), threshold).await
                    {
                        warn!("Idle nudge failed: {:#}", e);
                    }
                })
            })
            .await?;
    }

    Ok(())
}

/// One idle check: if the gate has sat idle past the threshold, ask the
/// backend for an arbitrary word and push it to the broadcast channel.
/// Returns whether a nudge was sent.
pub async fn run_idle_check(
    gate: &RequestGate,
    llm: &dyn CompletionBackend,
    chat: &dyn ChatOutbound,
    threshold: Duration,
) -> Result<bool> {
    let idle = gate.idle_for().await;
    if idle < threshold {
        return Ok(false);
    }

    let messages = vec![ChatMessage::system(prompt::idle_nudge())];
    let text = llm
        .complete(&messages)
        .await
        .context("Idle nudge completion failed")?;
    chat.broadcast(&text)
        .await
        .context("Idle nudge broadcast failed")?;

    // Re-arm the threshold for the next check
    gate.touch_activity().await;
    info!("Idle nudge sent after {:?} of inactivity", idle);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GatePolicy;
    use crate::llm::CompletionError;
    use crate::platform::IncomingMessage;
    use crate::store::WordStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct CannedBackend;

    #[async_trait]
    impl CompletionBackend for CannedBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
            Ok("Word: saudade".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        broadcasts: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatOutbound for RecordingChat {
        async fn reply(&self, _to: &IncomingMessage, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn broadcast(&self, text: &str) -> Result<()> {
            self.broadcasts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn gate(llm: Arc<dyn CompletionBackend>, chat: Arc<dyn ChatOutbound>) -> RequestGate {
        RequestGate::new(
            llm,
            Arc::new(WordStore::open_in_memory().unwrap()),
            chat,
            GatePolicy {
                cooldown: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test]
    async fn test_no_nudge_before_threshold() {
        let llm = Arc::new(CannedBackend);
        let chat = Arc::new(RecordingChat::default());
        let gate = gate(llm.clone(), chat.clone());

        let sent = run_idle_check(&gate, llm.as_ref(), chat.as_ref(), Duration::from_secs(3600))
            .await
            .unwrap();

        assert!(!sent);
        assert!(chat.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nudge_broadcasts_and_rearms() {
        let llm = Arc::new(CannedBackend);
        let chat = Arc::new(RecordingChat::default());
        let gate = gate(llm.clone(), chat.clone());

        let sent = run_idle_check(&gate, llm.as_ref(), chat.as_ref(), Duration::ZERO)
            .await
            .unwrap();
        assert!(sent);
        assert_eq!(
            *chat.broadcasts.lock().unwrap(),
            vec!["Word: saudade".to_string()]
        );

        // The marker was touched, so a sane threshold no longer trips
        let again = run_idle_check(&gate, llm.as_ref(), chat.as_ref(), Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(!again);
    }
}
