pub mod cache;
pub mod quota;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub use crate::store::cache::CachedExchange;

/// Storage consumed by the request gate: per-user quota claims and the
/// prompt/response cache.
#[async_trait]
pub trait GateStore: Send + Sync {
    /// Whether the user already holds a quota claim for the current period
    async fn quota_claimed(&self, user_id: &str) -> Result<bool>;

    /// Atomically claim the user's quota. Returns true if this call created
    /// the claim, false if one already existed.
    async fn try_claim_quota(&self, user_id: &str) -> Result<bool>;

    /// Look up a cached exchange whose original message equals `original`
    async fn find_cached(&self, original: &str) -> Result<Option<CachedExchange>>;

    /// Record a fresh prompt/response exchange
    async fn insert_cached(
        &self,
        user_id: &str,
        user_name: &str,
        original: &str,
        response: &str,
    ) -> Result<()>;
}

/// Thread-safe SQLite store backing the gate
#[derive(Clone)]
pub struct WordStore {
    conn: Arc<Mutex<Connection>>,
}

impl WordStore {
    /// Open or create the SQLite database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Enable WAL mode for better concurrent read performance.
        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("Word store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            -- One row per user per period; existence of the row is the quota
            CREATE TABLE IF NOT EXISTS quota_claims (
                user_id TEXT PRIMARY KEY,
                claimed_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Immutable prompt/response pairs, keyed by an opaque id
            CREATE TABLE IF NOT EXISTS response_cache (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                user_name TEXT NOT NULL,
                original_message TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )
        .context("Failed to run store migrations")?;

        Ok(())
    }

    /// Wipe all quota claims and cache entries. Run periodically by the
    /// scheduler; nothing else ever deletes rows.
    pub async fn purge_all(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM quota_claims", [])
            .context("Failed to purge quota claims")?;
        conn.execute("DELETE FROM response_cache", [])
            .context("Failed to purge response cache")?;
        Ok(())
    }
}

#[async_trait]
impl GateStore for WordStore {
    async fn quota_claimed(&self, user_id: &str) -> Result<bool> {
        WordStore::quota_claimed(self, user_id).await
    }

    async fn try_claim_quota(&self, user_id: &str) -> Result<bool> {
        WordStore::try_claim_quota(self, user_id).await
    }

    async fn find_cached(&self, original: &str) -> Result<Option<CachedExchange>> {
        WordStore::find_cached(self, original).await
    }

    async fn insert_cached(
        &self,
        user_id: &str,
        user_name: &str,
        original: &str,
        response: &str,
    ) -> Result<()> {
        WordStore::insert_cached(self, user_id, user_name, original, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_purge_clears_both_tables() {
        let store = WordStore::open_in_memory().unwrap();

        store.try_claim_quota("user-1").await.unwrap();
        store
            .insert_cached("user-1", "Alice", "French 5", "Word: livre")
            .await
            .unwrap();

        store.purge_all().await.unwrap();

        assert!(!store.quota_claimed("user-1").await.unwrap());
        assert!(store.find_cached("French 5").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quota_available_again_after_purge() {
        let store = WordStore::open_in_memory().unwrap();

        assert!(store.try_claim_quota("user-2").await.unwrap());
        store.purge_all().await.unwrap();
        assert!(store.try_claim_quota("user-2").await.unwrap());
    }
}
