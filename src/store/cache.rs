use anyhow::{Context, Result};
use uuid::Uuid;

use super::WordStore;

/// A stored prompt/response pair
#[derive(Debug, Clone)]
pub struct CachedExchange {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub original_message: String,
    pub response: String,
}

impl WordStore {
    /// Find a cached exchange whose original message exactly equals `original`.
    ///
    /// Reads every row and compares in memory; the cache stays small
    /// between purges.
    pub async fn find_cached(&self, original: &str) -> Result<Option<CachedExchange>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, user_name, original_message, response
                 FROM response_cache
                 ORDER BY rowid ASC",
            )
            .context("Failed to prepare cache scan")?;

        let entries = stmt
            .query_map([], parse_cache_row)
            .context("Failed to scan response cache")?;

        for entry in entries {
            let entry = entry.context("Failed to read cache row")?;
            if entry.original_message == original {
                return Ok(Some(entry));
            }
        }

        Ok(None)
    }

    /// Record a fresh exchange under a new opaque id. Entries are immutable
    /// once written; only the periodic purge removes them.
    pub async fn insert_cached(
        &self,
        user_id: &str,
        user_name: &str,
        original: &str,
        response: &str,
    ) -> Result<()> {
        let id = Uuid::new_v4().to_string();

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO response_cache (id, user_id, user_name, original_message, response)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![&id, user_id, user_name, original, response],
        )
        .context("Failed to insert cache entry")?;

        Ok(())
    }
}

fn parse_cache_row(row: &rusqlite::Row) -> rusqlite::Result<CachedExchange> {
    Ok(CachedExchange {
        id: row.get(0)?,
        user_id: row.get(1)?,
        user_name: row.get(2)?,
        original_message: row.get(3)?,
        response: row.get(4)?,
    })
}
