use anyhow::{Context, Result};

use super::WordStore;

impl WordStore {
    /// Whether the user already holds a quota claim for the current period
    pub async fn quota_claimed(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let claimed: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM quota_claims WHERE user_id = ?1)",
                rusqlite::params![user_id],
                |row| row.get(0),
            )
            .context("Failed to look up quota claim")?;
        Ok(claimed)
    }

    /// Claim the user's quota in one conditional write. The primary key
    /// makes this atomic: exactly one of two concurrent claims inserts.
    pub async fn try_claim_quota(&self, user_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO quota_claims (user_id) VALUES (?1)",
                rusqlite::params![user_id],
            )
            .context("Failed to claim quota")?;
        Ok(inserted > 0)
    }
}
