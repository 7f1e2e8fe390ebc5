use std::collections::BTreeMap;
use std::sync::Arc;

use eggdash_core::session::{LEADERBOARD_ROOT, ScoreEntry};
use eggdash_core::store::{self, Store};

use crate::error::SessionError;

/// Global single-player high scores, kept as a push-ordered log under
/// `leaderboard`.
pub struct Leaderboard {
    store: Arc<dyn Store>,
    size: usize,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn Store>, size: usize) -> Self {
        Self {
            store,
            size: size.max(1),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Best `n` entries, score descending. Equal scores keep submission order.
    pub async fn top(&self, n: usize) -> Result<Vec<ScoreEntry>, SessionError> {
        let mut entries = self.entries().await?;
        entries.truncate(n);
        Ok(entries)
    }

    /// Whether `score` would make the table: there is a free slot, or it beats
    /// the lowest shown entry outright.
    pub async fn qualifies(&self, score: u32) -> Result<bool, SessionError> {
        let shown = self.top(self.size).await?;
        if shown.len() < self.size {
            return Ok(true);
        }
        Ok(shown.last().is_none_or(|lowest| score > lowest.score))
    }

    /// Record a score stamped with server time. Blank names are not recorded.
    pub async fn submit(&self, name: &str, score: u32) -> Result<Option<String>, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let entry = ScoreEntry {
            name: name.to_string(),
            score,
            timestamp: self.store.server_timestamp().await?,
        };
        let key = self
            .store
            .push(LEADERBOARD_ROOT, store::to_value(&entry)?)
            .await?;
        tracing::info!(name, score, key = %key, "Leaderboard entry added");
        Ok(Some(key))
    }

    async fn entries(&self) -> Result<Vec<ScoreEntry>, SessionError> {
        let log: BTreeMap<String, ScoreEntry> = store::read(&*self.store, LEADERBOARD_ROOT)
            .await?
            .unwrap_or_default();
        let mut entries: Vec<ScoreEntry> = log.into_values().collect();
        // Stable, so push-key order breaks timestamp ties.
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.timestamp.cmp(&b.timestamp)));
        Ok(entries)
    }
}
