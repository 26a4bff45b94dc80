//! Last-known-state cache.
//!
//! Holds the most recent *successful* snapshot per target name. The scrape
//! orchestrator overwrites an entry on success and deletes it on failure, so a
//! cached entry never outlives the cycle that invalidated it. The side-channel
//! endpoints read this cache and nothing else.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::normalize::NormalizedSnapshot;

/// Cached result of one successful query.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub snapshot: NormalizedSnapshot,

    /// Game type of the target (a target list detail, not a provider field).
    pub game: String,

    /// The provider's raw key/value payload, kept verbatim for `/server-info`.
    pub raw: serde_json::Value,

    /// When the query succeeded.
    pub timestamp: DateTime<Utc>,
}

/// In-memory snapshot store keyed by target name.
///
/// Writers touch one key each; readers get the old or the new entry atomically,
/// never a partial one, because entries are replaced whole under the write lock.
#[derive(Debug, Default)]
pub struct StateCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl StateCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn put(&self, name: &str, entry: CacheEntry) {
        self.entries.write().await.insert(name.to_string(), entry);
    }

    pub async fn get(&self, name: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(name).cloned()
    }

    pub async fn delete(&self, name: &str) {
        self.entries.write().await.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> CacheEntry {
        CacheEntry {
            snapshot: NormalizedSnapshot::default(),
            game: String::from("cs2"),
            raw: serde_json::json!({}),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = StateCache::new();

        let first = entry();
        cache.put("cs-1", first.clone()).await;

        let mut second = entry();
        second.snapshot.players_count = 5;
        cache.put("cs-1", second).await;

        let cached = cache.get("cs-1").await.unwrap();
        assert_eq!(cached.snapshot.players_count, 5);
        assert!(cached.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_delete_evicts() {
        let cache = StateCache::new();
        cache.put("cs-1", entry()).await;
        cache.delete("cs-1").await;
        assert!(cache.get("cs-1").await.is_none());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = StateCache::new();
        assert!(cache.get("never-seen").await.is_none());
    }
}
