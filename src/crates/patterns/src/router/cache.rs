//! Bounded TTL cache for LLM classifications

use super::Classification;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry {
    classification: Classification,
    inserted: Instant,
}

/// Classification cache keyed by exact message text
///
/// Entries expire after the TTL. When an insert finds the cache full,
/// expired entries are purged and then the oldest fifth is evicted in bulk.
pub struct ClassificationCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ClassificationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, message: &str) -> Option<Classification> {
        let entries = self.entries.read();
        entries
            .get(message)
            .filter(|entry| entry.inserted.elapsed() < self.ttl)
            .map(|entry| entry.classification)
    }

    pub fn insert(&self, message: &str, classification: Classification) {
        let mut entries = self.entries.write();
        if !entries.contains_key(message) && entries.len() >= self.max_entries {
            self.evict(&mut entries);
        }
        entries.insert(
            message.to_string(),
            CacheEntry {
                classification,
                inserted: Instant::now(),
            },
        );
    }

    fn evict(&self, entries: &mut HashMap<String, CacheEntry>) {
        let before = entries.len();
        entries.retain(|_, entry| entry.inserted.elapsed() < self.ttl);

        if entries.len() >= self.max_entries {
            let mut by_age: Vec<(Instant, String)> = entries
                .iter()
                .map(|(key, entry)| (entry.inserted, key.clone()))
                .collect();
            by_age.sort_by_key(|(inserted, _)| *inserted);

            let to_remove = (self.max_entries / 5).max(1);
            for (_, key) in by_age.into_iter().take(to_remove) {
                entries.remove(&key);
            }
        }

        debug!(
            evicted = before - entries.len(),
            remaining = entries.len(),
            "Evicted classification cache entries"
        );
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
