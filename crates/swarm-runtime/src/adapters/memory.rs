//! Bounded in-memory collective memory.

use async_trait::async_trait;
use hs_04_queen::MemoryGateway;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Insertion-ordered key/value store with capacity eviction (oldest first).
/// Similarity search is substring match over keys; good enough for a
/// single-process swarm where memory is advisory.
pub struct InMemoryCollectiveMemory {
    entries: Mutex<VecDeque<(String, serde_json::Value)>>,
    capacity: usize,
}

impl InMemoryCollectiveMemory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl MemoryGateway for InMemoryCollectiveMemory {
    async fn store(&self, key: String, value: serde_json::Value) -> Result<(), String> {
        let mut entries = self.entries.lock();
        entries.retain(|(existing, _)| *existing != key);
        entries.push_back((key, value));
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> Result<Option<serde_json::Value>, String> {
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone()))
    }

    async fn search_similar(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<(String, serde_json::Value)>, String> {
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .rev()
            .filter(|(key, _)| key.contains(pattern))
            .take(limit)
            .cloned()
            .collect())
    }
}
