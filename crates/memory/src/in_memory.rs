//! In-memory instinct store, useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::sync::Arc;
use tessera_core::error::StoreError;
use tessera_core::instinct::{Instinct, InstinctStore};
use tessera_core::thread::ThreadId;
use tokio::sync::RwLock;

use crate::records;

/// An instinct store that keeps everything in a `Vec`.
/// Useful for testing and sessions where persistence isn't needed.
pub struct InMemoryInstinctStore {
    entries: Arc<RwLock<Vec<Instinct>>>,
}

impl InMemoryInstinctStore {
    pub fn new() -> Self {
        Self::with_instincts(Vec::new())
    }

    pub fn with_instincts(instincts: Vec<Instinct>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(instincts)),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for InMemoryInstinctStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstinctStore for InMemoryInstinctStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn list_active_instincts(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<Instinct>, StoreError> {
        Ok(records::active_for(&self.entries.read().await, thread_id))
    }

    async fn write_decayed_confidence(&self, id: &str, value: f64) -> Result<(), StoreError> {
        records::set_confidence(&mut self.entries.write().await, id, value)
    }

    async fn reinforce(&self, id: &str, boost: f64) -> Result<Instinct, StoreError> {
        records::reinforce(&mut self.entries.write().await, id, boost)
    }

    async fn upsert(&self, instinct: Instinct) -> Result<String, StoreError> {
        Ok(records::upsert(&mut *self.entries.write().await, instinct))
    }

    async fn get(&self, id: &str) -> Result<Option<Instinct>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|i| i.id == id).cloned())
    }
}
