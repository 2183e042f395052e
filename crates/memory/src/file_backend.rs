//! File-based instinct store: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded [`Instinct`]. The file is human-inspectable
//! and can be edited by hand between runs; lines that fail to parse are
//! skipped with a warning rather than failing the whole load.
//!
//! Default location: `~/.tessera/instincts.jsonl` (see `AppConfig`).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_core::error::StoreError;
use tessera_core::instinct::{Instinct, InstinctStore};
use tessera_core::thread::ThreadId;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::records;

/// A file-backed instinct store using JSONL (one JSON object per line).
///
/// Instincts are loaded into memory on creation and flushed to disk on every
/// mutation (decay write-back, reinforcement, upsert). Reads never touch the
/// disk.
pub struct FileInstinctStore {
    path: PathBuf,
    entries: Arc<RwLock<Vec<Instinct>>>,
    skipped: usize,
}

impl FileInstinctStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts empty; it is created on the first write.
    pub fn new(path: PathBuf) -> Self {
        let (entries, skipped) = Self::load_from_disk(&path);
        debug!(
            path = %path.display(),
            count = entries.len(),
            skipped,
            "File instinct store loaded"
        );
        Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
            skipped,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines dropped as unreadable during the initial load.
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Every stored instinct, regardless of status or thread.
    pub async fn all(&self) -> Vec<Instinct> {
        self.entries.read().await.clone()
    }

    fn load_from_disk(path: &Path) -> (Vec<Instinct>, usize) {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return (Vec::new(), 0), // File doesn't exist yet, start empty
        };

        let mut skipped = 0;
        let entries = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str::<Instinct>(line) {
                Ok(instinct) => Some(instinct),
                Err(e) => {
                    warn!(line = n + 1, error = %e, "Skipping corrupted instinct record");
                    skipped += 1;
                    None
                }
            })
            .collect();

        (entries, skipped)
    }

    /// Write every entry to disk. Called with the write lock held so flushes
    /// never interleave.
    async fn flush(&self, entries: &[Instinct]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Storage(format!("Failed to create store directory: {e}"))
                })?;
            }
        }

        let mut content = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                StoreError::Storage(format!("Failed to serialize instinct {}: {e}", entry.id))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write instinct file: {e}")))
    }
}

#[async_trait]
impl InstinctStore for FileInstinctStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn list_active_instincts(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<Instinct>, StoreError> {
        Ok(records::active_for(&self.entries.read().await, thread_id))
    }

    async fn write_decayed_confidence(&self, id: &str, value: f64) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        records::set_confidence(&mut entries, id, value)?;
        self.flush(&entries).await
    }

    async fn reinforce(&self, id: &str, boost: f64) -> Result<Instinct, StoreError> {
        let mut entries = self.entries.write().await;
        let updated = records::reinforce(&mut entries, id, boost)?;
        self.flush(&entries).await?;
        Ok(updated)
    }

    async fn upsert(&self, instinct: Instinct) -> Result<String, StoreError> {
        let mut entries = self.entries.write().await;
        let id = records::upsert(&mut entries, instinct);
        self.flush(&entries).await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<Instinct>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.iter().find(|i| i.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn temp_path() -> PathBuf {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp); // Close file so the store can own it
        path
    }

    #[tokio::test]
    async fn upsert_persists_across_reloads() {
        let path = temp_path();

        let store = FileInstinctStore::new(path.clone());
        let id = store
            .upsert(Instinct::new("asked for code", "use Rust", "coding", 0.7))
            .await
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("use Rust"));

        let reloaded = FileInstinctStore::new(path);
        let inst = reloaded.get(&id).await.unwrap().unwrap();
        assert_eq!(inst.action, "use Rust");
        assert_eq!(inst.base_confidence, 0.7);
    }

    #[tokio::test]
    async fn decay_write_back_persists() {
        let path = temp_path();
        let store = FileInstinctStore::new(path.clone());
        let id = store
            .upsert(Instinct::new("t", "a", "general", 0.8))
            .await
            .unwrap();

        store.write_decayed_confidence(&id, 0.55).await.unwrap();

        let reloaded = FileInstinctStore::new(path);
        assert_eq!(reloaded.get(&id).await.unwrap().unwrap().base_confidence, 0.55);
    }

    #[tokio::test]
    async fn reinforce_persists_metadata() {
        let path = temp_path();
        let store = FileInstinctStore::new(path.clone());
        let id = store
            .upsert(Instinct::new("t", "a", "general", 0.5))
            .await
            .unwrap();

        store.reinforce(&id, 0.1).await.unwrap();

        let reloaded = FileInstinctStore::new(path);
        let inst = reloaded.get(&id).await.unwrap().unwrap();
        assert_eq!(inst.metadata.occurrence_count, 1);
        assert!((inst.base_confidence - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_id_is_not_found() {
        let store = FileInstinctStore::new(temp_path());
        assert!(matches!(
            store.reinforce("nope", 0.1).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("instincts.jsonl");

        let store = FileInstinctStore::new(path.clone());
        assert!(store.is_empty().await);
        store
            .upsert(Instinct::new("t", "a", "general", 0.5))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn handles_corrupted_lines() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"{{"id":"1","trigger":"t","action":"valid","domain":"general","base_confidence":0.5,"created_at":"2026-01-01T00:00:00Z"}}"#
        )
        .unwrap();
        writeln!(tmp, "this is not json").unwrap();
        writeln!(
            tmp,
            r#"{{"id":"2","trigger":"t","action":"also valid","domain":"general","base_confidence":0.6,"created_at":"2026-01-01T00:00:00Z","status":"deprecated"}}"#
        )
        .unwrap();

        let store = FileInstinctStore::new(tmp.path().to_path_buf());
        assert_eq!(store.len().await, 2);
        assert_eq!(store.skipped_lines(), 1);

        // Missing metadata falls back to defaults; deprecated is filtered.
        let active = store
            .list_active_instincts(&ThreadId::from("t"))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].metadata.success_rate, 1.0);
    }
}
