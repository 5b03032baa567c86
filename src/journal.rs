//! Durable queue journal.
//!
//! The sync manager persists its pending queue after every change so a
//! process restart resumes where it left off. [`Journal`] is the small
//! key/value surface that persistence goes through. [`InMemoryJournal`]
//! backs tests; [`SqliteJournal`](crate::db::SqliteJournal) backs real
//! deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::warn;

use crate::models::QueuedOperation;

/// Key the queue snapshot is stored under.
pub const QUEUE_KEY: &str = "sync_queue";

/// Minimal persistent key/value surface for queue snapshots.
#[async_trait]
pub trait Journal: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Serialize the queue for storage.
pub fn encode_queue(queue: &[QueuedOperation]) -> Result<String> {
    serde_json::to_string(queue).context("failed to encode sync queue")
}

/// Deserialize a stored queue snapshot.
///
/// A corrupt snapshot logs and yields an empty queue rather than refusing
/// to start. The pending writes are already lost at that point and the
/// manager must still come up.
pub fn decode_queue(raw: &str) -> Vec<QueuedOperation> {
    match serde_json::from_str(raw) {
        Ok(queue) => queue,
        Err(err) => {
            warn!(error = %err, "discarding corrupt sync queue snapshot");
            Vec::new()
        }
    }
}

/// Journal backed by a process-local map.
#[derive(Default)]
pub struct InMemoryJournal {
    entries: RwLock<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail until switched back.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Journal for InMemoryJournal {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("journal unavailable");
        }
        self.entries
            .write()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OperationKind;
    use serde_json::json;

    #[test]
    fn test_snapshot_preserves_retry_state() {
        let mut op = QueuedOperation::new(
            OperationKind::Update,
            "chapters",
            "ch-1",
            Some(json!({"title": "The Bridge"})),
            3,
        );
        op.retry_count = 2;

        let decoded = decode_queue(&encode_queue(&[op.clone()]).unwrap());
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].id, op.id);
        assert_eq!(decoded[0].kind, OperationKind::Update);
        assert_eq!(decoded[0].retry_count, 2);
        assert_eq!(decoded[0].payload, Some(json!({"title": "The Bridge"})));
    }

    #[test]
    fn test_corrupt_snapshot_yields_empty_queue() {
        assert!(decode_queue("not json").is_empty());
        assert!(decode_queue("{\"wrong\": \"shape\"}").is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_journal_failure_switch() {
        let journal = InMemoryJournal::new();
        journal.set("k", "v").await.unwrap();

        journal.fail_writes(true);
        assert!(journal.set("k", "other").await.is_err());
        assert_eq!(journal.get("k").await.unwrap().as_deref(), Some("v"));

        journal.fail_writes(false);
        journal.set("k", "other").await.unwrap();
        assert_eq!(journal.get("k").await.unwrap().as_deref(), Some("other"));
    }
}
