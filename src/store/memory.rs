//! In-memory document store.
//!
//! Default backend for tests and for embedders that have no remote store
//! yet. Documents live in one map keyed by collection and id. A write
//! counter and a failure switch let tests observe exactly how many
//! mutations landed and force the transient-failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::DocumentStore;

#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<(String, String), Value>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent mutation fail until switched back.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of mutations applied so far. Failed calls do not count.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, collection: &str, id: &str) -> Option<Value> {
        self.docs
            .read()
            .unwrap()
            .get(&(collection.to_string(), id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn upsert(&self, collection: &str, id: &str, fields: &Value) -> Result<()> {
        self.check_failure()?;
        self.docs
            .write()
            .unwrap()
            .insert((collection.to_string(), id.to_string()), fields.clone());
        self.record_write();
        Ok(())
    }

    async fn merge(&self, collection: &str, id: &str, fields: &Value) -> Result<()> {
        self.check_failure()?;
        {
            let mut docs = self.docs.write().unwrap();
            let doc = docs
                .entry((collection.to_string(), id.to_string()))
                .or_insert_with(|| Value::Object(Map::new()));
            merge_fields(doc, fields);
        }
        self.record_write();
        Ok(())
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        self.check_failure()?;
        self.docs
            .write()
            .unwrap()
            .remove(&(collection.to_string(), id.to_string()));
        self.record_write();
        Ok(())
    }
}

/// Shallow merge: top-level keys of `fields` overwrite those of `target`.
/// A non-object on either side replaces the target wholesale.
fn merge_fields(target: &mut Value, fields: &Value) {
    match (target, fields) {
        (Value::Object(target), Value::Object(fields)) => {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        (target, fields) => *target = fields.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let store = InMemoryStore::new();
        store
            .upsert("chapters", "ch-1", &json!({"title": "The Bridge"}))
            .await
            .unwrap();
        assert_eq!(store.get("chapters", "ch-1"), Some(json!({"title": "The Bridge"})));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_merge_overlays_fields() {
        let store = InMemoryStore::new();
        store
            .upsert("chapters", "ch-1", &json!({"title": "Draft", "words": 900}))
            .await
            .unwrap();
        store
            .merge("chapters", "ch-1", &json!({"title": "The Bridge"}))
            .await
            .unwrap();
        assert_eq!(
            store.get("chapters", "ch-1"),
            Some(json!({"title": "The Bridge", "words": 900}))
        );
    }

    #[tokio::test]
    async fn test_merge_creates_absent_document() {
        let store = InMemoryStore::new();
        store
            .merge("chapters", "ch-9", &json!({"title": "Late"}))
            .await
            .unwrap();
        assert_eq!(store.get("chapters", "ch-9"), Some(json!({"title": "Late"})));
    }

    #[tokio::test]
    async fn test_remove_absent_is_ok() {
        let store = InMemoryStore::new();
        store.remove("chapters", "missing").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fail_writes_rejects_and_counts_nothing() {
        let store = InMemoryStore::new();
        store.fail_writes(true);
        assert!(store.upsert("c", "1", &json!({})).await.is_err());
        assert!(store.merge("c", "1", &json!({})).await.is_err());
        assert!(store.remove("c", "1").await.is_err());
        assert_eq!(store.write_count(), 0);

        store.fail_writes(false);
        store.upsert("c", "1", &json!({})).await.unwrap();
        assert_eq!(store.write_count(), 1);
    }
}
