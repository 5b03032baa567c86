//! Document store abstraction.
//!
//! The sync manager never talks to a concrete backend. Queued mutations
//! replay through [`DocumentStore`], so tests and embedders can supply
//! anything from an in-memory map to a remote database client.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub mod memory;

pub use memory::InMemoryStore;

/// Backend the sync manager applies document mutations to.
///
/// Each call is one atomic mutation: a returned error means nothing was
/// applied and the operation is safe to retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the document, or replace it wholesale if it already exists.
    async fn upsert(&self, collection: &str, id: &str, fields: &Value) -> Result<()>;

    /// Shallow-merge `fields` into the document, creating it when absent.
    async fn merge(&self, collection: &str, id: &str, fields: &Value) -> Result<()>;

    /// Delete the document. Deleting an absent document is not an error.
    async fn remove(&self, collection: &str, id: &str) -> Result<()>;
}
