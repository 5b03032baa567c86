//! Core data models shared by the context selector and the sync queue.
//!
//! Selector-side types ([`ReferenceDoc`], [`GenerationContext`], [`Fragment`],
//! [`OptimizedPrompt`]) live for a single optimization call. Queue-side types
//! ([`QueuedOperation`], [`SyncStatus`]) cross the journal boundary and are
//! serialized as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of reference material a document carries, resolved once at ingestion.
///
/// Each kind has its own scoring heuristics in [`extract`](crate::extract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// Character sheets, one section per character.
    Characters,
    /// Style guide: tone, prose rules, point of view.
    Style,
    /// World-building notes: places, factions, rules.
    World,
    /// Chapter-by-chapter outline.
    Outline,
    /// Plot timeline.
    Timeline,
}

impl ReferenceKind {
    /// Resolve a kind from a well-known reference filename, matching on the
    /// lowercased stem. Unknown names return `None`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let stem = filename.rsplit('/').next().unwrap_or(filename);
        let lower = stem.to_lowercase();
        let stem = lower.strip_suffix(".md").unwrap_or(&lower);
        match stem {
            "characters" | "character-sheets" => Some(Self::Characters),
            "style" | "style-guide" => Some(Self::Style),
            "world" | "world-building" => Some(Self::World),
            "outline" => Some(Self::Outline),
            "timeline" | "plot-timeline" => Some(Self::Timeline),
            _ => None,
        }
    }
}

/// One reference document handed to the selector. Immutable per call.
#[derive(Debug, Clone)]
pub struct ReferenceDoc {
    pub kind: ReferenceKind,
    /// Display name used in fragment source labels, typically the filename.
    pub name: String,
    /// Heading-delimited markdown body.
    pub content: String,
}

impl ReferenceDoc {
    pub fn new(kind: ReferenceKind, name: &str, content: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    /// Build a document from a `{filename, content}` pair, resolving the kind
    /// from the filename. Unknown filenames yield `None`.
    pub fn from_file(filename: &str, content: &str) -> Option<Self> {
        ReferenceKind::from_filename(filename).map(|kind| Self::new(kind, filename, content))
    }
}

/// Request-scoped parameters for one chapter-generation attempt.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub chapter_number: u32,
    /// Pipeline stage label, e.g. `draft` or `revision`.
    pub stage: String,
    pub genre: String,
    pub target_word_count: u32,
    /// Characters expected on the page in this chapter.
    pub characters: Vec<String>,
    pub scene_type: Option<String>,
    pub themes: Vec<String>,
}

impl GenerationContext {
    pub fn new(chapter_number: u32, stage: &str, genre: &str) -> Self {
        Self {
            chapter_number,
            stage: stage.to_string(),
            genre: genre.to_string(),
            target_word_count: 0,
            characters: Vec::new(),
            scene_type: None,
            themes: Vec::new(),
        }
    }
}

/// A scored candidate span extracted from one reference document.
///
/// Exists only within a single optimization call. Zero-priority fragments
/// are filtered out before ranking.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Source label, `name#section` for section-derived fragments.
    pub source: String,
    pub text: String,
    pub priority: u32,
    /// Estimated token cost of `text`.
    pub tokens: usize,
}

/// Result of one optimization call.
#[derive(Debug, Clone)]
pub struct OptimizedPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Token estimate recomputed over the assembled prompts.
    pub token_estimate: usize,
    /// Source labels of admitted fragments, in admission order.
    pub included_sources: Vec<String>,
}

/// Mutation type of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// A pending document mutation awaiting replay against the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedOperation {
    /// Unique id, `{enqueue-millis}-{random}`.
    pub id: String,
    pub kind: OperationKind,
    pub collection: String,
    pub document_id: String,
    /// Document body (create) or partial fields (update); absent for delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub queued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl QueuedOperation {
    pub fn new(
        kind: OperationKind,
        collection: &str,
        document_id: &str,
        payload: Option<Value>,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        let mut suffix = Uuid::new_v4().simple().to_string();
        suffix.truncate(8);
        Self {
            id: format!("{}-{}", now.timestamp_millis(), suffix),
            kind,
            collection: collection.to_string(),
            document_id: document_id.to_string(),
            payload,
            queued_at: now,
            retry_count: 0,
            max_retries,
        }
    }
}

/// Observable summary of connectivity and queue state.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    /// Live length of the pending-operation queue.
    pub queued_operations: usize,
    /// Total operations dropped after exhausting their retries.
    pub dead_letters: usize,
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub last_successful_sync: Option<DateTime<Utc>>,
}
