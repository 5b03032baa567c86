//! # Draftloom
//!
//! Offline-first infrastructure for AI-assisted fiction writing tools.
//!
//! Draftloom packs reference material (character sheets, style guides,
//! world notes, outlines, timelines) into token-budgeted prompts for
//! chapter generation, and queues document mutations durably while
//! offline so nothing a writer saves is lost to a dropped connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Reference  │──▶│ Extract +    │──▶│ Optimized     │
//! │ documents  │   │ rank + pack  │   │ prompt        │
//! └────────────┘   └──────────────┘   └───────────────┘
//!
//! ┌────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Mutations  │──▶│ Sync queue   │──▶│ Document      │
//! │ (UI layer) │   │ + journal    │   │ store         │
//! └────────────┘   └──────────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! Pack reference material into a prompt:
//!
//! ```
//! use draftloom::models::{GenerationContext, ReferenceDoc};
//! use draftloom::optimize::optimize_prompt;
//!
//! let characters = ReferenceDoc::from_file(
//!     "characters.md",
//!     "## Protagonist: Maya\nvoice: clipped, analytical",
//! ).unwrap();
//!
//! let mut context = GenerationContext::new(3, "draft", "fantasy");
//! context.characters.push("Maya".to_string());
//!
//! let prompt = optimize_prompt(
//!     "You draft novel chapters.",
//!     "Write chapter three.",
//!     &[characters],
//!     &context,
//!     8000,
//! );
//! assert!(prompt.system_prompt.contains("STORY CONTEXT"));
//! assert_eq!(prompt.included_sources, vec!["characters.md#Protagonist: Maya"]);
//! ```
//!
//! Queue writes while offline:
//!
//! ```no_run
//! # async fn demo() {
//! use std::sync::Arc;
//! use draftloom::config::SyncConfig;
//! use draftloom::connectivity::SwitchableConnectivity;
//! use draftloom::journal::InMemoryJournal;
//! use draftloom::store::InMemoryStore;
//! use draftloom::sync::SyncManager;
//! use serde_json::json;
//!
//! let connectivity = Arc::new(SwitchableConnectivity::new(false));
//! let manager = SyncManager::new(
//!     SyncConfig::default(),
//!     Arc::new(InMemoryStore::new()),
//!     connectivity.clone(),
//!     Arc::new(InMemoryJournal::new()),
//! ).await;
//!
//! // Offline: the write queues durably instead of failing.
//! manager.save_document("chapters", "ch-3", json!({"title": "The Bridge"})).await;
//! assert_eq!(manager.sync_status().queued_operations, 1);
//!
//! // Back online: the queue drains automatically.
//! connectivity.set_online(true);
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`sections`] | Heading-delimited section splitting |
//! | [`estimate`] | Word-count token heuristic |
//! | [`extract`] | Per-kind fragment extraction |
//! | [`optimize`] | Budgeted prompt assembly |
//! | [`store`] | Document store abstraction |
//! | [`connectivity`] | Online/offline signal |
//! | [`journal`] | Durable queue journal |
//! | [`db`] | SQLite journal backend |
//! | [`sync`] | Offline sync manager |

pub mod config;
pub mod connectivity;
pub mod db;
pub mod estimate;
pub mod extract;
pub mod journal;
pub mod models;
pub mod optimize;
pub mod sections;
pub mod store;
pub mod sync;
