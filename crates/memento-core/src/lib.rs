//! # Memento
//!
//! A memory service for AI agents: ingest unstructured text memories, index
//! them for hybrid lexical+semantic retrieval, inject the most relevant ones
//! into an agent's prompt within a token budget, and progressively forget
//! low-value memories by a principled policy.
//!
//! The engine is organized as a chain of small, mostly-pure components bound
//! together by [`facade::MemoryEngine`]:
//!
//! - [`storage`] — the Persistence Gateway: a SQLite-backed transactional
//!   store for memories, embeddings, links, and feedback.
//! - [`embeddings`] — provider fallback chain (hosted-primary →
//!   hosted-secondary → local TF-IDF+hashing) plus a bounded, TTL'd cache.
//! - [`search`] — lexical (FTS5) and vector (HNSW via `usearch`) retrieval,
//!   fused by [`search::HybridSearcher`].
//! - [`ranking`] — the scoring formula and Maximal-Marginal-Relevance
//!   selection shared by hybrid search and the forgetting controller.
//! - [`forgetting`] — soft/hard delete gates and spaced-review scheduling.
//! - [`inject`] — token-budgeted context injection for agent prompts.
//! - [`scheduler`] — periodic drivers for the forget-sweep, metrics, and
//!   cache-sweep jobs.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use memento_core::config::Config;
//! use memento_core::facade::MemoryEngine;
//! use memento_core::model::StoreInput;
//!
//! # async fn run() -> memento_core::error::Result<()> {
//! let engine = MemoryEngine::new(None, Config::default())?;
//! engine.start_scheduler()?;
//!
//! let stored = engine
//!     .store(StoreInput {
//!         content: "the deploy pipeline now requires a signed artifact".into(),
//!         memory_type: Some("semantic".into()),
//!         tags: vec!["ci".into()],
//!         importance: Some(0.7),
//!         source: None,
//!         privacy_scope: None,
//!     })
//!     .await?;
//!
//! let results = engine
//!     .search("deploy pipeline", &Default::default(), 5)
//!     .await?;
//! # let _ = (stored, results);
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod model;
pub mod storage;

pub mod embeddings;
pub mod search;

pub mod ranking;

pub mod forgetting;
pub mod inject;
pub mod scheduler;

pub mod facade;

pub use error::{Error, Result};
pub use facade::{ForgetResult, MemoryEngine, PinResult, StoreResult, UnpinResult};
pub use model::{Feedback, FeedbackEvent, Filter, Link, LinkRelation, Memory, MemoryType, PrivacyScope, StoreInput};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::facade::{ForgetResult, MemoryEngine, PinResult, StoreResult, UnpinResult};
    pub use crate::model::{Feedback, FeedbackEvent, Filter, Memory, MemoryType, PrivacyScope, StoreInput};
    pub use crate::search::{HybridResult, HybridSearcher};
}
