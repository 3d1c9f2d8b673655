//! # trawl-core
//!
//! Core functionality for trawl - a durable, queryable record store for
//! crawled pages.
//!
//! This crate keeps one record per URL, merges freshly fetched page data
//! into existing records under per-field policies, freezes the content of
//! pages whose latest fetch failed, schedules recrawls by staleness, and
//! answers full-text queries with ranked, highlighted snippets. It is an
//! embedded storage engine: state lives in an on-disk tantivy index with no
//! network protocol of its own.
//!
//! ## Architecture
//!
//! The crate is organized around a few components:
//!
//! - **Schema**: field declarations over the underlying index
//! - **Analyzer**: the tokenization pipeline shared by indexing and queries
//! - **Record Store**: upsert-merge, delete, existence and enumeration
//! - **Query Engine**: a lenient fixed-grammar parser, validation,
//!   execution, snippets
//! - **Scheduler / Invalidation**: staleness scans and filter/robots
//!   reconciliation passes
//!
//! ## Quick Start
//!
//! ```rust
//! use trawl_core::{FetchStatus, PageCandidate, PageStore};
//!
//! let store = PageStore::in_ram()?;
//! store.upsert(&PageCandidate::new(
//!     "http://example.test/",
//!     0,
//!     Some("Example".to_string()),
//!     "hello world",
//!     "",
//!     FetchStatus::Alive,
//!     chrono::Utc::now(),
//! ))?;
//!
//! let results = store.search("hello", 1)?;
//! assert_eq!(results.total, 1);
//! assert!(results.hits[0].snippet.contains("<strong>hello</strong>"));
//! # Ok::<(), trawl_core::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! The store is single-writer, multi-reader: one writer session exists at a
//! time, mutating operations block until they can acquire it, and readers
//! always observe the last committed snapshot without blocking anyone.

/// Text analysis pipeline shared by indexing and query matching
pub mod analyzer;
/// Store configuration with TOML persistence
pub mod config;
/// Error types and result alias
pub mod error;
mod highlight;
mod invalidate;
/// Query grammar, AST and validation
pub mod query;
/// Index schema declaration
pub mod schema;
mod scheduler;
mod search;
/// The page record store
pub mod store;
/// Core data types: candidates, records, search results
pub mod types;

// Re-export commonly used types
pub use config::{OptimizePolicy, SearchConfig, StoreConfig};
pub use error::{Error, Result};
pub use query::{Ast, FieldScope, parse, validate};
pub use store::{FIELD_MERGE_TABLE, MergePolicy, PageStore, RecordIter};
pub use types::{FetchStatus, PageCandidate, PageRecord, SearchHit, SearchResults};
