//! Error types and handling for trawl-core operations.
//!
//! All public operations return [`Result<T, Error>`]. Errors are grouped by
//! the subsystem that produced them and carry a recoverability hint so the
//! crawl engine can decide between retrying and giving up.
//!
//! A [`Error::Contract`] is special: it signals that a *caller* handed the
//! store data that violates the ingestion contract (for example a candidate
//! with an empty URL). Contract violations indicate an integration bug
//! upstream and must never be retried.

use thiserror::Error;

/// The main error type for trawl-core operations.
///
/// Index failures wrap the underlying tantivy error message rather than the
/// error value itself so the tantivy API surface stays private to this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers file system operations like creating the index directory or
    /// reading a configuration file. The underlying `std::io::Error` is
    /// preserved for detailed inspection.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Search index operation failed.
    ///
    /// Covers failures in creating, updating, or querying the on-disk index,
    /// including index corruption and commit failures.
    #[error("Index error: {0}")]
    Index(String),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// A caller violated the store's ingestion contract.
    ///
    /// The integration is presumed correct; this is a last line of defense,
    /// not user input validation. Treat as fatal and fix the caller.
    #[error("Contract violation: {0}")]
    Contract(String),
}

impl Error {
    /// Whether retrying the failed operation might succeed.
    ///
    /// Contract violations and configuration problems are deterministic and
    /// never recoverable; I/O and index failures may be transient.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) | Self::Index(_) => true,
            Self::Config(_) | Self::Contract(_) => false,
        }
    }

    /// Stable category label used in logs and diagnostics.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Index(_) => "index",
            Self::Config(_) => "config",
            Self::Contract(_) => "contract",
        }
    }
}

/// Convenient result alias for trawl-core operations.
pub type Result<T> = std::result::Result<T, Error>;
