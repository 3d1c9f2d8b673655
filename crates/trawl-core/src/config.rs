//! Store configuration.
//!
//! Configuration is stored in TOML format. A missing file is not an error;
//! [`StoreConfig::load`] falls back to defaults so a fresh deployment works
//! with zero setup, mirroring how a missing index directory triggers index
//! creation rather than a failure.
//!
//! ```toml
//! index_dir = "records"
//! writer_heap_bytes = 50000000
//! optimize = "every_commit"
//! wait_time_secs = 604800
//! user_agent = "trawl"
//!
//! [search]
//! page_size = 10
//! or_decay = 0.9
//! snippet_surround = 25
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// When to compact the index's segment files.
///
/// Compaction ("optimize") merges all searchable segments into one. It keeps
/// reads fast at the cost of write latency; batching it amortizes that cost
/// over many upserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizePolicy {
    /// Merge segments on every commit.
    EveryCommit,
    /// Merge segments every N commits.
    Periodic {
        /// Number of commits between merges.
        every: u32,
    },
    /// Never merge; rely on tantivy's background merge policy alone.
    Never,
}

/// Configuration for a [`crate::PageStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the on-disk index. Created if absent.
    pub index_dir: PathBuf,
    /// Heap budget handed to the index writer, in bytes.
    pub writer_heap_bytes: usize,
    /// Segment compaction policy.
    pub optimize: OptimizePolicy,
    /// Default staleness threshold for recrawl scheduling, in seconds.
    pub wait_time_secs: u64,
    /// User agent handed to robots decision functions by the caller surface.
    pub user_agent: String,
    /// Search tuning knobs.
    pub search: SearchConfig,
}

/// Tuning knobs for query execution and snippet selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results per page.
    pub page_size: usize,
    /// Coordination decay for OR groups: how much a second-best matching
    /// term contributes relative to the best one.
    pub or_decay: f32,
    /// Characters of context kept on each side of a highlighted match.
    pub snippet_surround: usize,
    /// Maximum highlight fragments joined into one snippet.
    pub snippet_max_fragments: usize,
    /// Characters of leading content used when neither a highlight nor a
    /// description is available.
    pub snippet_fallback_chars: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("records"),
            writer_heap_bytes: 50_000_000,
            optimize: OptimizePolicy::EveryCommit,
            wait_time_secs: 60 * 60 * 24 * 7,
            user_agent: "trawl".to_string(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            or_decay: 0.9,
            snippet_surround: 25,
            snippet_max_fragments: 3,
            snippet_fallback_chars: 170,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a TOML file, or defaults if the file does not
    /// exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("invalid config file: {e}")))
    }

    /// Write configuration to a TOML file, creating parent directories as
    /// needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// Replace the index directory, keeping everything else.
    #[must_use]
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("tempdir");
        let config = StoreConfig::load(&dir.path().join("nope.toml")).expect("load");
        assert_eq!(config.search.page_size, 10);
        assert_eq!(config.optimize, OptimizePolicy::EveryCommit);
        assert_eq!(config.wait_time_secs, 604_800);
        assert_eq!(config.user_agent, "trawl");
    }

    #[test]
    fn round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("store.toml");

        let mut config = StoreConfig::default().with_index_dir(dir.path().join("idx"));
        config.search.page_size = 25;
        config.optimize = OptimizePolicy::Periodic { every: 16 };
        config.save(&path).expect("save");

        let back = StoreConfig::load(&path).expect("load");
        assert_eq!(back.search.page_size, 25);
        assert_eq!(back.optimize, OptimizePolicy::Periodic { every: 16 });
        assert_eq!(back.index_dir, dir.path().join("idx"));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("store.toml");
        std::fs::write(&path, "page_size = {").expect("write");

        let err = StoreConfig::load(&path).expect_err("should fail");
        assert_eq!(err.category(), "config");
    }
}
