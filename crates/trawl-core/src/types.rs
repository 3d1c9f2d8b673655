//! Core data types: fetch candidates, stored page records, search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a completed fetch attempt.
///
/// The extraction collaborator maps transport results onto this enum; the
/// store never sees status codes, only the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    /// The page was fetched and extracted successfully.
    Alive,
    /// The fetch failed (HTTP 4xx/5xx or equivalent).
    Dead,
}

impl FetchStatus {
    /// Classify an HTTP status code the way the crawl pipeline does:
    /// anything in 400..=599 is a dead page, everything else is alive.
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        if status > 399 && status < 600 {
            Self::Dead
        } else {
            Self::Alive
        }
    }

    /// Whether this outcome freezes the record's content fields.
    #[must_use]
    pub const fn is_dead(self) -> bool {
        matches!(self, Self::Dead)
    }
}

/// One completed fetch, as handed to [`crate::PageStore::upsert`].
///
/// Carries the extracted page data plus the time of the fetch; the store
/// stamps `created_at`/`last_updated` from `fetched_at` rather than reading
/// the clock itself, which keeps merges reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageCandidate {
    /// Canonical URL of the fetched page. Unique key in the store.
    pub url: String,
    /// Link distance from the site root this page was discovered under.
    pub depth: u64,
    /// Extracted page title.
    pub title: String,
    /// Extracted body text.
    pub content: String,
    /// Extracted meta description, possibly empty.
    pub description: String,
    /// Outcome classification for this fetch.
    pub status: FetchStatus,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

impl PageCandidate {
    /// Build a candidate, substituting the URL for a missing title the way
    /// the extraction pipeline does for pages without `<title>` or `<h1>`.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        depth: u64,
        title: Option<String>,
        content: impl Into<String>,
        description: impl Into<String>,
        status: FetchStatus,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let url = url.into();
        let title = match title {
            Some(t) if !t.trim().is_empty() => t,
            _ => url.clone(),
        };
        Self {
            url,
            depth,
            title,
            content: content.into(),
            description: description.into(),
            status,
            fetched_at,
        }
    }
}

/// A stored page record, one per URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Canonical URL, unique across the store.
    pub url: String,
    /// Minimum link depth observed across all non-dead fetches.
    pub depth: u64,
    /// Page title.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Meta description, possibly empty.
    pub description: String,
    /// When the record was first created. Never changes afterwards.
    pub created_at: DateTime<Utc>,
    /// When the record was last touched by an upsert.
    pub last_updated: DateTime<Utc>,
    /// Set while the most recent fetch outcome was dead; `None` once a
    /// subsequent fetch succeeds.
    pub dead_since: Option<DateTime<Utc>>,
}

impl PageRecord {
    /// Whether the most recent fetch of this page failed.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead_since.is_some()
    }
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// URL of the matching page.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Stored link depth.
    pub depth: u64,
    /// HTML snippet with matched tokens wrapped in `<strong>` tags, or a
    /// plain-text fallback when no highlight was found.
    pub snippet: String,
    /// Relevance score assigned by the ranking function.
    pub score: f32,
}

/// Outcome of a search request.
///
/// An invalid query (empty, or matching everything/nothing) is a normal
/// outcome with `valid == false`, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Whether the query survived validation and was executed.
    pub valid: bool,
    /// Hits for the requested page, best first.
    pub hits: Vec<SearchHit>,
    /// Total number of matching documents across all pages.
    pub total: usize,
    /// Whether `total` is exact rather than an estimate.
    pub exact: bool,
    /// Whether the requested page is the last one.
    pub last_page: bool,
    /// Total number of result pages.
    pub page_count: usize,
    /// Query execution time.
    pub duration: std::time::Duration,
}

impl SearchResults {
    /// The canonical rejected-query outcome.
    #[must_use]
    pub fn invalid() -> Self {
        Self {
            valid: false,
            hits: Vec::new(),
            total: 0,
            exact: true,
            last_page: true,
            page_count: 0,
            duration: std::time::Duration::ZERO,
        }
    }
}
