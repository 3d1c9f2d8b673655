//! The page record store.
//!
//! Owns the on-disk index, the single writer, and a snapshot reader. All
//! mutating operations acquire the writer for the duration of one session
//! and commit before releasing it; a contending writer blocks until the
//! session ends. Readers work against the last committed state and are
//! never blocked by a writer.

use crate::analyzer::{self, PAGE_TOKENIZER};
use crate::config::{OptimizePolicy, StoreConfig};
use crate::schema::{self, PageFields};
use crate::types::{PageCandidate, PageRecord};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tantivy::collector::{Count, DocSetCollector};
use tantivy::query::{AllQuery, Query, RegexQuery, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::tokenizer::TextAnalyzer;
use tantivy::{
    DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term,
};
use tracing::debug;

/// How a stored field combines with an incoming candidate value when a
/// record for the URL already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Candidate wins while the page is alive; the stored value is kept
    /// (frozen) while the current outcome is dead.
    OverwriteOnAlive,
    /// Minimum of stored and candidate while alive; frozen while dead.
    MinOnAlive,
    /// Candidate always wins, dead or not.
    Always,
    /// Stored value always wins.
    Never,
}

/// Fixed per-field merge table. `dead_since` is not merged at all: it is
/// recomputed from the current fetch outcome on every upsert.
pub const FIELD_MERGE_TABLE: &[(&str, MergePolicy)] = &[
    ("depth", MergePolicy::MinOnAlive),
    ("title", MergePolicy::OverwriteOnAlive),
    ("content", MergePolicy::OverwriteOnAlive),
    ("description", MergePolicy::OverwriteOnAlive),
    ("created_at", MergePolicy::Never),
    ("last_updated", MergePolicy::Always),
];

fn policy_for(field: &str) -> MergePolicy {
    FIELD_MERGE_TABLE
        .iter()
        .find(|(name, _)| *name == field)
        .map_or(MergePolicy::Always, |(_, policy)| *policy)
}

fn merge_value<T: Ord>(policy: MergePolicy, stored: T, candidate: T, dead: bool) -> T {
    match policy {
        MergePolicy::Always => candidate,
        MergePolicy::Never => stored,
        MergePolicy::OverwriteOnAlive => {
            if dead {
                stored
            } else {
                candidate
            }
        },
        MergePolicy::MinOnAlive => {
            if dead {
                stored
            } else {
                stored.min(candidate)
            }
        },
    }
}

/// Merge an incoming candidate into the stored record, if any.
fn merge_records(stored: Option<PageRecord>, candidate: &PageCandidate) -> PageRecord {
    let dead = candidate.status.is_dead();
    let now = candidate.fetched_at;
    match stored {
        None => PageRecord {
            url: candidate.url.clone(),
            depth: candidate.depth,
            title: candidate.title.clone(),
            content: candidate.content.clone(),
            description: candidate.description.clone(),
            created_at: now,
            last_updated: now,
            dead_since: dead.then_some(now),
        },
        Some(prev) => PageRecord {
            url: prev.url,
            depth: merge_value(policy_for("depth"), prev.depth, candidate.depth, dead),
            title: merge_value(policy_for("title"), prev.title, candidate.title.clone(), dead),
            content: merge_value(
                policy_for("content"),
                prev.content,
                candidate.content.clone(),
                dead,
            ),
            description: merge_value(
                policy_for("description"),
                prev.description,
                candidate.description.clone(),
                dead,
            ),
            created_at: merge_value(policy_for("created_at"), prev.created_at, now, dead),
            last_updated: merge_value(policy_for("last_updated"), prev.last_updated, now, dead),
            dead_since: dead.then_some(now),
        },
    }
}

/// Raw terms above tantivy's length limit are silently dropped at indexing,
/// which would leave a record that can never be found or deleted again.
const MAX_URL_BYTES: usize = 8 * 1024;

fn validate_candidate(candidate: &PageCandidate) -> Result<()> {
    if candidate.url.trim().is_empty() {
        return Err(Error::Contract("candidate url must not be empty".into()));
    }
    if candidate.url.len() > MAX_URL_BYTES {
        return Err(Error::Contract(format!(
            "candidate url exceeds {MAX_URL_BYTES} bytes"
        )));
    }
    if candidate.title.is_empty() {
        return Err(Error::Contract(format!(
            "candidate for {} is missing a title",
            candidate.url
        )));
    }
    Ok(())
}

pub(crate) struct WriterState {
    writer: IndexWriter,
    commits: u64,
}

/// Durable record store over one page per URL.
pub struct PageStore {
    index: Index,
    fields: PageFields,
    writer: Mutex<WriterState>,
    reader: IndexReader,
    config: StoreConfig,
}

impl PageStore {
    /// Open (or create) the store described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let (index, fields) = schema::open_or_create(&config.index_dir)?;
        Self::from_index(index, fields, config)
    }

    /// Open (or create) a store at `dir` with default configuration.
    pub fn open_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open(StoreConfig::default().with_index_dir(dir))
    }

    /// Ephemeral in-memory store. Nothing is persisted; useful for tests.
    pub fn in_ram() -> Result<Self> {
        let (index, fields) = schema::create_in_ram()?;
        Self::from_index(index, fields, StoreConfig::default())
    }

    fn from_index(index: Index, fields: PageFields, config: StoreConfig) -> Result<Self> {
        let writer: IndexWriter = index
            .writer(config.writer_heap_bytes)
            .map_err(|e| Error::Index(format!("failed to create writer: {e}")))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| Error::Index(format!("failed to create reader: {e}")))?;
        Ok(Self {
            index,
            fields,
            writer: Mutex::new(WriterState { writer, commits: 0 }),
            reader,
            config,
        })
    }

    /// Insert or merge one completed fetch.
    ///
    /// Looks up the record by exact URL and applies the per-field merge
    /// table: a dead outcome freezes `depth`, `title`, `content` and
    /// `description` at their stored values and only advances `last_updated`
    /// and `dead_since`. The delete-old/insert-merged pair happens inside a
    /// single writer session and is committed before the session ends, so
    /// readers observe either the old record or the merged one, never
    /// neither.
    pub fn upsert(&self, candidate: &PageCandidate) -> Result<()> {
        validate_candidate(candidate)?;
        let mut state = self.lock_writer()?;
        let merged = merge_records(self.get(&candidate.url)?, candidate);
        let doc = self.record_to_doc(&merged);
        state
            .writer
            .delete_term(Term::from_field_text(self.fields.url, &merged.url));
        state
            .writer
            .add_document(doc)
            .map_err(|e| Error::Index(format!("failed to add document: {e}")))?;
        self.commit_locked(&mut state, false)?;
        debug!(
            "upserted {} (depth {}, dead: {})",
            merged.url,
            merged.depth,
            merged.is_dead()
        );
        Ok(())
    }

    /// Fetch the stored record for an exact URL.
    pub fn get(&self, url: &str) -> Result<Option<PageRecord>> {
        let searcher = self.reader.searcher();
        let addrs = searcher
            .search(&self.url_query(url), &DocSetCollector)
            .map_err(|e| Error::Index(format!("lookup failed: {e}")))?;
        match addrs.into_iter().next() {
            Some(addr) => Ok(Some(self.read_record(&searcher, addr)?)),
            None => Ok(None),
        }
    }

    /// Exact-match existence check.
    ///
    /// The URL is compared as a raw stored term and never passes through the
    /// query grammar, so characters that are meaningful to the parser
    /// (quotes, colons, operators) need no escaping here.
    pub fn exists(&self, url: &str) -> Result<bool> {
        let searcher = self.reader.searcher();
        let count = searcher
            .search(&self.url_query(url), &Count)
            .map_err(|e| Error::Index(format!("lookup failed: {e}")))?;
        Ok(count > 0)
    }

    /// Delete the record with this exact URL, if present.
    pub fn delete(&self, url: &str) -> Result<()> {
        let mut state = self.lock_writer()?;
        state
            .writer
            .delete_term(Term::from_field_text(self.fields.url, url));
        self.commit_locked(&mut state, false)?;
        debug!("deleted {url}");
        Ok(())
    }

    /// Delete every record whose URL starts with `prefix`. Returns how many
    /// records were removed; commits only when at least one was.
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let mut state = self.lock_writer()?;
        let query = self.url_prefix_query(prefix)?;
        let doomed: Vec<String> = self
            .iter_matching(&query)?
            .map(|record| record.map(|r| r.url))
            .collect::<Result<_>>()?;
        for url in &doomed {
            state
                .writer
                .delete_term(Term::from_field_text(self.fields.url, url));
        }
        if !doomed.is_empty() {
            self.commit_locked(&mut state, false)?;
        }
        Ok(doomed.len())
    }

    /// Enumerate every stored record.
    pub fn iter_records(&self) -> Result<RecordIter<'_>> {
        self.iter_matching(&AllQuery)
    }

    /// Enumerate the stored records matching `query`. Doc addresses are
    /// collected up front against one snapshot; records are materialized
    /// lazily as the iterator advances.
    pub fn iter_matching(&self, query: &dyn Query) -> Result<RecordIter<'_>> {
        let searcher = self.reader.searcher();
        let addrs = searcher
            .search(query, &DocSetCollector)
            .map_err(|e| Error::Index(format!("enumeration failed: {e}")))?;
        Ok(RecordIter {
            store: self,
            searcher,
            addrs: addrs.into_iter(),
        })
    }

    /// Number of live records in the last committed snapshot.
    pub fn doc_count(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// The configured user agent, for callers passing it through to robots
    /// decision functions.
    pub fn user_agent(&self) -> &str {
        &self.config.user_agent
    }

    pub(crate) fn fields(&self) -> &PageFields {
        &self.fields
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    /// The registered page analyzer, cloned for standalone use.
    pub(crate) fn text_analyzer(&self) -> TextAnalyzer {
        self.index
            .tokenizers()
            .get(PAGE_TOKENIZER)
            .unwrap_or_else(analyzer::analyzer)
    }

    pub(crate) fn url_query(&self, url: &str) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(self.fields.url, url),
            IndexRecordOption::Basic,
        )
    }

    /// Anchored regex over the raw url terms: everything starting with
    /// `prefix`.
    pub(crate) fn url_prefix_query(&self, prefix: &str) -> Result<RegexQuery> {
        RegexQuery::from_pattern(&format!("{}.*", regex::escape(prefix)), self.fields.url)
            .map_err(|e| Error::Index(format!("invalid prefix pattern: {e}")))
    }

    /// Like [`Self::url_prefix_query`] but bounded at the netloc: the prefix
    /// must be followed by a path, query, fragment, or nothing, so
    /// `http://x.test` does not also cover `http://x.testy`.
    pub(crate) fn url_netloc_query(&self, prefix: &str) -> Result<RegexQuery> {
        RegexQuery::from_pattern(
            &format!("{}([/?#].*)?", regex::escape(prefix)),
            self.fields.url,
        )
        .map_err(|e| Error::Index(format!("invalid netloc pattern: {e}")))
    }

    /// Acquire the writer session, blocking while another mutating
    /// operation holds it.
    pub(crate) fn lock_writer(&self) -> Result<MutexGuard<'_, WriterState>> {
        self.writer
            .lock()
            .map_err(|_| Error::Index("writer lock poisoned".into()))
    }

    /// Commit the current writer session and reload the reader so the
    /// committed state becomes visible. Merges segments down to one when the
    /// optimize policy (or `force_merge`) says so.
    pub(crate) fn commit_locked(&self, state: &mut WriterState, force_merge: bool) -> Result<()> {
        state
            .writer
            .commit()
            .map_err(|e| Error::Index(format!("failed to commit: {e}")))?;
        state.commits += 1;

        let merge_due = force_merge
            || match self.config.optimize {
                OptimizePolicy::EveryCommit => true,
                OptimizePolicy::Periodic { every } => {
                    every > 0 && state.commits % u64::from(every) == 0
                },
                OptimizePolicy::Never => false,
            };
        if merge_due {
            let segments = self
                .index
                .searchable_segment_ids()
                .map_err(|e| Error::Index(format!("failed to list segments: {e}")))?;
            if segments.len() > 1 {
                state
                    .writer
                    .merge(&segments)
                    .wait()
                    .map_err(|e| Error::Index(format!("segment merge failed: {e}")))?;
            }
        }

        self.reader
            .reload()
            .map_err(|e| Error::Index(format!("failed to reload reader: {e}")))
    }

    pub(crate) fn delete_url_term(&self, state: &mut WriterState, url: &str) {
        state
            .writer
            .delete_term(Term::from_field_text(self.fields.url, url));
    }

    fn read_record(&self, searcher: &Searcher, addr: DocAddress) -> Result<PageRecord> {
        let doc: TantivyDocument = searcher
            .doc(addr)
            .map_err(|e| Error::Index(format!("failed to retrieve doc: {e}")))?;
        self.doc_to_record(&doc)
    }

    /// Rehydrate a stored document. A stored document missing a required
    /// field means the index was written by something else entirely.
    pub(crate) fn doc_to_record(&self, doc: &TantivyDocument) -> Result<PageRecord> {
        let text = |field, name: &str| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(std::string::ToString::to_string)
                .ok_or_else(|| Error::Index(format!("stored document missing `{name}`")))
        };
        let date = |field, name: &str| {
            doc.get_first(field)
                .and_then(|v| v.as_datetime())
                .ok_or_else(|| Error::Index(format!("stored document missing `{name}`")))
                .and_then(from_index_time)
        };

        Ok(PageRecord {
            url: text(self.fields.url, "url")?,
            depth: doc
                .get_first(self.fields.depth)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| Error::Index("stored document missing `depth`".into()))?,
            title: text(self.fields.title, "title")?,
            content: text(self.fields.content, "content")?,
            description: text(self.fields.description, "description")?,
            created_at: date(self.fields.created_at, "created_at")?,
            last_updated: date(self.fields.last_updated, "last_updated")?,
            dead_since: doc
                .get_first(self.fields.dead_since)
                .and_then(|v| v.as_datetime())
                .map(from_index_time)
                .transpose()?,
        })
    }

    fn record_to_doc(&self, record: &PageRecord) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.url, &record.url);
        doc.add_u64(self.fields.depth, record.depth);
        doc.add_text(self.fields.title, &record.title);
        doc.add_text(self.fields.content, &record.content);
        doc.add_text(self.fields.description, &record.description);
        doc.add_date(self.fields.created_at, to_index_time(record.created_at));
        doc.add_date(self.fields.last_updated, to_index_time(record.last_updated));
        if let Some(dead_since) = record.dead_since {
            doc.add_date(self.fields.dead_since, to_index_time(dead_since));
        }
        doc
    }
}

fn to_index_time(t: DateTime<Utc>) -> tantivy::DateTime {
    tantivy::DateTime::from_timestamp_micros(t.timestamp_micros())
}

fn from_index_time(t: tantivy::DateTime) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(t.into_timestamp_micros())
        .ok_or_else(|| Error::Index("stored timestamp out of range".into()))
}

/// Lazy record enumeration over one reader snapshot.
pub struct RecordIter<'a> {
    store: &'a PageStore,
    searcher: Searcher,
    addrs: std::collections::hash_set::IntoIter<DocAddress>,
}

impl Iterator for RecordIter<'_> {
    type Item = Result<PageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let addr = self.addrs.next()?;
        Some(self.store.read_record(&self.searcher, addr))
    }
}
