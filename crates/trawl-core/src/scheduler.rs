//! Staleness-driven recrawl scheduling.
//!
//! Only site roots (`depth == 0`) are rescheduled explicitly; pages below a
//! root are rediscovered through normal link traversal once the root is
//! recrawled.

use crate::store::PageStore;
use crate::{Error, Result};
use chrono::{Duration, Utc};
use tantivy::Term;
use tantivy::query::TermQuery;
use tantivy::schema::IndexRecordOption;
use tracing::debug;

impl PageStore {
    /// URLs of site roots whose last update is at least `wait` ago.
    ///
    /// An empty index yields an empty vec. There is no cap: the result is
    /// bounded by the number of stored roots, not by document size.
    pub fn stale_roots(&self, wait: Duration) -> Result<Vec<String>> {
        let now = Utc::now();
        let roots = TermQuery::new(
            Term::from_field_u64(self.fields().depth, 0),
            IndexRecordOption::Basic,
        );
        let mut urls = Vec::new();
        for record in self.iter_matching(&roots)? {
            let record = record?;
            if now.signed_duration_since(record.last_updated) >= wait {
                urls.push(record.url);
            }
        }
        debug!("{} stale root(s) past {}s", urls.len(), wait.num_seconds());
        Ok(urls)
    }

    /// Convenience wrapper over [`Self::stale_roots`] for callers working
    /// in whole seconds.
    pub fn stale_roots_secs(&self, wait_secs: u64) -> Result<Vec<String>> {
        let wait = i64::try_from(wait_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| Error::Contract(format!("wait time {wait_secs}s out of range")))?;
        self.stale_roots(wait)
    }

    /// Site roots due for a recrawl under the configured wait time.
    pub fn due_roots(&self) -> Result<Vec<String>> {
        self.stale_roots_secs(self.config().wait_time_secs)
    }
}
