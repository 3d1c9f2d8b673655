//! Record invalidation: robots rechecks and startup filter reconciliation.
//!
//! The store never deletes records on its own initiative; these passes are
//! the only paths that remove them. Decision functions are trusted as
//! given — no freshness checks are performed on the caller's robots data.

use crate::store::PageStore;
use crate::{Error, Result};
use tracing::{debug, info};
use url::Url;

/// `scheme://host[:port]` of a netloc URL, the prefix that scopes a robots
/// recheck. A bare host ("x.test") is accepted and matches both http and
/// https records for that host.
fn netloc_prefixes(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    if let Ok(parsed) = Url::parse(raw) {
        if let Some(host) = parsed.host_str() {
            let prefix = match parsed.port() {
                Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
                None => format!("{}://{}", parsed.scheme(), host),
            };
            return Ok(vec![prefix]);
        }
    }
    let host = raw.trim_end_matches('/');
    if host.is_empty() || host.contains('/') || host.contains(char::is_whitespace) {
        return Err(Error::Contract(format!("not a netloc url: {raw:?}")));
    }
    Ok(vec![format!("http://{host}"), format!("https://{host}")])
}

impl PageStore {
    /// Re-apply a robots decision to every stored record under one netloc,
    /// deleting records the decision function no longer allows.
    ///
    /// Called whenever a netloc's robots policy may have changed (typically
    /// after a forced robots.txt re-fetch). Runs as one writer session and
    /// commits once, only if something was actually deleted. Returns the
    /// number of deleted records.
    pub fn recheck_netloc<F>(&self, netloc_url: &str, user_agent: &str, is_allowed: F) -> Result<usize>
    where
        F: Fn(&str, &str) -> bool,
    {
        let prefixes = netloc_prefixes(netloc_url)?;
        let mut state = self.lock_writer()?;

        let mut doomed = Vec::new();
        for prefix in &prefixes {
            let query = self.url_netloc_query(prefix)?;
            for record in self.iter_matching(&query)? {
                let record = record?;
                if !is_allowed(&record.url, user_agent) {
                    doomed.push(record.url);
                }
            }
        }

        for url in &doomed {
            debug!("robots recheck dropped {url}");
            self.delete_url_term(&mut state, url);
        }
        if !doomed.is_empty() {
            self.commit_locked(&mut state, false)?;
            info!(
                "robots recheck for {netloc_url} removed {} record(s)",
                doomed.len()
            );
        }
        Ok(doomed.len())
    }

    /// Reconcile the index with the currently configured filter rules.
    ///
    /// Enumerates every record once and deletes those failing either
    /// predicate. One writer session, one commit (with compaction) at the
    /// end. Run once at process start, since filter rules may have changed
    /// since the index was last written.
    pub fn startup_cleanup<U, T>(&self, url_filter: U, tld_filter: T) -> Result<usize>
    where
        U: Fn(&str) -> bool,
        T: Fn(&str) -> bool,
    {
        let mut state = self.lock_writer()?;

        let mut doomed = Vec::new();
        for record in self.iter_records()? {
            let record = record?;
            if !url_filter(&record.url) || !tld_filter(&record.url) {
                doomed.push(record.url);
            }
        }
        for url in &doomed {
            debug!("startup cleanup dropped {url}");
            self.delete_url_term(&mut state, url);
        }
        self.commit_locked(&mut state, true)?;

        info!("startup cleanup removed {} record(s)", doomed.len());
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FetchStatus, PageCandidate};
    use chrono::Utc;

    fn seed(store: &PageStore, url: &str) {
        store
            .upsert(&PageCandidate::new(
                url,
                0,
                Some("t".to_string()),
                "body",
                "",
                FetchStatus::Alive,
                Utc::now(),
            ))
            .expect("upsert");
    }

    #[test]
    fn netloc_prefix_forms() {
        assert_eq!(
            netloc_prefixes("http://x.test/some/page").expect("parse"),
            vec!["http://x.test".to_string()]
        );
        assert_eq!(
            netloc_prefixes("https://x.test:8080/").expect("parse"),
            vec!["https://x.test:8080".to_string()]
        );
        assert_eq!(
            netloc_prefixes("x.test").expect("parse"),
            vec!["http://x.test".to_string(), "https://x.test".to_string()]
        );
        assert!(netloc_prefixes("").is_err());
        assert!(netloc_prefixes("not a host").is_err());
    }

    #[test]
    fn recheck_deletes_disallowed_records() {
        let store = PageStore::in_ram().expect("store");
        seed(&store, "http://x.test/");
        seed(&store, "http://x.test/private/page");
        seed(&store, "http://other.test/");

        let removed = store
            .recheck_netloc("http://x.test/", "trawl", |url, _agent| {
                !url.contains("/private/")
            })
            .expect("recheck");

        assert_eq!(removed, 1);
        assert!(store.exists("http://x.test/").expect("exists"));
        assert!(!store.exists("http://x.test/private/page").expect("exists"));
        assert!(store.exists("http://other.test/").expect("exists"));
    }

    #[test]
    fn recheck_scopes_to_the_netloc() {
        let store = PageStore::in_ram().expect("store");
        seed(&store, "http://x.test/");
        seed(&store, "http://y.test/");
        seed(&store, "http://x.testy.example/");

        let removed = store
            .recheck_netloc("http://x.test/", "trawl", |_, _| false)
            .expect("recheck");

        assert_eq!(removed, 1);
        assert!(!store.exists("http://x.test/").expect("exists"));
        assert!(store.exists("http://y.test/").expect("exists"));
        assert!(store.exists("http://x.testy.example/").expect("exists"));
    }

    #[test]
    fn recheck_with_bare_host_covers_both_schemes() {
        let store = PageStore::in_ram().expect("store");
        seed(&store, "http://x.test/");
        seed(&store, "https://x.test/secure");

        let removed = store
            .recheck_netloc("x.test", "trawl", |_, _| false)
            .expect("recheck");
        assert_eq!(removed, 2);
    }

    #[test]
    fn recheck_passes_the_user_agent_through() {
        let store = PageStore::in_ram().expect("store");
        seed(&store, "http://x.test/");

        store
            .recheck_netloc("http://x.test/", "trawl-agent", |_, agent| {
                assert_eq!(agent, "trawl-agent");
                true
            })
            .expect("recheck");
        assert!(store.exists("http://x.test/").expect("exists"));
    }

    #[test]
    fn startup_cleanup_applies_both_filters() {
        let store = PageStore::in_ram().expect("store");
        seed(&store, "http://keep.test/");
        seed(&store, "http://badurl.test/");
        seed(&store, "http://keep.example/");

        let removed = store
            .startup_cleanup(
                |url| !url.contains("badurl"),
                |url| url.ends_with(".test/") || url.contains(".test/"),
            )
            .expect("cleanup");

        assert_eq!(removed, 2);
        assert!(store.exists("http://keep.test/").expect("exists"));
        assert!(!store.exists("http://badurl.test/").expect("exists"));
        assert!(!store.exists("http://keep.example/").expect("exists"));
    }

    #[test]
    fn cleanup_on_empty_index_is_a_noop() {
        let store = PageStore::in_ram().expect("store");
        let removed = store.startup_cleanup(|_| true, |_| true).expect("cleanup");
        assert_eq!(removed, 0);
        assert_eq!(store.doc_count(), 0);
    }
}
