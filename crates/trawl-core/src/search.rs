//! Ranked, paginated search over the store.
//!
//! Execution runs against the reader's snapshot of the last committed
//! state: parse leniently, validate (degenerate queries are refused, not
//! executed), score with tantivy's BM25, paginate, and attach a snippet to
//! every hit — a highlighted content fragment when one exists, otherwise
//! the description, otherwise the leading content.

use crate::highlight::{Highlighter, leading_fragment};
use crate::query;
use crate::store::PageStore;
use crate::types::{SearchHit, SearchResults};
use crate::{Error, Result};
use std::time::Instant;
use tantivy::TantivyDocument;
use tantivy::collector::{Count, TopDocs};
use tracing::debug;

impl PageStore {
    /// Search with the configured page size.
    pub fn search(&self, term: &str, page: usize) -> Result<SearchResults> {
        self.search_with(term, page, self.config().search.page_size)
    }

    /// Search one page of results. `page` is 1-based; a degenerate query
    /// returns `valid: false` without touching the index.
    pub fn search_with(&self, term: &str, page: usize, page_size: usize) -> Result<SearchResults> {
        let started = Instant::now();
        let mut analyzer = self.text_analyzer();
        let ast = query::parse(term, &mut analyzer);
        if !query::validate(&ast) {
            debug!("rejected degenerate query: {term:?}");
            return Ok(SearchResults::invalid());
        }

        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = (page - 1) * page_size;
        let config = &self.config().search;
        let lowered = query::to_query(&ast, self.fields(), config.or_decay);

        let searcher = self.searcher();
        let (top_docs, total) = searcher
            .search(
                &lowered,
                &(TopDocs::with_limit(page_size).and_offset(offset), Count),
            )
            .map_err(|e| Error::Index(format!("search failed: {e}")))?;

        let highlighter = Highlighter::from_ast(&ast, config);
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher
                .doc(addr)
                .map_err(|e| Error::Index(format!("failed to retrieve doc: {e}")))?;
            let record = self.doc_to_record(&doc)?;
            let snippet = highlighter
                .highlight(&mut analyzer, &record.content)
                .or_else(|| (!record.description.is_empty()).then(|| record.description.clone()))
                .unwrap_or_else(|| {
                    leading_fragment(&record.content, config.snippet_fallback_chars)
                });
            hits.push(SearchHit {
                url: record.url,
                title: record.title,
                depth: record.depth,
                snippet,
                score,
            });
        }

        let page_count = total.div_ceil(page_size);
        let results = SearchResults {
            valid: true,
            hits,
            total,
            exact: true,
            last_page: page >= page_count,
            page_count,
            duration: started.elapsed(),
        };
        debug!(
            "query {term:?} matched {} docs in {:.2}ms",
            results.total,
            results.duration.as_secs_f64() * 1000.0
        );
        Ok(results)
    }
}
