//! Index schema: one document per crawled page.
//!
//! `url` is a raw (untokenized) term so exact-match lookups and deletes never
//! pass through text analysis. The three text fields share the page analyzer
//! and keep positions so phrase queries work. Timestamps are stored for
//! retrieval; `depth` is additionally indexed so site roots can be found with
//! a term query.

use crate::analyzer::PAGE_TOKENIZER;
use crate::{Error, Result};
use std::path::Path;
use tantivy::Index;
use tantivy::directory::MmapDirectory;
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};

/// Handles to every declared field.
#[derive(Debug, Clone, Copy)]
pub struct PageFields {
    /// Unique page URL, raw term.
    pub url: Field,
    /// Link depth from the site root.
    pub depth: Field,
    /// Page title.
    pub title: Field,
    /// Page body text.
    pub content: Field,
    /// Meta description.
    pub description: Field,
    /// Record creation time.
    pub created_at: Field,
    /// Last upsert time.
    pub last_updated: Field,
    /// Time the page was last observed dead, if it currently is.
    pub dead_since: Field,
}

/// Build the page schema and its field handles.
#[must_use]
pub fn build_schema() -> (Schema, PageFields) {
    let mut builder = Schema::builder();

    let page_text = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(PAGE_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();

    let url = builder.add_text_field("url", STRING | STORED);
    let depth = builder.add_u64_field("depth", tantivy::schema::INDEXED | STORED);
    let title = builder.add_text_field("title", page_text.clone());
    let content = builder.add_text_field("content", page_text.clone());
    let description = builder.add_text_field("description", page_text);
    let created_at = builder.add_date_field("created_at", STORED);
    let last_updated = builder.add_date_field("last_updated", STORED);
    let dead_since = builder.add_date_field("dead_since", STORED);

    let schema = builder.build();
    let fields = PageFields {
        url,
        depth,
        title,
        content,
        description,
        created_at,
        last_updated,
        dead_since,
    };
    (schema, fields)
}

/// Resolve field handles against an already-open index, verifying that the
/// on-disk schema still declares everything we need.
pub fn resolve_fields(schema: &Schema) -> Result<PageFields> {
    let field = |name: &str| {
        schema
            .get_field(name)
            .map_err(|_| Error::Index(format!("index schema is missing the `{name}` field")))
    };
    Ok(PageFields {
        url: field("url")?,
        depth: field("depth")?,
        title: field("title")?,
        content: field("content")?,
        description: field("description")?,
        created_at: field("created_at")?,
        last_updated: field("last_updated")?,
        dead_since: field("dead_since")?,
    })
}

/// Open the index at `dir`, creating it with a fresh schema when the
/// directory is absent or empty. A missing directory is normal first-run
/// initialization, not an error.
pub fn open_or_create(dir: &Path) -> Result<(Index, PageFields)> {
    std::fs::create_dir_all(dir)?;
    let (schema, _) = build_schema();
    let mmap = MmapDirectory::open(dir)
        .map_err(|e| Error::Index(format!("failed to open index directory: {e}")))?;
    let index = Index::open_or_create(mmap, schema)
        .map_err(|e| Error::Index(format!("failed to open index: {e}")))?;
    let fields = resolve_fields(&index.schema())?;
    crate::analyzer::register(&index);
    Ok((index, fields))
}

/// In-memory index for tests and ephemeral use.
pub fn create_in_ram() -> Result<(Index, PageFields)> {
    let (schema, fields) = build_schema();
    let index = Index::create_in_ram(schema);
    crate::analyzer::register(&index);
    Ok((index, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_directory_creates_index() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("records");
        assert!(!path.exists());

        let (index, _) = open_or_create(&path).expect("create");
        assert!(path.exists());
        assert_eq!(index.schema().fields().count(), 8);
    }

    #[test]
    fn existing_directory_opens_in_place() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("records");

        let (first, _) = open_or_create(&path).expect("create");
        drop(first);
        // Second open must not wipe or re-create the schema.
        let (second, fields) = open_or_create(&path).expect("open");
        assert_eq!(
            second.schema().get_field_name(fields.url),
            "url",
        );
    }
}
