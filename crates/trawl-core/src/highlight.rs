//! Snippet selection and highlighting.
//!
//! Highlights are computed from analyzer offsets rather than re-searching:
//! the stored content is run through the page analyzer, tokens matching the
//! query's positive terms are collected as byte spans, and phrase nodes only
//! mark runs where their tokens appear at consecutive positions. Matched
//! spans are grouped into fragments with a window of context on each side,
//! the strongest fragments are kept in document order, joined with `...`,
//! HTML-escaped, and every matched span is wrapped in `<strong>` tags.

use crate::analyzer::analyzed_tokens;
use crate::config::SearchConfig;
use crate::query::{Ast, FieldScope};
use html_escape::encode_text;
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;
use tantivy::tokenizer::{TextAnalyzer, Token};

/// Matcher for the positive content terms of one parsed query.
pub(crate) struct Highlighter {
    terms: HashSet<String>,
    phrases: Vec<Vec<String>>,
    patterns: Vec<regex::Regex>,
    surround: usize,
    max_fragments: usize,
}

impl Highlighter {
    pub(crate) fn from_ast(ast: &Ast, config: &SearchConfig) -> Self {
        let mut highlighter = Self {
            terms: HashSet::new(),
            phrases: Vec::new(),
            patterns: Vec::new(),
            surround: config.snippet_surround,
            max_fragments: config.snippet_max_fragments.max(1),
        };
        highlighter.collect(ast);
        highlighter
    }

    fn collect(&mut self, ast: &Ast) {
        match ast {
            Ast::Term { scope, variants } if content_scope(*scope) => {
                self.terms.extend(variants.iter().cloned());
            },
            Ast::Phrase { scope, terms } if content_scope(*scope) => {
                self.phrases.push(terms.clone());
            },
            Ast::Wildcard { scope, pattern } if content_scope(*scope) => {
                let anchored = format!(
                    "^{}$",
                    pattern
                        .split('*')
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(".*")
                );
                if let Ok(re) = regex::Regex::new(&anchored) {
                    self.patterns.push(re);
                }
            },
            Ast::Require(inner) => self.collect(inner),
            Ast::Or(items) | Ast::And(items) => {
                for item in items {
                    self.collect(item);
                }
            },
            Ast::AndNot(base, _) => self.collect(base),
            Ast::AndMaybe(base, maybe) => {
                self.collect(base);
                self.collect(maybe);
            },
            // exclusions, literals and off-content scopes contribute nothing
            _ => {},
        }
    }

    /// Build a highlighted snippet for `text`, or `None` when nothing
    /// matches strongly enough to anchor a fragment.
    pub(crate) fn highlight(&self, analyzer: &mut TextAnalyzer, text: &str) -> Option<String> {
        let tokens = analyzed_tokens(analyzer, text);

        let mut spans: Vec<Range<usize>> = tokens
            .iter()
            .filter(|token| {
                self.terms.contains(&token.text)
                    || self.patterns.iter().any(|re| re.is_match(&token.text))
            })
            .map(|token| token.offset_from..token.offset_to)
            .collect();
        for phrase in &self.phrases {
            collect_phrase_runs(&tokens, phrase, &mut spans);
        }
        if spans.is_empty() {
            return None;
        }

        let spans = merge_overlapping(spans);
        let fragments = self.select_fragments(spans);
        Some(self.render(text, &fragments))
    }

    /// Group matched spans into fragments and keep the strongest ones, in
    /// document order.
    fn select_fragments(&self, spans: Vec<Range<usize>>) -> Vec<Vec<Range<usize>>> {
        let gap = self.surround * 2;
        let mut fragments: Vec<Vec<Range<usize>>> = Vec::new();
        for span in spans {
            let joins = fragments
                .last()
                .and_then(|group| group.last())
                .is_some_and(|last| span.start <= last.end + gap);
            if joins {
                if let Some(group) = fragments.last_mut() {
                    group.push(span);
                }
            } else {
                fragments.push(vec![span]);
            }
        }

        if fragments.len() > self.max_fragments {
            // strongest fragments win, then restore document order
            fragments.sort_by_key(|group| std::cmp::Reverse(group.len()));
            fragments.truncate(self.max_fragments);
            fragments.sort_by_key(|group| group.first().map_or(0, |r| r.start));
        }
        fragments
    }

    fn render(&self, text: &str, fragments: &[Vec<Range<usize>>]) -> String {
        let mut out = String::new();
        for (i, group) in fragments.iter().enumerate() {
            if i > 0 {
                out.push_str("...");
            }
            let first = group.first().map_or(0, |r| r.start);
            let last = group.last().map_or(0, |r| r.end);
            let start = floor_char_boundary(text, first.saturating_sub(self.surround));
            let end = ceil_char_boundary(text, (last + self.surround).min(text.len()));

            let mut cursor = start;
            for matched in group {
                out.push_str(&encode_text(&text[cursor..matched.start]));
                out.push_str("<strong>");
                out.push_str(&encode_text(&text[matched.start..matched.end]));
                out.push_str("</strong>");
                cursor = matched.end;
            }
            out.push_str(&encode_text(&text[cursor..end]));
        }
        out
    }
}

fn content_scope(scope: FieldScope) -> bool {
    matches!(scope, FieldScope::Default | FieldScope::Content)
}

/// Mark runs where the phrase tokens appear at consecutive positions. A
/// phrase word scattered elsewhere in the text is not highlighted.
fn collect_phrase_runs(tokens: &[Token], phrase: &[String], spans: &mut Vec<Range<usize>>) {
    if phrase.is_empty() {
        return;
    }
    let mut by_pos: BTreeMap<usize, Vec<&Token>> = BTreeMap::new();
    for token in tokens {
        by_pos.entry(token.position).or_default().push(token);
    }
    for &start in by_pos.keys() {
        let matched: Vec<&Token> = phrase
            .iter()
            .enumerate()
            .filter_map(|(i, word)| {
                by_pos
                    .get(&(start + i))
                    .and_then(|candidates| candidates.iter().find(|t| t.text == *word))
                    .copied()
            })
            .collect();
        if matched.len() == phrase.len() {
            spans.extend(matched.iter().map(|t| t.offset_from..t.offset_to));
        }
    }
}

/// Sort spans and merge overlapping or touching ones.
fn merge_overlapping(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    spans.sort_by_key(|r| (r.start, r.end));
    let mut merged: Vec<Range<usize>> = Vec::new();
    for span in spans {
        if let Some(last) = merged.last_mut() {
            if span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        }
        merged.push(span);
    }
    merged
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index == 0 {
        return 0;
    }
    text.char_indices()
        .take_while(|(i, _)| *i <= index)
        .last()
        .map_or(0, |(i, _)| i)
}

/// Smallest char boundary at or above `index`.
fn ceil_char_boundary(text: &str, index: usize) -> usize {
    text.char_indices()
        .find(|(i, _)| *i >= index)
        .map_or(text.len(), |(i, _)| i)
}

/// Leading `max_chars` characters of `text`, the last-resort snippet.
pub(crate) fn leading_fragment(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;
    use crate::query::parse;

    fn snippet(query: &str, content: &str) -> Option<String> {
        let mut analyzer = analyzer::analyzer();
        let ast = parse(query, &mut analyzer);
        let highlighter = Highlighter::from_ast(&ast, &SearchConfig::default());
        highlighter.highlight(&mut analyzer, content)
    }

    #[test]
    fn single_term_is_emphasized() {
        let out = snippet("hello", "say hello to the world").expect("snippet");
        assert!(out.contains("<strong>hello</strong>"), "got: {out}");
        assert!(out.contains("say"));
    }

    #[test]
    fn no_match_yields_none() {
        assert!(snippet("absent", "nothing to see here").is_none());
    }

    #[test]
    fn html_is_escaped() {
        let out = snippet("hello", "<b> & hello </b>").expect("snippet");
        assert!(out.contains("&lt;b&gt;"), "got: {out}");
        assert!(!out.contains("<b>"));
        assert!(out.contains("<strong>hello</strong>"));
    }

    #[test]
    fn distant_matches_join_with_ellipsis() {
        let filler = "x".repeat(200);
        let content = format!("hello {filler} hello");
        let out = snippet("hello", &content).expect("snippet");
        assert!(out.contains("..."), "got: {out}");
        assert_eq!(out.matches("<strong>hello</strong>").count(), 2);
    }

    #[test]
    fn context_is_windowed() {
        let long = format!("{} hello {}", "a".repeat(300), "b".repeat(300));
        let out = snippet("hello", &long).expect("snippet");
        // the fragment stays near the match instead of swallowing the text
        assert!(out.len() < 120, "got: {} bytes", out.len());
    }

    #[test]
    fn phrase_only_marks_adjacent_runs() {
        let content = "hello there world and then hello world again";
        let out = snippet("\"hello world\"", content).expect("snippet");
        assert_eq!(out.matches("<strong>hello</strong>").count(), 1, "got: {out}");
        assert_eq!(out.matches("<strong>world</strong>").count(), 1);
    }

    #[test]
    fn scattered_phrase_words_yield_none() {
        assert!(snippet("\"hello world\"", "hello over here, world over there... nowhere adjacent").is_none());
    }

    #[test]
    fn compound_sub_token_matches() {
        let out = snippet("foo", "prefix foo-bar suffix").expect("snippet");
        assert!(out.contains("<strong>foo</strong>"), "got: {out}");
    }

    #[test]
    fn wildcard_matches_tokens() {
        let out = snippet("hel*o", "say hello again").expect("snippet");
        assert!(out.contains("<strong>hello</strong>"), "got: {out}");
    }

    #[test]
    fn excluded_terms_are_not_highlighted() {
        let out = snippet("hello -world", "hello world").expect("snippet");
        assert!(out.contains("<strong>hello</strong>"));
        assert!(!out.contains("<strong>world</strong>"));
    }

    #[test]
    fn fragment_cap_keeps_strongest() {
        let filler = "y".repeat(120);
        let content = format!(
            "alpha {filler} alpha {filler} alpha {filler} alpha alpha {filler} alpha"
        );
        let out = snippet("alpha", &content).expect("snippet");
        // at most max_fragments groups survive
        assert!(out.matches("...").count() <= 2, "got: {out}");
    }

    #[test]
    fn unicode_boundaries_are_safe() {
        let content = format!("{} hello {}", "👨‍👩‍👧‍👦".repeat(10), "🏳️‍🌈".repeat(10));
        let out = snippet("hello", &content).expect("snippet");
        assert!(out.contains("<strong>hello</strong>"));
        assert!(out.is_char_boundary(0));
        assert!(out.is_char_boundary(out.len()));
    }

    #[test]
    fn leading_fragment_is_char_safe() {
        let text = "é".repeat(300);
        let lead = leading_fragment(&text, 170);
        assert_eq!(lead.chars().count(), 170);
    }
}
