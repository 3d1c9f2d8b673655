//! Query parsing, validation and lowering.
//!
//! The grammar is fixed: bare terms combine as an OR group with a
//! coordination decay, `"quoted phrases"` require adjacency,
//! `'single-quoted'` text is taken literally, `*` marks wildcards,
//! `field:term` scopes a term to one field, `+`/`-` mark required and
//! excluded terms, and `AND` / `OR` / `ANDNOT` / `ANDMAYBE` (or `&`, `|`,
//! `&!`, `&~`) combine sub-expressions, with parentheses for grouping.
//!
//! The parser never fails. Malformed input — unmatched quotes, stray
//! operators, empty groups — recovers to the closest sensible AST, bottoming
//! out at [`Ast::Empty`]. Degenerate queries are caught by [`validate`]
//! before execution, never executed.

use crate::analyzer::analyzed_tokens;
use crate::schema::PageFields;
use std::collections::BTreeMap;
use tantivy::Term;
use tantivy::query::{
    BooleanQuery, BoostQuery, DisjunctionMaxQuery, EmptyQuery, Occur, PhraseQuery, Query,
    RegexQuery, TermQuery,
};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::TextAnalyzer;

/// Score multiplier for title matches relative to content.
const TITLE_BOOST: f32 = 1.5;
/// Score damping for url matches.
const URL_BOOST: f32 = 0.5;

/// Which field a term applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    /// No explicit scope; searches `content`.
    Default,
    /// `url:` — raw term matching.
    Url,
    /// `title:` — boosted above content.
    Title,
    /// `content:`
    Content,
    /// `description:`
    Description,
}

impl FieldScope {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "url" => Some(Self::Url),
            "title" => Some(Self::Title),
            "content" => Some(Self::Content),
            "description" => Some(Self::Description),
            _ => None,
        }
    }
}

/// Parsed query tree. Terms are pre-analyzed: each carries the normalized
/// token variants the analyzer produced for it.
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    /// Matches nothing; the result of degenerate input.
    Empty,
    /// One word, expanded to its analyzed variants (`foo-bar` carries
    /// `foo-bar`, `foobar`, `foo`, `bar`); any variant may match.
    Term {
        /// Target field.
        scope: FieldScope,
        /// Normalized token alternatives.
        variants: Vec<String>,
    },
    /// Adjacent token sequence.
    Phrase {
        /// Target field.
        scope: FieldScope,
        /// Normalized tokens that must appear consecutively.
        terms: Vec<String>,
    },
    /// Verbatim text, matched raw against the url field.
    Literal {
        /// Target field.
        scope: FieldScope,
        /// Unanalyzed text.
        text: String,
    },
    /// `*` pattern over normalized terms.
    Wildcard {
        /// Target field.
        scope: FieldScope,
        /// Normalized pattern; `*` matches any run of characters.
        pattern: String,
    },
    /// `+term`: must match.
    Require(Box<Ast>),
    /// `-term` / `NOT term`: must not match.
    Exclude(Box<Ast>),
    /// OR group; extra matching branches raise the score under the
    /// coordination decay.
    Or(Vec<Ast>),
    /// AND group.
    And(Vec<Ast>),
    /// Left must match, right must not.
    AndNot(Box<Ast>, Box<Ast>),
    /// Left must match, right only contributes score.
    AndMaybe(Box<Ast>, Box<Ast>),
}

/// Parse a query string. Never fails; see the module docs for recovery
/// behavior.
pub fn parse(input: &str, analyzer: &mut TextAnalyzer) -> Ast {
    let lexemes = lex(input);
    Parser {
        lexemes,
        pos: 0,
        analyzer,
    }
    .parse_group(false)
}

/// Whether an AST is worth executing.
///
/// Rejects trees that would match everything or nothing: the empty query, a
/// bare-`*` wildcard, pure exclusions, and compound nodes none of whose
/// positive branches survive the same check. Runs before execution so a
/// match-everything query is refused rather than scanned.
#[must_use]
pub fn validate(ast: &Ast) -> bool {
    match ast {
        Ast::Empty | Ast::Exclude(_) => false,
        Ast::Term { .. } | Ast::Phrase { .. } | Ast::Literal { .. } => true,
        Ast::Wildcard { pattern, .. } => pattern.chars().any(|c| c != '*'),
        Ast::Require(inner) => validate(inner),
        Ast::Or(items) | Ast::And(items) => items.iter().any(validate),
        Ast::AndNot(base, _) | Ast::AndMaybe(base, _) => validate(base),
    }
}

// ---------------------------------------------------------------- lexing

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    LParen,
    RParen,
    Plus,
    Minus,
    And,
    Or,
    AndNot,
    AndMaybe,
    Not,
    Phrase(String),
    Literal(String),
    Word(String),
}

fn lex(input: &str) -> Vec<Lexeme> {
    let mut out = Vec::new();
    let mut chars = input.chars().peekable();
    let mut at_word_start = true;

    while let Some(&c) = chars.peek() {
        match c {
            _ if c.is_whitespace() => {
                chars.next();
                at_word_start = true;
            },
            '(' => {
                chars.next();
                out.push(Lexeme::LParen);
                at_word_start = true;
            },
            ')' => {
                chars.next();
                out.push(Lexeme::RParen);
                at_word_start = true;
            },
            '"' => {
                chars.next();
                let mut text = String::new();
                // unmatched quotes run to the end of input
                for inner in chars.by_ref() {
                    if inner == '"' {
                        break;
                    }
                    text.push(inner);
                }
                out.push(Lexeme::Phrase(text));
                at_word_start = true;
            },
            '\'' if at_word_start => {
                chars.next();
                let mut text = String::new();
                for inner in chars.by_ref() {
                    if inner == '\'' {
                        break;
                    }
                    text.push(inner);
                }
                out.push(Lexeme::Literal(text));
                at_word_start = true;
            },
            '+' if at_word_start => {
                chars.next();
                out.push(Lexeme::Plus);
                at_word_start = false;
            },
            '-' if at_word_start => {
                chars.next();
                out.push(Lexeme::Minus);
                at_word_start = false;
            },
            '&' => {
                chars.next();
                let op = match chars.peek() {
                    Some('!') => {
                        chars.next();
                        Lexeme::AndNot
                    },
                    Some('~') => {
                        chars.next();
                        Lexeme::AndMaybe
                    },
                    _ => Lexeme::And,
                };
                out.push(op);
                at_word_start = true;
            },
            '|' => {
                chars.next();
                out.push(Lexeme::Or);
                at_word_start = true;
            },
            _ => {
                let mut word = String::new();
                while let Some(&w) = chars.peek() {
                    if w == '\'' && word.ends_with(':') {
                        // quoted literal glued to a field prefix: url:'...'
                        word.push(w);
                        chars.next();
                        for inner in chars.by_ref() {
                            word.push(inner);
                            if inner == '\'' {
                                break;
                            }
                        }
                        continue;
                    }
                    if w.is_whitespace() || matches!(w, '(' | ')' | '"' | '&' | '|') {
                        break;
                    }
                    word.push(w);
                    chars.next();
                }
                out.push(match word.as_str() {
                    "AND" => Lexeme::And,
                    "OR" => Lexeme::Or,
                    "ANDNOT" => Lexeme::AndNot,
                    "ANDMAYBE" => Lexeme::AndMaybe,
                    "NOT" => Lexeme::Not,
                    _ => Lexeme::Word(word),
                });
                at_word_start = true;
            },
        }
    }
    out
}

// --------------------------------------------------------------- parsing

struct Parser<'a> {
    lexemes: Vec<Lexeme>,
    pos: usize,
    analyzer: &'a mut TextAnalyzer,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn bump(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        if lexeme.is_some() {
            self.pos += 1;
        }
        lexeme
    }

    /// A sequence of chunks forming one OR group. Explicit `OR` between
    /// chunks is the same as adjacency; stray operators are skipped.
    fn parse_group(&mut self, in_parens: bool) -> Ast {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(Lexeme::RParen) => {
                    self.bump();
                    if in_parens {
                        break;
                    }
                    // stray closing paren at the top level
                },
                Some(
                    Lexeme::Or | Lexeme::And | Lexeme::AndNot | Lexeme::AndMaybe,
                ) => {
                    self.bump();
                },
                _ => {
                    let chunk = self.parse_chunk();
                    if chunk != Ast::Empty {
                        items.push(chunk);
                    }
                },
            }
        }
        match items.len() {
            0 => Ast::Empty,
            1 => items.remove(0),
            _ => Ast::Or(items),
        }
    }

    /// One operand plus any infix AND-family operators, which bind tighter
    /// than the surrounding OR group.
    fn parse_chunk(&mut self) -> Ast {
        let mut left = self.parse_unary();
        loop {
            match self.peek() {
                Some(Lexeme::And) => {
                    self.bump();
                    let right = self.parse_unary();
                    left = combine_and(left, right);
                },
                Some(Lexeme::AndNot) => {
                    self.bump();
                    let right = self.parse_unary();
                    left = match (left, right) {
                        (l, Ast::Empty) => l,
                        (Ast::Empty, r) => r,
                        (l, r) => Ast::AndNot(Box::new(l), Box::new(r)),
                    };
                },
                Some(Lexeme::AndMaybe) => {
                    self.bump();
                    let right = self.parse_unary();
                    left = match (left, right) {
                        (l, Ast::Empty) => l,
                        (Ast::Empty, r) => r,
                        (l, r) => Ast::AndMaybe(Box::new(l), Box::new(r)),
                    };
                },
                _ => break,
            }
        }
        left
    }

    fn parse_unary(&mut self) -> Ast {
        match self.peek() {
            Some(Lexeme::Plus) => {
                self.bump();
                match self.parse_unary() {
                    Ast::Empty => Ast::Empty,
                    inner => Ast::Require(Box::new(inner)),
                }
            },
            Some(Lexeme::Minus | Lexeme::Not) => {
                self.bump();
                match self.parse_unary() {
                    Ast::Empty => Ast::Empty,
                    inner => Ast::Exclude(Box::new(inner)),
                }
            },
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Ast {
        match self.peek().cloned() {
            Some(Lexeme::LParen) => {
                self.bump();
                self.parse_group(true)
            },
            Some(Lexeme::Phrase(text)) => {
                self.bump();
                self.phrase_ast(FieldScope::Default, &text)
            },
            Some(Lexeme::Literal(text)) => {
                self.bump();
                self.literal_ast(FieldScope::Default, &text)
            },
            Some(Lexeme::Word(word)) => {
                self.bump();
                self.word_ast(&word)
            },
            // operators, closing parens and end of input belong to callers
            _ => Ast::Empty,
        }
    }

    fn word_ast(&mut self, word: &str) -> Ast {
        if let Some((name, rest)) = word.split_once(':') {
            if let Some(scope) = FieldScope::parse(name) {
                if rest.is_empty() {
                    // the quoted part was lexed separately: `title:"foo bar"`
                    return match self.peek().cloned() {
                        Some(Lexeme::Phrase(text)) => {
                            self.bump();
                            self.phrase_ast(scope, &text)
                        },
                        Some(Lexeme::Literal(text)) => {
                            self.bump();
                            self.literal_ast(scope, &text)
                        },
                        _ => Ast::Empty,
                    };
                }
                if rest.starts_with('\'') {
                    return self.literal_ast(scope, rest.trim_matches('\''));
                }
                return self.term_ast(scope, rest);
            }
        }
        // unknown field names degrade to a plain term over the whole word
        self.term_ast(FieldScope::Default, word)
    }

    fn term_ast(&mut self, scope: FieldScope, text: &str) -> Ast {
        if text.contains('*') {
            return self.wildcard_ast(scope, text);
        }
        let variants = query_variants(self.analyzer, text);
        if variants.is_empty() {
            Ast::Empty
        } else {
            Ast::Term { scope, variants }
        }
    }

    fn phrase_ast(&mut self, scope: FieldScope, text: &str) -> Ast {
        if scope == FieldScope::Url {
            return self.literal_ast(scope, text);
        }
        let mut terms = phrase_terms(self.analyzer, text);
        match terms.len() {
            0 => Ast::Empty,
            1 => Ast::Term {
                scope,
                variants: vec![terms.remove(0)],
            },
            _ => Ast::Phrase { scope, terms },
        }
    }

    fn literal_ast(&mut self, scope: FieldScope, text: &str) -> Ast {
        if text.is_empty() {
            return Ast::Empty;
        }
        if scope == FieldScope::Url {
            return Ast::Literal {
                scope,
                text: text.to_string(),
            };
        }
        self.phrase_ast(scope, text)
    }

    fn wildcard_ast(&mut self, scope: FieldScope, text: &str) -> Ast {
        let mut pattern = String::new();
        for (i, chunk) in text.split('*').enumerate() {
            if i > 0 {
                pattern.push('*');
            }
            pattern.push_str(&normalize_chunk(self.analyzer, chunk));
        }
        Ast::Wildcard { scope, pattern }
    }
}

fn combine_and(left: Ast, right: Ast) -> Ast {
    match (left, right) {
        (l, Ast::Empty) => l,
        (Ast::Empty, r) => r,
        (Ast::And(mut items), r) => {
            items.push(r);
            Ast::And(items)
        },
        (l, r) => Ast::And(vec![l, r]),
    }
}

/// All normalized variants the analyzer produces for one query word.
fn query_variants(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
    let mut variants = Vec::new();
    for token in analyzed_tokens(analyzer, text) {
        if !variants.contains(&token.text) {
            variants.push(token.text);
        }
    }
    variants
}

/// The adjacency chain for a phrase: the narrowest token at each position,
/// so compound words contribute their sub-tokens in order.
fn phrase_terms(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
    let mut by_pos: BTreeMap<usize, (usize, String)> = BTreeMap::new();
    for token in analyzed_tokens(analyzer, text) {
        let span = token.offset_to - token.offset_from;
        let narrower = match by_pos.get(&token.position) {
            Some((existing, _)) => span < *existing,
            None => true,
        };
        if narrower {
            by_pos.insert(token.position, (span, token.text));
        }
    }
    by_pos.into_values().map(|(_, text)| text).collect()
}

/// Normalize one wildcard chunk through the analyzer, falling back to a
/// plain lowercase when the chunk splinters.
fn normalize_chunk(analyzer: &mut TextAnalyzer, chunk: &str) -> String {
    if chunk.is_empty() {
        return String::new();
    }
    let tokens = analyzed_tokens(analyzer, chunk);
    tokens
        .into_iter()
        .next()
        .map_or_else(|| chunk.to_lowercase(), |t| t.text)
}

// -------------------------------------------------------------- lowering

/// Lower an AST to an executable tantivy query.
pub(crate) fn to_query(ast: &Ast, fields: &PageFields, decay: f32) -> Box<dyn Query> {
    match ast {
        Ast::Empty => Box::new(EmptyQuery),
        Ast::Term { scope, variants } => {
            let (field, boost, raw) = scope_field(*scope, fields);
            let mut queries: Vec<Box<dyn Query>> = variants
                .iter()
                .map(|v| term_query(field, v, raw))
                .collect();
            let query = if queries.len() == 1 {
                queries.remove(0)
            } else {
                // variants of one word are alternatives, not extra evidence
                Box::new(DisjunctionMaxQuery::new(queries))
            };
            boosted(query, boost)
        },
        Ast::Phrase { scope, terms } => {
            let (field, boost, raw) = scope_field(*scope, fields);
            if terms.len() < 2 {
                return match terms.first() {
                    Some(term) => boosted(term_query(field, term, raw), boost),
                    None => Box::new(EmptyQuery),
                };
            }
            let terms = terms
                .iter()
                .map(|t| Term::from_field_text(field, t))
                .collect();
            boosted(Box::new(PhraseQuery::new(terms)), boost)
        },
        Ast::Literal { scope, text } => {
            let (field, boost, _) = scope_field(*scope, fields);
            boosted(term_query(field, text, true), boost)
        },
        Ast::Wildcard { scope, pattern } => {
            let (field, boost, _) = scope_field(*scope, fields);
            let regex = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            match RegexQuery::from_pattern(&regex, field) {
                Ok(query) => boosted(Box::new(query), boost),
                Err(_) => Box::new(EmptyQuery),
            }
        },
        Ast::Require(inner) => to_query(inner, fields, decay),
        Ast::Exclude(inner) => Box::new(BooleanQuery::new(vec![(
            // a lone exclusion matches nothing, it does not match its inverse
            Occur::MustNot,
            to_query(inner, fields, decay),
        )])),
        Ast::Or(items) => {
            let mut must = Vec::new();
            let mut must_not = Vec::new();
            let mut plain = Vec::new();
            for item in items {
                match item {
                    Ast::Require(inner) => must.push(to_query(inner, fields, decay)),
                    Ast::Exclude(inner) => must_not.push(to_query(inner, fields, decay)),
                    other => plain.push(to_query(other, fields, decay)),
                }
            }
            let plain = match plain.len() {
                0 => None,
                1 => Some(plain.remove(0)),
                _ => Some(Box::new(DisjunctionMaxQuery::with_tie_breaker(plain, decay))
                    as Box<dyn Query>),
            };
            if must.is_empty() && must_not.is_empty() {
                return plain.unwrap_or_else(|| Box::new(EmptyQuery));
            }
            let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
            for query in must {
                clauses.push((Occur::Must, query));
            }
            if let Some(query) = plain {
                clauses.push((Occur::Should, query));
            }
            for query in must_not {
                clauses.push((Occur::MustNot, query));
            }
            Box::new(BooleanQuery::new(clauses))
        },
        Ast::And(items) => {
            let clauses: Vec<(Occur, Box<dyn Query>)> = items
                .iter()
                .map(|item| match item {
                    Ast::Exclude(inner) => (Occur::MustNot, to_query(inner, fields, decay)),
                    other => (Occur::Must, to_query(other, fields, decay)),
                })
                .collect();
            Box::new(BooleanQuery::new(clauses))
        },
        Ast::AndNot(base, exclude) => Box::new(BooleanQuery::new(vec![
            (Occur::Must, to_query(base, fields, decay)),
            (Occur::MustNot, to_query(exclude, fields, decay)),
        ])),
        Ast::AndMaybe(base, maybe) => Box::new(BooleanQuery::new(vec![
            (Occur::Must, to_query(base, fields, decay)),
            (Occur::Should, to_query(maybe, fields, decay)),
        ])),
    }
}

fn scope_field(scope: FieldScope, fields: &PageFields) -> (Field, f32, bool) {
    match scope {
        FieldScope::Default | FieldScope::Content => (fields.content, 1.0, false),
        FieldScope::Url => (fields.url, URL_BOOST, true),
        FieldScope::Title => (fields.title, TITLE_BOOST, false),
        FieldScope::Description => (fields.description, 1.0, false),
    }
}

fn term_query(field: Field, text: &str, raw: bool) -> Box<dyn Query> {
    let option = if raw {
        IndexRecordOption::Basic
    } else {
        IndexRecordOption::WithFreqs
    };
    Box::new(TermQuery::new(Term::from_field_text(field, text), option))
}

fn boosted(query: Box<dyn Query>, boost: f32) -> Box<dyn Query> {
    if (boost - 1.0).abs() < f32::EPSILON {
        query
    } else {
        Box::new(BoostQuery::new(query, boost))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer;

    fn parse_str(input: &str) -> Ast {
        let mut analyzer = analyzer::analyzer();
        parse(input, &mut analyzer)
    }

    fn term(text: &str) -> Ast {
        Ast::Term {
            scope: FieldScope::Default,
            variants: vec![text.to_string()],
        }
    }

    #[test]
    fn empty_input_is_empty() {
        assert_eq!(parse_str(""), Ast::Empty);
        assert_eq!(parse_str("   "), Ast::Empty);
        assert_eq!(parse_str("..."), Ast::Empty);
        assert!(!validate(&parse_str("")));
    }

    #[test]
    fn bare_terms_form_an_or_group() {
        assert_eq!(parse_str("hello"), term("hello"));
        assert_eq!(
            parse_str("hello world"),
            Ast::Or(vec![term("hello"), term("world")])
        );
    }

    #[test]
    fn terms_are_normalized() {
        assert_eq!(parse_str("HeLLo"), term("hello"));
        assert_eq!(parse_str("Café"), term("cafe"));
    }

    #[test]
    fn compound_terms_carry_variants() {
        let Ast::Term { variants, .. } = parse_str("foo-bar") else {
            panic!("expected a term");
        };
        assert!(variants.contains(&"foo-bar".to_string()));
        assert!(variants.contains(&"foobar".to_string()));
        assert!(variants.contains(&"foo".to_string()));
        assert!(variants.contains(&"bar".to_string()));
    }

    #[test]
    fn quoted_text_is_a_phrase() {
        assert_eq!(
            parse_str("\"hello world\""),
            Ast::Phrase {
                scope: FieldScope::Default,
                terms: vec!["hello".to_string(), "world".to_string()],
            }
        );
    }

    #[test]
    fn phrase_spans_compound_splits() {
        let Ast::Phrase { terms, .. } = parse_str("\"foo-bar baz\"") else {
            panic!("expected a phrase");
        };
        assert_eq!(terms, vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn unmatched_quote_recovers() {
        assert_eq!(
            parse_str("\"hello world"),
            Ast::Phrase {
                scope: FieldScope::Default,
                terms: vec!["hello".to_string(), "world".to_string()],
            }
        );
    }

    #[test]
    fn single_word_phrase_is_a_term() {
        assert_eq!(parse_str("\"hello\""), term("hello"));
    }

    #[test]
    fn plus_and_minus_prefixes() {
        assert_eq!(
            parse_str("+hello world"),
            Ast::Or(vec![Ast::Require(Box::new(term("hello"))), term("world")])
        );
        assert_eq!(parse_str("-hello"), Ast::Exclude(Box::new(term("hello"))));
    }

    #[test]
    fn pure_negation_is_invalid() {
        assert!(!validate(&parse_str("-hello")));
        assert!(!validate(&parse_str("-hello -world")));
        assert!(validate(&parse_str("-hello world")));
    }

    #[test]
    fn field_scoping() {
        assert_eq!(
            parse_str("title:hello"),
            Ast::Term {
                scope: FieldScope::Title,
                variants: vec!["hello".to_string()],
            }
        );
        assert_eq!(
            parse_str("title:\"hello world\""),
            Ast::Phrase {
                scope: FieldScope::Title,
                terms: vec!["hello".to_string(), "world".to_string()],
            }
        );
    }

    #[test]
    fn unknown_field_degrades_to_a_term() {
        let Ast::Term { scope, variants } = parse_str("nope:hello") else {
            panic!("expected a term");
        };
        assert_eq!(scope, FieldScope::Default);
        assert!(variants.contains(&"nope".to_string()));
        assert!(variants.contains(&"hello".to_string()));
    }

    #[test]
    fn url_literals_stay_raw() {
        assert_eq!(
            parse_str("url:'http://x.test/?a=\"b\"'"),
            Ast::Literal {
                scope: FieldScope::Url,
                text: "http://x.test/?a=\"b\"".to_string(),
            }
        );
    }

    #[test]
    fn explicit_operators() {
        assert_eq!(
            parse_str("hello AND world"),
            Ast::And(vec![term("hello"), term("world")])
        );
        assert_eq!(
            parse_str("hello & world"),
            Ast::And(vec![term("hello"), term("world")])
        );
        assert_eq!(
            parse_str("hello ANDNOT world"),
            Ast::AndNot(Box::new(term("hello")), Box::new(term("world")))
        );
        assert_eq!(
            parse_str("hello &! world"),
            Ast::AndNot(Box::new(term("hello")), Box::new(term("world")))
        );
        assert_eq!(
            parse_str("hello ANDMAYBE world"),
            Ast::AndMaybe(Box::new(term("hello")), Box::new(term("world")))
        );
        assert_eq!(
            parse_str("hello OR world"),
            Ast::Or(vec![term("hello"), term("world")])
        );
        assert_eq!(
            parse_str("NOT hello world"),
            Ast::Or(vec![Ast::Exclude(Box::new(term("hello"))), term("world")])
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        assert_eq!(
            parse_str("a OR b AND c"),
            Ast::Or(vec![
                term("a"),
                Ast::And(vec![term("b"), term("c")]),
            ])
        );
    }

    #[test]
    fn groups_nest() {
        assert_eq!(
            parse_str("(a b) AND c"),
            Ast::And(vec![Ast::Or(vec![term("a"), term("b")]), term("c")])
        );
    }

    #[test]
    fn stray_operators_recover() {
        assert_eq!(parse_str("AND"), Ast::Empty);
        assert_eq!(parse_str("hello AND"), term("hello"));
        assert_eq!(parse_str("OR hello"), term("hello"));
        assert_eq!(parse_str(") ( hello"), term("hello"));
        assert_eq!(parse_str("()"), Ast::Empty);
        assert_eq!(parse_str("+"), Ast::Empty);
    }

    #[test]
    fn wildcards() {
        assert_eq!(
            parse_str("hel*o"),
            Ast::Wildcard {
                scope: FieldScope::Default,
                pattern: "hel*o".to_string(),
            }
        );
        assert!(validate(&parse_str("hel*o")));
        assert!(!validate(&parse_str("*")));
        assert!(!validate(&parse_str("**")));
    }

    #[test]
    fn validation_recurses_through_compounds() {
        assert!(validate(&parse_str("(hello) AND world")));
        assert!(!validate(&Ast::Or(vec![Ast::Empty, Ast::Empty])));
        assert!(validate(&Ast::Or(vec![Ast::Empty, term("x")])));
        assert!(!validate(&Ast::AndNot(
            Box::new(Ast::Empty),
            Box::new(term("x"))
        )));
    }

    #[test]
    fn lowering_smoke() {
        let (_, fields) = crate::schema::build_schema();
        for input in [
            "",
            "hello",
            "hello world",
            "\"hello world\"",
            "+a -b c",
            "title:x AND (y OR z)",
            "a &! b",
            "a &~ b",
            "wild*card",
            "url:'http://x.test/'",
        ] {
            let ast = parse_str(input);
            // must not panic for any recovered AST
            let _query = to_query(&ast, &fields, 0.9);
        }
    }
}
