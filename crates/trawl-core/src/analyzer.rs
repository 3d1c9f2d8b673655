//! Text analysis for page fields.
//!
//! The same pipeline runs at index time and query time:
//!
//! 1. split on whitespace, stripping leading and trailing punctuation from
//!    each token;
//! 2. expand each token: the original is kept, an interior-punctuation-free
//!    variant is added, and compound/camel-case/alphanumeric tokens are
//!    split into sub-tokens, so `foo-bar` matches `foo`, `bar`, `foobar`
//!    and `foo-bar`;
//! 3. lowercase and fold accented characters to their ASCII base form
//!    (tantivy's `LowerCaser` and `AsciiFoldingFilter`);
//! 4. drop duplicate emissions (same text, position and offsets) so a plain
//!    word is not scored twice.
//!
//! Sub-tokens take consecutive positions, which lets phrase queries span
//! compound splits (`"foo bar"` matches the text `foo-bar`). All tokens
//! carry byte offsets into the source text; the highlighter depends on them.

use tantivy::Index;
use tantivy::tokenizer::{
    AsciiFoldingFilter, LowerCaser, TextAnalyzer, Token, TokenStream, Tokenizer,
};

/// Name under which the page analyzer is registered on the index.
pub const PAGE_TOKENIZER: &str = "page_text";

/// Build the full analysis chain used for `title`, `content` and
/// `description`.
#[must_use]
pub fn analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(CompoundTokenizer)
        .filter(LowerCaser)
        .filter(AsciiFoldingFilter)
        .build()
}

/// Register the page analyzer on an index. Must run before the first write
/// and before queries are lowered against text fields.
pub fn register(index: &Index) {
    index.tokenizers().register(PAGE_TOKENIZER, analyzer());
}

/// Run `text` through an analyzer and collect the produced tokens.
pub(crate) fn analyzed_tokens(analyzer: &mut TextAnalyzer, text: &str) -> Vec<Token> {
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().clone());
    }
    tokens
}

/// Whitespace tokenizer with punctuation stripping and intra-word expansion.
///
/// Emits, per whitespace-delimited word: the word itself, a variant with
/// interior punctuation removed (when it differs), and intra-word sub-tokens
/// (when the word splits). Case normalization is left to the filter chain.
#[derive(Clone, Default)]
pub struct CompoundTokenizer;

impl Tokenizer for CompoundTokenizer {
    type TokenStream<'a> = CompoundTokenStream;

    fn token_stream<'a>(&'a mut self, text: &'a str) -> CompoundTokenStream {
        CompoundTokenStream {
            tokens: tokenize(text),
            cursor: 0,
        }
    }
}

/// Pre-computed token sequence over one input text.
pub struct CompoundTokenStream {
    tokens: Vec<Token>,
    cursor: usize,
}

impl TokenStream for CompoundTokenStream {
    fn advance(&mut self) -> bool {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn token(&self) -> &Token {
        &self.tokens[self.cursor - 1]
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.tokens[self.cursor - 1]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Lower,
    Upper,
    Digit,
    Other,
}

fn classify(c: char) -> CharClass {
    if c.is_numeric() {
        CharClass::Digit
    } else if c.is_uppercase() {
        CharClass::Upper
    } else if c.is_alphabetic() {
        CharClass::Lower
    } else {
        CharClass::Other
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut position = 0usize;
    let mut iter = text.char_indices().peekable();

    while let Some(&(start, first)) = iter.peek() {
        if first.is_whitespace() {
            iter.next();
            continue;
        }

        // Consume one whitespace-delimited word.
        let mut end = start;
        while let Some(&(i, c)) = iter.peek() {
            if c.is_whitespace() {
                break;
            }
            end = i + c.len_utf8();
            iter.next();
        }
        let raw = &text[start..end];

        // Strip surrounding punctuation. A word with no word characters at
        // all ("--", "...") vanishes without consuming a position.
        let Some(lead) = raw.char_indices().find(|(_, c)| is_word_char(*c)) else {
            continue;
        };
        let trail = raw
            .char_indices()
            .rev()
            .find(|(_, c)| is_word_char(*c))
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(raw.len());
        let word_start = start + lead.0;
        let word_end = start + trail;

        position += emit_word(&mut tokens, &text[word_start..word_end], word_start, position);
    }

    tokens
}

/// Emit all variants of one stripped word. Returns how many positions the
/// word consumes (one per sub-token, at least one).
fn emit_word(tokens: &mut Vec<Token>, word: &str, base_offset: usize, base_pos: usize) -> usize {
    let mut push = |text: String, from: usize, to: usize, pos: usize| {
        let duplicate = tokens.iter().rev().take(4).any(|t| {
            t.text == text && t.position == pos && t.offset_from == from && t.offset_to == to
        });
        if !duplicate {
            tokens.push(Token {
                offset_from: from,
                offset_to: to,
                position: pos,
                text,
                position_length: 1,
            });
        }
    };

    // The original, surrounding punctuation already stripped.
    push(
        word.to_string(),
        base_offset,
        base_offset + word.len(),
        base_pos,
    );

    // Interior punctuation removed: "foo-bar" -> "foobar".
    let merged: String = word.chars().filter(|c| classify(*c) != CharClass::Other).collect();
    if merged != word {
        push(merged, base_offset, base_offset + word.len(), base_pos);
    }

    // Intra-word sub-tokens at consecutive positions.
    let parts = split_parts(word);
    if parts.len() > 1 {
        for (i, (from, to)) in parts.iter().enumerate() {
            push(
                word[*from..*to].to_string(),
                base_offset + from,
                base_offset + to,
                base_pos + i,
            );
        }
        parts.len()
    } else {
        1
    }
}

/// Byte ranges of the intra-word parts of `word`: runs delimited by
/// punctuation, lower-to-upper case transitions (including acronym
/// boundaries like `HTTPServer`), and letter/digit transitions.
fn split_parts(word: &str) -> Vec<(usize, usize)> {
    let chars: Vec<(usize, char)> = word.char_indices().collect();
    let byte_range = |a: usize, b: usize| {
        let from = chars[a].0;
        let (last_i, last_c) = chars[b - 1];
        (from, last_i + last_c.len_utf8())
    };

    let mut parts = Vec::new();
    let mut start: Option<usize> = None;

    for j in 0..chars.len() {
        let class = classify(chars[j].1);
        if class == CharClass::Other {
            if let Some(s) = start.take() {
                parts.push(byte_range(s, j));
            }
            continue;
        }
        let Some(s) = start else {
            start = Some(j);
            continue;
        };
        let prev = classify(chars[j - 1].1);
        let boundary = match (prev, class) {
            (CharClass::Lower, CharClass::Upper) => Some(j),
            // Acronym run followed by a word: HTTPServer -> HTTP | Server
            (CharClass::Upper, CharClass::Lower)
                if j >= 2 && classify(chars[j - 2].1) == CharClass::Upper && j - 1 > s =>
            {
                Some(j - 1)
            },
            (CharClass::Digit, CharClass::Lower | CharClass::Upper)
            | (CharClass::Lower | CharClass::Upper, CharClass::Digit) => Some(j),
            _ => None,
        };
        if let Some(b) = boundary {
            parts.push(byte_range(s, b));
            start = Some(b);
        }
    }
    if let Some(s) = start {
        parts.push(byte_range(s, chars.len()));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(text: &str) -> Vec<(String, usize, usize, usize)> {
        let mut analyzer = analyzer();
        analyzed_tokens(&mut analyzer, text)
            .into_iter()
            .map(|t| (t.text, t.position, t.offset_from, t.offset_to))
            .collect()
    }

    fn texts(text: &str) -> Vec<String> {
        analyze(text).into_iter().map(|(t, _, _, _)| t).collect()
    }

    #[test]
    fn plain_words_emit_once() {
        let tokens = analyze("hello world");
        assert_eq!(
            tokens,
            vec![
                ("hello".to_string(), 0, 0, 5),
                ("world".to_string(), 1, 6, 11),
            ]
        );
    }

    #[test]
    fn surrounding_punctuation_is_stripped() {
        let tokens = analyze("..hello!! (world)");
        assert_eq!(tokens[0], ("hello".to_string(), 0, 2, 7));
        assert_eq!(tokens[1], ("world".to_string(), 1, 11, 16));
    }

    #[test]
    fn pure_punctuation_words_vanish() {
        assert!(texts("-- ... !!").is_empty());
        // and they do not consume positions
        let tokens = analyze("foo -- bar");
        assert_eq!(tokens[0].1, 0);
        assert_eq!(tokens[1].1, 1);
    }

    #[test]
    fn compound_words_expand() {
        let got = texts("foo-bar");
        assert!(got.contains(&"foo-bar".to_string()));
        assert!(got.contains(&"foobar".to_string()));
        assert!(got.contains(&"foo".to_string()));
        assert!(got.contains(&"bar".to_string()));
    }

    #[test]
    fn sub_tokens_take_consecutive_positions() {
        let tokens = analyze("foo-bar baz");
        let foo = tokens.iter().find(|(t, _, _, _)| t == "foo").expect("foo");
        let bar = tokens.iter().find(|(t, _, _, _)| t == "bar").expect("bar");
        let baz = tokens.iter().find(|(t, _, _, _)| t == "baz").expect("baz");
        assert_eq!(foo.1, 0);
        assert_eq!(bar.1, 1);
        assert_eq!(baz.1, 2);
        // sub-token offsets point into the source text
        assert_eq!((bar.2, bar.3), (4, 7));
    }

    #[test]
    fn camel_case_splits() {
        let got = texts("PowerShot");
        assert!(got.contains(&"powershot".to_string()));
        assert!(got.contains(&"power".to_string()));
        assert!(got.contains(&"shot".to_string()));
    }

    #[test]
    fn acronym_boundary_splits() {
        let got = texts("HTTPServer");
        assert!(got.contains(&"http".to_string()));
        assert!(got.contains(&"server".to_string()));
    }

    #[test]
    fn alphanumeric_transitions_split() {
        let got = texts("sd500");
        assert!(got.contains(&"sd500".to_string()));
        assert!(got.contains(&"sd".to_string()));
        assert!(got.contains(&"500".to_string()));
    }

    #[test]
    fn accents_fold_and_lowercase() {
        assert_eq!(texts("Café"), vec!["cafe".to_string()]);
    }

    #[test]
    fn duplicates_are_dropped() {
        // original, merged and single-part variants of a plain word collapse
        assert_eq!(texts("plain").len(), 1);
    }

    #[test]
    fn stream_is_restartable() {
        let mut analyzer = analyzer();
        let first = analyzed_tokens(&mut analyzer, "hello world");
        let second = analyzed_tokens(&mut analyzer, "hello world");
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].text, second[0].text);
    }
}
