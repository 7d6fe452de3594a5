//! Tokenizer for command argument strings.
//!
//! Splits an argument string into whitespace-separated tokens with support for:
//! - Quoted strings (single and double quotes) spanning several words
//! - Escaped quote characters and backslashes inside quotes
//!
//! Every token remembers the byte span it was read from, so the original text
//! from any token onwards can be recovered for remainder parameters.

use std::ops::Range;

/// Characters that open and close a quoted token.
pub const QUOTE_CHARS: [char; 2] = ['"', '\''];

/// A token parsed from command input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token text with quotes stripped and escapes resolved.
    pub value: String,
    /// Byte range of the token in the raw input, quotes included.
    pub span: Range<usize>,
    /// Whether the token was quoted.
    pub quoted: bool,
}

/// The tokenized form of an argument string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    raw: String,
    tokens: Vec<Token>,
}

impl Tokens {
    /// The original, unsplit argument string.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// Token values in order.
    pub fn values(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.value.clone()).collect()
    }

    /// Original text from token `index` to the end of input, with original
    /// spacing and quotes preserved. Empty when `index` is past the last token.
    pub fn remainder_from(&self, index: usize) -> &str {
        match self.tokens.get(index) {
            Some(token) => self.raw[token.span.start..].trim_end(),
            None => "",
        }
    }
}

/// Tokenizes a command argument string.
///
/// Handles:
/// - Whitespace-separated tokens: `a b` → `a`, `b`
/// - Double-quoted strings: `"hello world"` → `hello world`
/// - Single-quoted strings: `'hello world'` → `hello world`
/// - Escapes in quotes: `"say \"hi\""` → `say "hi"`
/// - Quotes only open at the start of a token, so `don't` stays one word
/// - An unterminated quote runs to the end of input
pub fn tokenize(input: &str) -> Tokens {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        // Skip whitespace
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if QUOTE_CHARS.contains(&c) {
            chars.next();
            let (value, end) = collect_quoted(&mut chars, c, input.len());
            tokens.push(Token {
                value,
                span: start..end,
                quoted: true,
            });
            continue;
        }

        let (value, end) = collect_word(&mut chars, input.len());
        tokens.push(Token {
            value,
            span: start..end,
            quoted: false,
        });
    }

    Tokens {
        raw: input.to_string(),
        tokens,
    }
}

type CharIndices<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

/// Collects characters until whitespace or end of input.
fn collect_word(chars: &mut CharIndices<'_>, input_len: usize) -> (String, usize) {
    let mut word = String::new();
    while let Some(&(idx, c)) = chars.peek() {
        if c.is_whitespace() {
            return (word, idx);
        }
        chars.next();
        word.push(c);
    }
    (word, input_len)
}

/// Collects characters inside quotes, handling escape sequences.
///
/// Returns the unquoted text and the byte offset just past the closing quote.
fn collect_quoted(chars: &mut CharIndices<'_>, quote: char, input_len: usize) -> (String, usize) {
    let mut result = String::new();
    let mut escaped = false;

    for (idx, c) in chars.by_ref() {
        if escaped {
            if c != quote && c != '\\' {
                // Unknown escape, keep as-is
                result.push('\\');
            }
            result.push(c);
            escaped = false;
            continue;
        }

        if c == '\\' {
            escaped = true;
            continue;
        }

        if c == quote {
            return (result, idx + c.len_utf8());
        }

        result.push(c);
    }

    if escaped {
        result.push('\\');
    }
    (result, input_len)
}

/// Splits the command name off the text following a prefix.
///
/// Returns the name and the untouched argument string after it (leading
/// whitespace removed). `None` when the text is empty.
pub fn split_command_name(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(idx) => Some((&text[..idx], text[idx..].trim_start())),
        None => Some((text, "")),
    }
}
