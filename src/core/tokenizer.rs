// src/core/tokenizer.rs

//! Splits a template into quoting-mode tokens.
//!
//! This is not a shell parser. It only tracks where single- and double-quoted runs begin
//! and end so the expander knows which escaping policy applies to each placeholder.

use crate::core::template::TemplateError;
use crate::models::{QuoteMode, Token};

/// Lazy, single-pass tokenizer over a template string.
///
/// Yields `Bare`, `DoubleQuoted` and `SingleQuoted` tokens in source order. Concatenating
/// the tokens (with their delimiters put back) reproduces the template. After the first
/// error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    source: &'a str,
    position: usize,
    failed: bool,
}

/// Starts tokenizing `template`.
pub fn tokenize(template: &str) -> Tokenizer<'_> {
    Tokenizer {
        source: template,
        position: 0,
        failed: false,
    }
}

impl<'a> Tokenizer<'a> {
    fn rest(&self) -> &'a str {
        self.source.get(self.position..).unwrap_or("")
    }

    /// Unquoted run: stops before the next quote that is not backslash-escaped.
    fn bare(&mut self) -> Token<'a> {
        let rest = self.rest();
        let mut end = rest.len();
        let mut chars = rest.char_indices();
        while let Some((i, ch)) = chars.next() {
            match ch {
                // `\'` and `\"` are literal characters, not delimiters.
                '\\' => {
                    chars.next();
                }
                '\'' | '"' => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }
        self.position += end;
        Token::new(QuoteMode::Bare, rest.get(..end).unwrap_or(""))
    }

    /// Quoted run starting at the opening delimiter under the cursor.
    fn quoted(&mut self, mode: QuoteMode, delimiter: char) -> Result<Token<'a>, TemplateError> {
        let open = self.position;
        let body = self.rest().get(delimiter.len_utf8()..).unwrap_or("");
        let mut chars = body.char_indices();
        while let Some((i, ch)) = chars.next() {
            if ch == '\\' && mode == QuoteMode::DoubleQuoted {
                chars.next();
                continue;
            }
            if ch == delimiter {
                self.position = open + delimiter.len_utf8() + i + delimiter.len_utf8();
                return Ok(Token::new(mode, body.get(..i).unwrap_or("")));
            }
        }
        Err(TemplateError::UnterminatedQuote {
            mode,
            position: open,
        })
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, TemplateError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let first = self.rest().chars().next()?;
        let item = match first {
            '\'' => self.quoted(QuoteMode::SingleQuoted, '\''),
            '"' => self.quoted(QuoteMode::DoubleQuoted, '"'),
            _ => Ok(self.bare()),
        };
        if item.is_err() {
            self.failed = true;
        }
        Some(item)
    }
}

impl std::iter::FusedIterator for Tokenizer<'_> {}
