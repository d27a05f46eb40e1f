// src/core/charset.rs

//! Character classification used by the escaper.

use lazy_static::lazy_static;

/// Punctuation that a POSIX shell never treats specially inside a word.
const SAFE_PUNCTUATION: &str = "#%+-.~/:=";

lazy_static! {
    // One flag per ASCII code point. Computed once, never mutated afterwards.
    static ref BARE_SAFE: [bool; 128] = {
        let mut table = [false; 128];
        for (code, slot) in table.iter_mut().enumerate() {
            let ch = char::from(u8::try_from(code).unwrap_or(0));
            *slot = is_identifier(ch) || SAFE_PUNCTUATION.contains(ch);
        }
        table
    };
}

/// Returns `true` when `ch` can appear unescaped in a shell word.
///
/// That is ASCII letters, digits, `_` and `# % + - . ~ / : =`. Whitespace, quotes,
/// `$`, parentheses, semicolons and every non-ASCII character need escaping.
pub fn is_bare_safe(ch: char) -> bool {
    usize::try_from(u32::from(ch))
        .ok()
        .and_then(|code| BARE_SAFE.get(code))
        .copied()
        .unwrap_or(false)
}

/// Returns `true` for the characters a shell variable name is made of.
pub fn is_identifier(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
