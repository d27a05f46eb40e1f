// src/core/escaper.rs

//! Context-sensitive escaping of a single argument.
//!
//! Unsafe characters get a backslash in front of them so that a POSIX shell reads the
//! argument back as one literal word. When the caller asks for variable preservation,
//! `$NAME` and `${NAME}` references are detected by a small automaton and emitted as is,
//! so the shell still expands them.

use crate::core::charset::{is_bare_safe, is_identifier};

/// State of the variable-reference scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Not inside a reference. Characters follow the classifier.
    None,
    /// Inside `$NAME`.
    InSimpleVar,
    /// Inside `${NAME...}`, waiting for the closing brace.
    InBracedVar,
}

impl ScanState {
    /// Feeds one character into the automaton.
    ///
    /// Returns the next state and whether `ch` belongs to a variable reference
    /// (and must therefore be emitted verbatim).
    fn step(self, ch: char, next: Option<char>, after_next: Option<char>) -> (Self, bool) {
        match self {
            Self::InSimpleVar if is_identifier(ch) => (Self::InSimpleVar, true),
            Self::InBracedVar if ch == '}' => (Self::None, true),
            Self::InBracedVar if ch == '{' || is_identifier(ch) => (Self::InBracedVar, true),
            // Any other character ends the reference and is evaluated from scratch,
            // which may open a new one right away (`$A$B`).
            _ => Self::enter(ch, next, after_next),
        }
    }

    fn enter(ch: char, next: Option<char>, after_next: Option<char>) -> (Self, bool) {
        if ch != '$' {
            return (Self::None, false);
        }
        match (next, after_next) {
            (Some(n), _) if is_identifier(n) => (Self::InSimpleVar, true),
            (Some('{'), Some(n)) if is_identifier(n) => (Self::InBracedVar, true),
            _ => (Self::None, false),
        }
    }
}

/// Escapes `raw` so a POSIX shell reads it back as a single literal word.
///
/// With `preserve_variables` set, characters that are part of a `$NAME` or `${NAME}`
/// reference are left alone. Otherwise every character outside the bare-safe set is
/// escaped, `$` included.
///
/// The braced form is not a full brace matcher: `${NAME` followed by anything other
/// than an identifier character, `{` or `}` ends the reference early and the rest of
/// the text is escaped normally. The character that ends it is escaped too rather than
/// passed through, so `${a;reboot}` becomes `${a\;reboot\}` and stays one word.
pub fn escape(raw: &str, preserve_variables: bool) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut escaped = String::with_capacity(raw.len() * 2);
    let mut state = ScanState::None;

    for (i, &ch) in chars.iter().enumerate() {
        if preserve_variables {
            let (next_state, verbatim) =
                state.step(ch, chars.get(i + 1).copied(), chars.get(i + 2).copied());
            state = next_state;
            if verbatim {
                escaped.push(ch);
                continue;
            }
        }
        push_escaped(&mut escaped, ch);
    }

    escaped
}

fn push_escaped(out: &mut String, ch: char) {
    if is_bare_safe(ch) {
        out.push(ch);
    } else if ch == '\n' {
        // A backslash-newline is a line continuation, so the newline has to be quoted.
        out.push_str("'\n'");
    } else {
        out.push('\\');
        out.push(ch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_variable_preserved() {
        assert_eq!(escape("abc$HOME--", true), "abc$HOME--");
        assert_eq!(escape("$HOME/bin", true), "$HOME/bin");
    }

    #[test]
    fn test_simple_variable_escaped_without_preservation() {
        assert_eq!(escape("abc$HOME--", false), r"abc\$HOME--");
        assert_eq!(escape("${HOME}", false), r"\$\{HOME\}");
    }

    #[test]
    fn test_braced_variable_preserved() {
        assert_eq!(escape("abc${HOME}bb", true), "abc${HOME}bb");
        assert_eq!(escape("${A}${B_2}", true), "${A}${B_2}");
    }

    #[test]
    fn test_adjacent_simple_variables() {
        assert_eq!(escape("$A$B", true), "$A$B");
        assert_eq!(escape("$A;$B", true), r"$A\;$B");
    }

    #[test]
    fn test_braced_reference_ends_early_on_operator() {
        // Only `${HOME` survives; the default-value operator and the
        // command substitution inside it are escaped.
        assert_eq!(
            escape("abc${HOME:-$(ls)}bb", true),
            r"abc${HOME:-\$\(ls\)\}bb"
        );
    }

    #[test]
    fn test_braced_reference_does_not_leak_terminator() {
        assert_eq!(escape("${a;reboot}", true), r"${a\;reboot\}");
        assert_eq!(escape("${a`id`}", true), r"${a\`id\`\}");
    }

    #[test]
    fn test_dollar_without_name_is_escaped() {
        assert_eq!(escape("$", true), r"\$");
        assert_eq!(escape("a$", true), r"a\$");
        assert_eq!(escape("$(id)", true), r"\$\(id\)");
        assert_eq!(escape("${}", true), r"\$\{\}");
        assert_eq!(escape("$$", true), r"\$\$");
    }

    #[test]
    fn test_shell_metacharacters() {
        assert_eq!(escape("abc;rm -rf /", true), r"abc\;rm\ -rf\ /");
        assert_eq!(escape("a'b\"c", false), r#"a\'b\"c"#);
        assert_eq!(escape("x|y&z", false), r"x\|y\&z");
    }

    #[test]
    fn test_newline_is_quoted() {
        assert_eq!(escape("a\nb", false), "a'\n'b");
    }

    #[test]
    fn test_non_ascii_is_escaped() {
        assert_eq!(escape("é", true), "\\é");
    }

    #[test]
    fn test_modes_agree_without_variable_references() {
        for raw in ["plain", "with space", "semi;colon", "q'uote", "$", "${}", "a$(b)"] {
            assert_eq!(escape(raw, true), escape(raw, false), "input: {raw:?}");
        }
    }

    #[test]
    fn test_modes_differ_only_with_unsafe_characters() {
        let safe = "abc-1.2_x/y:z=w%~#+";
        assert_eq!(escape(safe, false), safe);
        assert_ne!(escape("a b", false), "a b");
    }

    #[test]
    fn test_bare_safe_input_is_a_fixed_point() {
        let safe = "release-1.2.3/build_x86:arm=on";
        let once = escape(safe, true);
        assert_eq!(once, safe);
        assert_eq!(escape(&once, true), once);
        assert_eq!(escape(&once, false), once);
    }
}
