// src/core/template.rs

//! Placeholder expansion.
//!
//! Every `%s` in a template consumes the next argument, left to right across all the
//! elements of an argument vector. The argument is escaped according to the quoting mode
//! of the token it sits in, so it always reaches the program as literal data.

use crate::{
    constants::PLACEHOLDER,
    core::{escaper::escape, tokenizer::tokenize},
    models::{QuoteMode, Token},
};
use thiserror::Error;

/// Errors raised while expanding a template. They are caller bugs, not runtime conditions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// More placeholders than arguments.
    #[error("Placeholder #{index} has no argument: only {supplied} argument(s) were supplied.")]
    MissingArgument { index: usize, supplied: usize },
    /// More arguments than placeholders.
    #[error("{supplied} argument(s) were supplied but the template only has {used} placeholder(s).")]
    UnusedArguments { used: usize, supplied: usize },
    /// A quote is opened and never closed.
    #[error("Unterminated {mode}-quoted string starting at byte {position}.")]
    UnterminatedQuote { mode: QuoteMode, position: usize },
}

/// Expands placeholders with a cursor shared across several template elements.
#[derive(Debug)]
pub struct Expander<'a, S> {
    args: &'a [S],
    next: usize,
}

impl<'a, S: AsRef<str>> Expander<'a, S> {
    /// Starts before the first element of `args`.
    pub fn new(args: &'a [S]) -> Self {
        Self { args, next: 0 }
    }

    /// Number of arguments consumed so far.
    pub fn consumed(&self) -> usize {
        self.next
    }

    /// Rewrites one template element.
    ///
    /// Elements that contain no placeholder are returned untouched, without tokenizing.
    pub fn expand(&mut self, template: &str) -> Result<String, TemplateError> {
        if !template.contains(PLACEHOLDER) {
            return Ok(template.to_owned());
        }
        let mut expanded = String::with_capacity(template.len() * 2);
        for token in tokenize(template) {
            self.render(token?, &mut expanded)?;
        }
        Ok(expanded)
    }

    /// Checks that every supplied argument was used.
    pub fn finish(self) -> Result<(), TemplateError> {
        if self.next < self.args.len() {
            return Err(TemplateError::UnusedArguments {
                used: self.next,
                supplied: self.args.len(),
            });
        }
        Ok(())
    }

    fn next_argument(&mut self) -> Result<&'a str, TemplateError> {
        let index = self.next;
        let arg = self
            .args
            .get(index)
            .ok_or(TemplateError::MissingArgument {
                index,
                supplied: self.args.len(),
            })?;
        self.next += 1;
        Ok(arg.as_ref())
    }

    /// Writes one token back, with its delimiters, substituting its placeholders.
    ///
    /// Inside quotes the escaped argument is spliced between a closing and a reopening
    /// delimiter, so backslash escapes keep their meaning: `"a %s"` becomes `"a "x\ y""`.
    fn render(&mut self, token: Token<'_>, out: &mut String) -> Result<(), TemplateError> {
        let delimiter = token.mode.delimiter();
        let preserve_variables = token.mode.preserves_variables();

        if let Some(q) = delimiter {
            out.push(q);
        }
        for (i, segment) in split_placeholders(token).into_iter().enumerate() {
            if i > 0 {
                let value = substitute(self.next_argument()?, preserve_variables);
                match delimiter {
                    Some(q) => {
                        out.push(q);
                        out.push_str(&value);
                        out.push(q);
                    }
                    None => out.push_str(&value),
                }
            }
            out.push_str(segment);
        }
        if let Some(q) = delimiter {
            out.push(q);
        }
        Ok(())
    }
}

/// Escapes one argument for splicing into unquoted shell text.
fn substitute(arg: &str, preserve_variables: bool) -> String {
    let escaped = escape(arg, preserve_variables);
    if escaped.is_empty() {
        // An empty word would vanish; keep it as an explicit empty argument.
        return "''".to_owned();
    }
    if escaped.starts_with(['#', '~']) {
        // Bare-safe, but would start a comment or a tilde expansion at a word start.
        return format!("\\{escaped}");
    }
    escaped
}

/// Splits token text around its placeholders.
///
/// `n` placeholders produce `n + 1` literal segments. Outside single quotes a backslash
/// escapes the next character, so `\%s` is literal text.
fn split_placeholders(token: Token<'_>) -> Vec<&str> {
    let text = token.text;
    let honours_backslash = token.mode != QuoteMode::SingleQuoted;
    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut chars = text.char_indices();

    while let Some((i, ch)) = chars.next() {
        if ch == '\\' && honours_backslash {
            chars.next();
            continue;
        }
        if ch == '%' && text.get(i..).is_some_and(|rest| rest.starts_with(PLACEHOLDER)) {
            segments.push(text.get(segment_start..i).unwrap_or(""));
            // Skip the `s` of the marker.
            chars.next();
            segment_start = i + PLACEHOLDER.len();
        }
    }
    segments.push(text.get(segment_start..).unwrap_or(""));
    segments
}

/// Expands a single template with exactly `args.len()` placeholders.
pub fn expand<S: AsRef<str>>(template: &str, args: &[S]) -> Result<String, TemplateError> {
    let mut expander = Expander::new(args);
    let expanded = expander.expand(template)?;
    expander.finish()?;
    Ok(expanded)
}

/// Expands every element of an argument-vector template.
///
/// Arguments are consumed in scan order across all elements; the total number of
/// placeholders must equal `args.len()`.
pub fn expand_argv<T, S>(argv: &[T], args: &[S]) -> Result<Vec<String>, TemplateError>
where
    T: AsRef<str>,
    S: AsRef<str>,
{
    let mut expander = Expander::new(args);
    let expanded = argv
        .iter()
        .map(|element| expander.expand(element.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    expander.finish()?;
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_mixed_quoting() {
        let expanded = expand(
            r#"echo --%s-- "--%s--" '--%s--' %s"#,
            &["$HOME/$abc--", "${HOME}/$abc--", "${HOME}/$abc--", "abc;rm -rf /"],
        )
        .unwrap();
        assert_eq!(
            expanded,
            r#"echo --$HOME/$abc---- "--"${HOME}/$abc--"--" '--'\$\{HOME\}/\$abc--'--' abc\;rm\ -rf\ /"#
        );
    }

    #[test]
    fn test_injection_attempt_is_neutralised() {
        let expanded = expand("echo %s", &[";rm -rf /"]).unwrap();
        assert_eq!(expanded, r"echo \;rm\ -rf\ /");
    }

    #[test]
    fn test_single_quoted_placeholder_escapes_variables() {
        let expanded = expand("printf '%s'", &["$(dangerous command) and $PASSWORD"]).unwrap();
        assert_eq!(
            expanded,
            r"printf ''\$\(dangerous\ command\)\ and\ \$PASSWORD''"
        );
    }

    #[test]
    fn test_double_quoted_placeholder_keeps_variables() {
        let expanded = expand(r#"echo "%s""#, &["normal $Var"]).unwrap();
        assert_eq!(expanded, r#"echo ""normal\ $Var"""#);
    }

    #[test]
    fn test_template_without_placeholders_is_untouched() {
        let mut expander = Expander::new(&[] as &[&str]);
        assert_eq!(expander.expand("it's fine").unwrap(), "it's fine");
        assert!(expander.finish().is_ok());
    }

    #[test]
    fn test_escaped_placeholder_is_literal() {
        let expanded = expand(r"printf \%s %s", &["x"]).unwrap();
        assert_eq!(expanded, r"printf \%s x");
    }

    #[test]
    fn test_multiple_placeholders_in_one_token() {
        let expanded = expand("cp %s %s", &["a b", "c"]).unwrap();
        assert_eq!(expanded, r"cp a\ b c");
    }

    #[test]
    fn test_argument_is_not_rescanned_for_placeholders() {
        let expanded = expand("echo %s", &["%s"]).unwrap();
        assert_eq!(expanded, "echo %s");
    }

    #[test]
    fn test_empty_argument_stays_a_word() {
        assert_eq!(expand("touch %s", &[""]).unwrap(), "touch ''");
    }

    #[test]
    fn test_comment_and_tilde_prefixes_are_escaped() {
        assert_eq!(expand("echo %s", &["#x"]).unwrap(), r"echo \#x");
        assert_eq!(expand("ls %s", &["~root"]).unwrap(), r"ls \~root");
        assert_eq!(expand("ls a%s", &["b~"]).unwrap(), "ls ab~");
    }

    #[test]
    fn test_too_few_arguments_fail() {
        let err = expand("%s and %s", &["one"]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingArgument {
                index: 1,
                supplied: 1
            }
        );
    }

    #[test]
    fn test_too_many_arguments_fail() {
        let err = expand("only %s", &["one", "two"]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UnusedArguments {
                used: 1,
                supplied: 2
            }
        );
    }

    #[test]
    fn test_unterminated_quote_fails() {
        let err = expand("echo '%s", &["x"]).unwrap_err();
        assert!(matches!(err, TemplateError::UnterminatedQuote { .. }));
    }

    #[test]
    fn test_expand_argv_consumes_left_to_right() {
        let argv = expand_argv(&["%s", "-c", "echo %s %s"], &["sh", "a", "b c"]).unwrap();
        assert_eq!(argv, vec!["sh", "-c", r"echo a b\ c"]);
    }

    #[test]
    fn test_expand_argv_only_rewrites_elements_with_placeholders() {
        let argv = expand_argv(&["awk", "{print $0}", "%s"], &["file name"]).unwrap();
        assert_eq!(argv, vec!["awk", "{print $0}", r"file\ name"]);
    }

    #[test]
    fn test_expand_argv_counts_across_elements() {
        let err = expand_argv(&["echo %s", "%s"], &["a"]).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingArgument {
                index: 1,
                supplied: 1
            }
        );
    }
}
