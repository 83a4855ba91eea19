//! HTML pretty-printing and minification.
//!
//! HTML is rarely well-formed XML, so this runs the markup tokenizer in its
//! lenient dialect: void elements need no end tag, unclosed elements are closed
//! by the nearest matching ancestor end tag, and stray end tags are kept as-is.

use crate::formatter::xml::{indent, tokenize, Markup, Token};
use crate::formatter::FormatError;

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text keeps its whitespace when minified.
const PRESERVE_WHITESPACE: &[&str] = &["pre", "textarea", "script", "style"];

fn is_one_of(name: &str, set: &[&str]) -> bool {
    set.iter().any(|candidate| candidate.eq_ignore_ascii_case(name))
}

fn tokens(html: &str) -> Result<Vec<Token<'_>>, FormatError> {
    tokenize(html, Markup::Html).map_err(|err| match err {
        FormatError::Xml(message) => FormatError::Html(message),
        other => other,
    })
}

/// Formats HTML with 2-space indentation.
///
/// # Arguments
/// * `html` - Markup to format
///
/// # Returns
/// The re-indented markup, or an error if a tag, comment or declaration is
/// left unterminated.
///
/// # Examples
///
/// ```
/// use rappit_core::formatter::html::format_html_pretty;
///
/// let formatted = format_html_pretty("<ul><li>one</li><li>two<br>three</li></ul>").unwrap();
/// assert_eq!(
///     formatted,
///     "<ul>\n  <li>one</li>\n  <li>\n    two\n    <br>\n    three\n  </li>\n</ul>"
/// );
/// ```
pub fn format_html_pretty(html: &str) -> Result<String, FormatError> {
    let tokens = tokens(html)?;
    let mut lines = Vec::new();
    let mut open: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            Token::Start { name, raw } if is_one_of(name, VOID_ELEMENTS) => {
                lines.push(format!("{}{}", indent(open.len()), raw));
            }
            Token::Start { name, raw } => match (tokens.get(i + 1), tokens.get(i + 2)) {
                (Some(Token::End { name: end_name, raw: end }), _)
                    if end_name.eq_ignore_ascii_case(name) =>
                {
                    lines.push(format!("{}{}{}", indent(open.len()), raw, end));
                    i += 2;
                    continue;
                }
                (Some(Token::Text(text)), Some(Token::End { name: end_name, raw: end }))
                    if end_name.eq_ignore_ascii_case(name) && !text.trim().contains('\n') =>
                {
                    lines.push(format!("{}{}{}{}", indent(open.len()), raw, text.trim(), end));
                    i += 3;
                    continue;
                }
                _ => {
                    lines.push(format!("{}{}", indent(open.len()), raw));
                    open.push(name);
                }
            },
            Token::End { name, raw } => {
                if let Some(at) = open.iter().rposition(|o| o.eq_ignore_ascii_case(name)) {
                    open.truncate(at);
                }
                lines.push(format!("{}{}", indent(open.len()), raw));
            }
            Token::Text(text) => {
                let raw_content = open
                    .last()
                    .map_or(false, |parent| is_one_of(parent, &["script", "style"]));
                if raw_content {
                    let text = text.trim_matches(|c: char| c == '\n' || c == '\r');
                    if !text.trim().is_empty() {
                        lines.push(text.to_string());
                    }
                } else {
                    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                        lines.push(format!("{}{}", indent(open.len()), line));
                    }
                }
            }
            Token::Empty { raw }
            | Token::Prolog(raw)
            | Token::Comment(raw)
            | Token::CData(raw) => lines.push(format!("{}{}", indent(open.len()), raw)),
        }
        i += 1;
    }

    Ok(lines.join("\n"))
}

/// Removes comments, drops whitespace between tags and collapses whitespace
/// runs in text. Text inside `pre`, `textarea`, `script` and `style` is kept
/// verbatim.
pub fn minify_html(html: &str) -> Result<String, FormatError> {
    let tokens = tokens(html)?;
    let mut out = String::with_capacity(html.len());
    let mut preserved = 0usize;

    for token in tokens {
        match token {
            Token::Comment(_) => {}
            Token::Text(text) if preserved > 0 => out.push_str(text),
            Token::Text(text) if text.trim().is_empty() => {}
            Token::Text(text) => collapse_whitespace(text, &mut out),
            Token::Start { name, raw } => {
                if is_one_of(name, PRESERVE_WHITESPACE) {
                    preserved += 1;
                }
                out.push_str(raw);
            }
            Token::End { name, raw } => {
                if is_one_of(name, PRESERVE_WHITESPACE) {
                    preserved = preserved.saturating_sub(1);
                }
                out.push_str(raw);
            }
            Token::Prolog(raw) | Token::CData(raw) | Token::Empty { raw } => out.push_str(raw),
        }
    }

    Ok(out)
}

fn collapse_whitespace(text: &str, out: &mut String) {
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
}
