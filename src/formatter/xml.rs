//! XML well-formedness checking, pretty-printing and minification.
//!
//! This is a small tokenizer rather than a full XML parser: it checks that tags
//! are terminated, matched and properly nested, that there is exactly one root
//! element, and that no text appears outside it. Entities and namespaces are
//! passed through untouched.
//!
//! The tokenizer also has a lenient HTML dialect, used by the HTML formatter.

use crate::formatter::FormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Token<'a> {
    /// `<?...?>` or `<!DOCTYPE ...>`
    Prolog(&'a str),
    Comment(&'a str),
    CData(&'a str),
    Start { name: &'a str, raw: &'a str },
    End { name: &'a str, raw: &'a str },
    Empty { raw: &'a str },
    Text(&'a str),
}

/// Tokenizer dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Markup {
    Xml,
    /// A `<` that cannot open a tag is text, and `script`/`style` content is raw.
    Html,
}

/// HTML elements whose content is never parsed as markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Formats XML with 2-space indentation.
///
/// Elements holding only text are kept on one line. Whitespace-only text
/// between tags is dropped and other text is trimmed.
///
/// # Examples
///
/// ```
/// use rappit_core::formatter::xml::format_xml_pretty;
///
/// let formatted = format_xml_pretty("<root><item id=\"1\">one</item></root>").unwrap();
/// assert_eq!(formatted, "<root>\n  <item id=\"1\">one</item>\n</root>");
/// ```
pub fn format_xml_pretty(xml: &str) -> Result<String, FormatError> {
    let tokens = parse(xml)?;
    let mut lines = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            Token::Start { raw, .. } => match (tokens.get(i + 1), tokens.get(i + 2)) {
                (Some(Token::End { raw: end, .. }), _) => {
                    lines.push(format!("{}{}{}", indent(depth), raw, end));
                    i += 2;
                    continue;
                }
                (Some(Token::Text(text)), Some(Token::End { raw: end, .. })) => {
                    lines.push(format!("{}{}{}{}", indent(depth), raw, text.trim(), end));
                    i += 3;
                    continue;
                }
                _ => {
                    lines.push(format!("{}{}", indent(depth), raw));
                    depth += 1;
                }
            },
            Token::End { raw, .. } => {
                depth = depth.saturating_sub(1);
                lines.push(format!("{}{}", indent(depth), raw));
            }
            Token::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(format!("{}{}", indent(depth), text));
                }
            }
            Token::Empty { raw }
            | Token::Prolog(raw)
            | Token::Comment(raw)
            | Token::CData(raw) => lines.push(format!("{}{}", indent(depth), raw)),
        }
        i += 1;
    }

    Ok(lines.join("\n"))
}

/// Removes comments and whitespace-only text between tags.
pub fn minify_xml(xml: &str) -> Result<String, FormatError> {
    let tokens = parse(xml)?;
    let mut out = String::with_capacity(xml.len());

    for token in tokens {
        match token {
            Token::Comment(_) => {}
            Token::Text(text) if text.trim().is_empty() => {}
            Token::Text(raw)
            | Token::Prolog(raw)
            | Token::CData(raw)
            | Token::Start { raw, .. }
            | Token::End { raw, .. }
            | Token::Empty { raw } => out.push_str(raw),
        }
    }

    Ok(out)
}

/// Checks whether `xml` is well-formed.
pub fn validate_xml(xml: &str) -> bool {
    parse(xml).is_ok()
}

fn parse(xml: &str) -> Result<Vec<Token<'_>>, FormatError> {
    let tokens = tokenize(xml, Markup::Xml)?;
    check_structure(&tokens)?;
    Ok(tokens)
}

pub(super) fn tokenize(xml: &str, markup: Markup) -> Result<Vec<Token<'_>>, FormatError> {
    let mut tokens = Vec::new();
    let mut text_start: Option<usize> = None;
    let mut pos = 0;

    while pos < xml.len() {
        let rest = &xml[pos..];

        let is_text = !rest.starts_with('<') || (markup == Markup::Html && !opens_markup(rest));
        if is_text {
            let skip = usize::from(rest.starts_with('<'));
            let len = rest[skip..].find('<').map_or(rest.len(), |i| skip + i);
            text_start.get_or_insert(pos);
            pos += len;
            continue;
        }

        if let Some(start) = text_start.take() {
            tokens.push(Token::Text(&xml[start..pos]));
        }

        let (token, len) = if rest.starts_with("<?") {
            let len = span_until(rest, 2, "?>", "processing instruction")?;
            (Token::Prolog(&rest[..len]), len)
        } else if rest.starts_with("<!--") {
            let len = span_until(rest, 4, "-->", "comment")?;
            (Token::Comment(&rest[..len]), len)
        } else if rest.starts_with("<![CDATA[") {
            let len = span_until(rest, 9, "]]>", "CDATA section")?;
            (Token::CData(&rest[..len]), len)
        } else if rest.starts_with("<!") {
            let len = doctype_len(rest)?;
            (Token::Prolog(&rest[..len]), len)
        } else {
            let len = tag_len(rest)?;
            (tag(&rest[..len])?, len)
        };

        tokens.push(token);
        pos += len;

        if let (Markup::Html, Token::Start { name, .. }) = (markup, token) {
            if RAW_TEXT_ELEMENTS.iter().any(|raw| raw.eq_ignore_ascii_case(name)) {
                let close = format!("</{}", name.to_ascii_lowercase());
                let len = xml[pos..]
                    .to_ascii_lowercase()
                    .find(&close)
                    .unwrap_or(xml.len() - pos);
                if len > 0 {
                    tokens.push(Token::Text(&xml[pos..pos + len]));
                }
                pos += len;
            }
        }
    }

    if let Some(start) = text_start {
        tokens.push(Token::Text(&xml[start..]));
    }

    Ok(tokens)
}

/// Whether an HTML `<` starts a tag, comment or declaration.
fn opens_markup(rest: &str) -> bool {
    matches!(rest.as_bytes().get(1), Some(b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

/// Length of `rest` up to and including the first `terminator` after `skip`.
fn span_until(rest: &str, skip: usize, terminator: &str, what: &str) -> Result<usize, FormatError> {
    rest[skip..]
        .find(terminator)
        .map(|i| skip + i + terminator.len())
        .ok_or_else(|| FormatError::Xml(format!("unterminated {}", what)))
}

/// `<!DOCTYPE ...>`, which may contain a bracketed internal subset.
fn doctype_len(rest: &str) -> Result<usize, FormatError> {
    let mut depth = 0usize;
    for (i, b) in rest.bytes().enumerate().skip(2) {
        match b {
            b'[' => depth += 1,
            b']' => depth = depth.saturating_sub(1),
            b'>' if depth == 0 => return Ok(i + 1),
            _ => {}
        }
    }
    Err(FormatError::Xml("unterminated declaration".to_string()))
}

/// Length of a tag, skipping `>` inside quoted attribute values.
fn tag_len(rest: &str) -> Result<usize, FormatError> {
    let mut quote: Option<u8> = None;
    for (i, b) in rest.bytes().enumerate().skip(1) {
        match (quote, b) {
            (Some(q), b) if b == q => quote = None,
            (Some(_), _) => {}
            (None, b'"') | (None, b'\'') => quote = Some(b),
            (None, b'<') => break,
            (None, b'>') => return Ok(i + 1),
            _ => {}
        }
    }
    Err(FormatError::Xml("unterminated tag".to_string()))
}

fn tag(raw: &str) -> Result<Token<'_>, FormatError> {
    let inner = &raw[1..raw.len() - 1];

    if let Some(name) = inner.strip_prefix('/') {
        let name = name.trim();
        return check_name(name).map(|_| Token::End { name, raw });
    }

    let (body, empty) = match inner.strip_suffix('/') {
        Some(body) => (body, true),
        None => (inner, false),
    };
    let name = body.split_whitespace().next().unwrap_or("");
    if body.starts_with(char::is_whitespace) {
        return Err(FormatError::Xml(format!("invalid tag '{}'", raw)));
    }
    check_name(name)?;

    Ok(if empty {
        Token::Empty { raw }
    } else {
        Token::Start { name, raw }
    })
}

fn check_name(name: &str) -> Result<(), FormatError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_alphabetic() || first == '_' || first == ':')
                && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(FormatError::Xml(format!("invalid element name '{}'", name)))
    }
}

fn check_structure(tokens: &[Token<'_>]) -> Result<(), FormatError> {
    let mut open: Vec<&str> = Vec::new();
    let mut roots = 0;

    for token in tokens {
        match *token {
            Token::Start { name, .. } => {
                if open.is_empty() {
                    roots += 1;
                }
                open.push(name);
            }
            Token::Empty { .. } => {
                if open.is_empty() {
                    roots += 1;
                }
            }
            Token::End { name, .. } => match open.pop() {
                Some(expected) if expected == name => {}
                Some(expected) => {
                    return Err(FormatError::Xml(format!(
                        "expected </{}>, found </{}>",
                        expected, name
                    )))
                }
                None => return Err(FormatError::Xml(format!("unexpected </{}>", name))),
            },
            Token::Text(text) => {
                if open.is_empty() && !text.trim().is_empty() {
                    return Err(FormatError::Xml("text outside the root element".to_string()));
                }
            }
            Token::CData(_) => {
                if open.is_empty() {
                    return Err(FormatError::Xml("CDATA outside the root element".to_string()));
                }
            }
            Token::Prolog(_) | Token::Comment(_) => {}
        }

        if roots > 1 {
            return Err(FormatError::Xml("multiple root elements".to_string()));
        }
    }

    if let Some(name) = open.last() {
        return Err(FormatError::Xml(format!("unclosed <{}>", name)));
    }
    if roots == 0 {
        return Err(FormatError::Xml("no root element".to_string()));
    }

    Ok(())
}

pub(super) fn indent(level: usize) -> String {
    "  ".repeat(level)
}
