//! JSON pretty-printing and minification.
//!
//! Both operations go through a `serde_json::Value`, which keeps object keys in
//! input order because the crate enables `preserve_order`.

use crate::formatter::FormatError;
use serde::Serialize;
use serde_json::Value;

/// Formats JSON with pretty-printing using 2-space indentation.
///
/// # Examples
///
/// ```
/// use rappit_core::formatter::json::format_json_pretty;
///
/// let formatted = format_json_pretty(r#"{"name":"John","age":30}"#).unwrap();
/// assert_eq!(formatted, "{\n  \"name\": \"John\",\n  \"age\": 30\n}");
/// ```
pub fn format_json_pretty(json: &str) -> Result<String, FormatError> {
    let value = parse(json)?;

    // formatted output is usually about 1.5x the input
    let mut buf = Vec::with_capacity(json.len() + json.len() / 2);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);

    value
        .serialize(&mut serializer)
        .map_err(|e| FormatError::Json(e.to_string()))?;

    String::from_utf8(buf).map_err(|e| FormatError::Json(e.to_string()))
}

/// Removes all insignificant whitespace.
pub fn minify_json(json: &str) -> Result<String, FormatError> {
    let value = parse(json)?;
    serde_json::to_string(&value).map_err(|e| FormatError::Json(e.to_string()))
}

fn parse(json: &str) -> Result<Value, FormatError> {
    serde_json::from_str(json).map_err(|e| FormatError::Json(e.to_string()))
}
