//! Basic HTTP authentication (RFC 7617).

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Encodes a username and password into a Basic `Authorization` header value.
///
/// # Examples
///
/// ```
/// use rappit_core::auth::basic::basic_auth;
///
/// assert_eq!(basic_auth("user", "pass123"), "Basic dXNlcjpwYXNzMTIz");
/// ```
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
}
