//! Bearer token authentication (RFC 6750).

/// Formats a token into a Bearer `Authorization` header value.
///
/// Surrounding whitespace in the token is dropped.
///
/// # Examples
///
/// ```
/// use rappit_core::auth::bearer::bearer_token;
///
/// assert_eq!(bearer_token("abc123xyz"), "Bearer abc123xyz");
/// ```
pub fn bearer_token(token: &str) -> String {
    format!("Bearer {}", token.trim())
}
