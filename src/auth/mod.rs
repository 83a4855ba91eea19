//! HTTP authentication descriptors.
//!
//! A request carries at most one [`AuthScheme`]. At send time the scheme is
//! turned into a single header which is added only when the caller has not
//! already supplied a header for the same purpose.

pub mod basic;
pub mod bearer;

use serde::{Deserialize, Serialize};

/// Header name used by Basic and Bearer authentication.
pub const AUTHORIZATION: &str = "Authorization";

/// Placeholder written in place of credentials when history redaction is on.
pub const REDACTED: &str = "<redacted>";

/// Authentication scheme attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// No authentication
    #[default]
    None,
    /// HTTP Basic authentication (RFC 7617)
    Basic { username: String, password: String },
    /// Bearer token authentication (RFC 6750)
    Bearer { token: String },
    /// API key sent in a named header, e.g. `X-API-Key`
    ApiKey { header: String, value: String },
}

impl AuthScheme {
    /// Returns the header this scheme contributes, or `None` for [`AuthScheme::None`].
    pub fn header(&self) -> Option<(String, String)> {
        match self {
            AuthScheme::None => None,
            AuthScheme::Basic { username, password } => Some((
                AUTHORIZATION.to_string(),
                basic::basic_auth(username, password),
            )),
            AuthScheme::Bearer { token } => {
                Some((AUTHORIZATION.to_string(), bearer::bearer_token(token)))
            }
            AuthScheme::ApiKey { header, value } => Some((header.clone(), value.clone())),
        }
    }

    /// Name of the header this scheme writes to.
    pub fn header_name(&self) -> Option<&str> {
        match self {
            AuthScheme::None => None,
            AuthScheme::Basic { .. } | AuthScheme::Bearer { .. } => Some(AUTHORIZATION),
            AuthScheme::ApiKey { header, .. } => Some(header.as_str()),
        }
    }

    /// Returns a copy with every secret replaced by [`REDACTED`].
    ///
    /// The username of a Basic scheme and the header name of an API key are kept
    /// so a redacted history entry still shows which identity was used.
    pub fn redacted(&self) -> Self {
        match self {
            AuthScheme::None => AuthScheme::None,
            AuthScheme::Basic { username, .. } => AuthScheme::Basic {
                username: username.clone(),
                password: REDACTED.to_string(),
            },
            AuthScheme::Bearer { .. } => AuthScheme::Bearer {
                token: REDACTED.to_string(),
            },
            AuthScheme::ApiKey { header, .. } => AuthScheme::ApiKey {
                header: header.clone(),
                value: REDACTED.to_string(),
            },
        }
    }
}

/// Adds the header for `auth` to `headers` unless one with the same name exists.
///
/// Header names are compared case-insensitively. A caller-supplied value always wins.
///
/// # Returns
///
/// `true` if a header was added.
pub fn inject_auth(headers: &mut Vec<(String, String)>, auth: &AuthScheme) -> bool {
    let Some((name, value)) = auth.header() else {
        return false;
    };

    if headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(&name)) {
        return false;
    }

    headers.push((name, value));
    true
}
