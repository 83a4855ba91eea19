//! Request data models.
//!
//! A [`RequestSpec`] is the immutable description of one outbound call. It can
//! only be created through [`RequestSpecBuilder`], which is where the URL and
//! headers are validated, so the executor never sees a malformed request.

use super::{base64_bytes, header_value};
use crate::auth::{inject_auth, AuthScheme, REDACTED};
use crate::config::get_config;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// HTTP GET method - retrieve a resource
    GET,
    /// HTTP POST method - submit data to create a resource
    POST,
    /// HTTP PUT method - replace a resource
    PUT,
    /// HTTP PATCH method - partially modify a resource
    PATCH,
    /// HTTP DELETE method - remove a resource
    DELETE,
    /// HTTP HEAD method - retrieve headers only
    HEAD,
    /// HTTP OPTIONS method - describe communication options
    OPTIONS,
}

impl HttpMethod {
    /// Returns the string representation of the HTTP method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    /// Parses a method name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "PATCH" => Ok(HttpMethod::PATCH),
            "DELETE" => Ok(HttpMethod::DELETE),
            "HEAD" => Ok(HttpMethod::HEAD),
            "OPTIONS" => Ok(HttpMethod::OPTIONS),
            _ => Err(ValidationError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a request description is rejected before it reaches the executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid header name: '{0}'")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{0}'")]
    InvalidHeaderValue(String),

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Request body: raw bytes plus the content type the caller declared for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,

    /// Declared media type, sent as `Content-Type` unless the headers already set one.
    pub content_type: Option<String>,
}

impl RequestBody {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    /// A JSON body declared as `application/json`.
    pub fn json(text: impl Into<String>) -> Self {
        Self::new(text.into(), Some("application/json".to_string()))
    }

    /// A text body declared as `text/plain; charset=utf-8`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text.into(), Some("text/plain; charset=utf-8".to_string()))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Immutable description of an outbound HTTP call.
///
/// Header order is preserved and duplicate names are allowed. Header names are
/// matched case-insensitively wherever the core looks them up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    method: HttpMethod,
    url: Url,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    auth: AuthScheme,
    timeout: Duration,
    follow_redirects: bool,
}

impl RequestSpec {
    /// Starts building a request. Validation happens in [`RequestSpecBuilder::build`].
    ///
    /// # Examples
    ///
    /// ```
    /// use rappit_core::models::{HttpMethod, RequestSpec};
    ///
    /// let spec = RequestSpec::builder(HttpMethod::GET, "https://api.example.com/status")
    ///     .header("Accept", "application/json")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(spec.url().host_str(), Some("api.example.com"));
    /// ```
    pub fn builder(method: HttpMethod, url: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder::new(method, url)
    }

    /// HTTP method to send.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The validated URL, without the extra query parameters.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Caller-supplied headers, in the order they were added.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Extra query parameters, appended to the URL by [`RequestSpec::resolved_url`].
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Request body, if any.
    ///
    /// # Returns
    /// `None` for requests sent without a body. A body may still be empty.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Authentication applied by [`RequestSpec::effective_headers`].
    pub fn auth(&self) -> &AuthScheme {
        &self.auth
    }

    /// Limit for the whole exchange, from connecting until the body is read.
    ///
    /// # Returns
    /// A non-zero duration; zero is rejected by [`RequestSpecBuilder::build`].
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether 3xx responses are followed up to the configured redirect cap.
    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// The URL actually requested: the base URL with the query parameters appended.
    pub fn resolved_url(&self) -> Url {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    /// Headers as they go on the wire.
    ///
    /// Starts from the caller's headers, then adds `Content-Type` from the body
    /// and the authentication header, each only when the caller did not set it.
    pub fn effective_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.headers.clone();

        if let Some(content_type) = self.body.as_ref().and_then(|b| b.content_type.as_ref()) {
            if header_value(&headers, "content-type").is_none() {
                headers.push(("Content-Type".to_string(), content_type.clone()));
            }
        }

        inject_auth(&mut headers, &self.auth);
        headers
    }

    /// Returns a copy with credentials masked.
    ///
    /// Values of headers named in `sensitive` (case-insensitive) are replaced with
    /// a placeholder, as are the secrets of the authentication scheme.
    pub fn redacted(&self, sensitive: &[&str]) -> Self {
        let mut copy = self.clone();
        for (name, value) in copy.headers.iter_mut() {
            if sensitive.iter().any(|s| name.eq_ignore_ascii_case(s)) {
                *value = REDACTED.to_string();
            }
        }
        copy.auth = self.auth.redacted();
        copy
    }
}

impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.resolved_url())
    }
}

/// Builder for [`RequestSpec`].
///
/// Timeout and redirect behavior default to the global configuration.
#[derive(Debug, Clone)]
pub struct RequestSpecBuilder {
    method: HttpMethod,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<RequestBody>,
    auth: AuthScheme,
    timeout: Option<Duration>,
    follow_redirects: Option<bool>,
}

impl RequestSpecBuilder {
    /// Starts a request with no headers, body or authentication.
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `url` - Absolute `http` or `https` URL, checked by [`RequestSpecBuilder::build`]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            auth: AuthScheme::None,
            timeout: None,
            follow_redirects: None,
        }
    }

    /// Appends a header. Repeated names are kept in order.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets the body. Its content type is sent unless a `Content-Type` header is set.
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    /// Overrides the configured timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = Some(follow);
        self
    }

    /// Validates the description and produces the request.
    pub fn build(self) -> Result<RequestSpec, ValidationError> {
        let url = parse_absolute_url(&self.url)?;

        for (name, value) in self.headers.iter().chain(self.auth.header().iter()) {
            validate_header(name, value)?;
        }

        let defaults = get_config();
        let timeout = self.timeout.unwrap_or_else(|| defaults.timeout_duration());
        if timeout.is_zero() {
            return Err(ValidationError::ZeroTimeout);
        }

        Ok(RequestSpec {
            method: self.method,
            url,
            headers: self.headers,
            query: self.query,
            body: self.body,
            auth: self.auth,
            timeout,
            follow_redirects: self.follow_redirects.unwrap_or(defaults.follow_redirects),
        })
    }
}

/// Parses `raw` as an absolute http(s) URL with a host.
fn parse_absolute_url(raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw.trim()).map_err(|e| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ValidationError::MissingHost(raw.to_string())),
    }
}

fn validate_header(name: &str, value: &str) -> Result<(), ValidationError> {
    // RFC 9110 token characters
    let valid_name = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if !valid_name {
        return Err(ValidationError::InvalidHeaderName(name.to_string()));
    }

    if value.bytes().any(|b| b == b'\r' || b == b'\n' || b == 0) {
        return Err(ValidationError::InvalidHeaderValue(name.to_string()));
    }

    Ok(())
}
