//! Data models for requests and execution outcomes.
//!
//! This module contains the core data structures shared by the executor,
//! the response formatter, the history store, and the coordinator.

pub mod request;
pub mod response;

pub use request::{HttpMethod, RequestBody, RequestSpec, RequestSpecBuilder, ValidationError};
pub use response::{ExecutionOutcome, FailureKind, OutcomeKind};

/// Looks up the first header named `name`, ignoring ASCII case.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Serializes raw bytes as a base64 string so binary bodies survive JSON storage.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
