//! Structured API failure shape.
//!
//! Query and mutation failures never cross the subscription boundary as
//! panics or opaque errors. They are values of [`ApiError`], serialized as
//! `{ "status": 404 | "network" | "parsing", "data": ... }`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Where a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiStatus {
    /// The server answered with a non-success HTTP status.
    Http(u16),
    /// The request never produced a response (connection, timeout, no runtime).
    Network,
    /// A response arrived but could not be normalized into the expected shape.
    Parsing,
}

impl Serialize for ApiStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Http(code) => serializer.serialize_u16(*code),
            Self::Network => serializer.serialize_str("network"),
            Self::Parsing => serializer.serialize_str("parsing"),
        }
    }
}

impl<'de> Deserialize<'de> for ApiStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u16),
            Label(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Ok(Self::Http(code)),
            Raw::Label(label) => match label.as_str() {
                "network" => Ok(Self::Network),
                "parsing" => Ok(Self::Parsing),
                other => Err(serde::de::Error::custom(format!(
                    "unknown API error status: {other}"
                ))),
            },
        }
    }
}

impl std::fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(code) => write!(f, "HTTP {code}"),
            Self::Network => f.write_str("network"),
            Self::Parsing => f.write_str("parsing"),
        }
    }
}

/// A failed query or mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("API error ({status}): {}", payload_message(.data))]
pub struct ApiError {
    pub status: ApiStatus,
    /// Error payload from the server, or a message for local failures.
    pub data: Value,
}

impl ApiError {
    /// A non-success HTTP response.
    #[must_use]
    pub const fn http(status: u16, data: Value) -> Self {
        Self {
            status: ApiStatus::Http(status),
            data,
        }
    }

    /// A transport-level failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Network,
            data: Value::String(message.into()),
        }
    }

    /// A response that did not match the expected shape.
    #[must_use]
    pub fn parsing(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Parsing,
            data: Value::String(message.into()),
        }
    }

    /// HTTP status code, if the server answered.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self.status {
            ApiStatus::Http(code) => Some(code),
            ApiStatus::Network | ApiStatus::Parsing => None,
        }
    }

    /// Whether this is an authentication failure (the UI redirects to login).
    #[must_use]
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self.status, ApiStatus::Http(401))
    }

    /// Whether the failure is on the server or network side (worth reporting).
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self.status {
            ApiStatus::Http(code) => code >= 500,
            ApiStatus::Network | ApiStatus::Parsing => true,
        }
    }

    /// Human-readable message extracted from the payload.
    ///
    /// Looks for `message` or `error` fields (also one level down in `error`
    /// objects) and falls back to the raw payload.
    #[must_use]
    pub fn message(&self) -> String {
        payload_message(&self.data)
    }
}

fn payload_message(data: &Value) -> String {
    fn field(value: &Value) -> Option<&str> {
        value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
    }

    match data {
        Value::String(s) => s.clone(),
        Value::Null => "(no details)".to_string(),
        other => field(other)
            .or_else(|| other.get("error").and_then(field))
            .map_or_else(|| other.to_string(), str::to_string),
    }
}
