//! Endpoint and mutation definitions.
//!
//! Every remote operation is a zero-sized type implementing [`Endpoint`]
//! (cached query) or [`Mutation`] (uncached write). The definition owns the
//! three per-endpoint concerns: how to build the request, which tags the
//! result provides or invalidates, and how a raw payload is normalized into
//! the fixed internal shape before it reaches the cache.

use std::fmt::Display;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;
use super::tags::Tag;

/// Method, path, query, and body of a request, before authorization.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Whether a 401 may trigger the token refresh flow.
    pub reauth: bool,
}

impl RequestSpec {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            reauth: true,
        }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn query(mut self, name: &str, value: impl Display) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter when `value` is present.
    #[must_use]
    pub fn query_opt(self, name: &str, value: Option<impl Display>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns a parsing error if `body` cannot be serialized.
    pub fn json(mut self, body: &impl Serialize) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::parsing(format!("failed to encode request body: {e}")))?;
        self.body = Some(body);
        Ok(self)
    }

    /// Never run the refresh flow for this request (auth endpoints).
    #[must_use]
    pub const fn without_reauth(mut self) -> Self {
        self.reauth = false;
        self
    }
}

/// A cached query.
pub trait Endpoint: 'static {
    /// Endpoint identifier, the first half of every cache key.
    const NAME: &'static str;

    /// Whether results belong to the signed-in user regardless of tags.
    const USER_SCOPED: bool = false;

    type Args: Serialize + Clone + Send + Sync + 'static;
    type Output: Send + Sync + 'static;

    /// Build the request for `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments cannot be encoded.
    fn request(args: &Self::Args) -> Result<RequestSpec, ApiError>;

    /// Tags provided by the entry for `args`. `output` is `None` while the
    /// entry has no data (for example after a failure).
    fn provides(args: &Self::Args, output: Option<&Self::Output>) -> Vec<Tag>;

    /// Turn a successful response body into the internal shape.
    ///
    /// # Errors
    ///
    /// Returns a parsing error if the payload does not match.
    fn normalize(body: Value) -> Result<Self::Output, ApiError>;
}

/// An uncached write.
pub trait Mutation: 'static {
    /// Operation name, used in logs.
    const NAME: &'static str;

    type Args: Send + Sync;
    type Output: Send + Sync;

    /// Build the request for `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments cannot be encoded.
    fn request(args: &Self::Args) -> Result<RequestSpec, ApiError>;

    /// Tags to invalidate once the mutation has succeeded.
    fn invalidates(args: &Self::Args, output: &Self::Output) -> Vec<Tag>;

    /// Turn a successful response body into the internal shape.
    ///
    /// # Errors
    ///
    /// Returns a parsing error if the payload does not match.
    fn normalize(body: Value) -> Result<Self::Output, ApiError>;
}
