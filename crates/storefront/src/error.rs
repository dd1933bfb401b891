//! Unified error handling with Sentry integration.
//!
//! Each concern has its own error enum (`StorageError`, `ConfigError`,
//! `ApiError`, `CheckoutError`, `TransportError`); [`StorefrontError`]
//! aggregates the ones a caller of the facade can see. Server-side failures
//! are captured to Sentry where they are first observed.

use thiserror::Error;

use crate::cart::CheckoutError;
use crate::config::ConfigError;
use crate::gateway::ApiError;
use crate::storage::StorageError;

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A query or mutation failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Checkout was attempted from an invalid state.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// A storage backend could not be set up.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StorefrontError {
    /// Whether the caller should send the user to the login screen.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_auth_failure())
    }
}

/// Result type alias for `StorefrontError`.
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Report a failed request to Sentry when the failure is on the server side.
///
/// Client errors (4xx) are expected outcomes surfaced to the UI and are only
/// logged at debug level.
pub fn capture_api_error(operation: &str, err: &ApiError) {
    if err.is_server_error() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            operation,
            error = %err,
            sentry_event_id = %event_id,
            "API request failed"
        );
    } else {
        tracing::debug!(operation, error = %err, "API request rejected");
    }
}

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
