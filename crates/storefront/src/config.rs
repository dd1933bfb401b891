//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `EMPORIUM_API_BASE_URL` - Base URL of the remote commerce API
//!
//! ## Optional
//! - `EMPORIUM_STORAGE_DIR` - Directory for persisted client state (default: .emporium)
//! - `EMPORIUM_STORAGE_PREFIX` - Namespace for persisted keys (default: emporium)
//! - `EMPORIUM_CACHE_RETENTION_SECS` - How long unreferenced query results are kept (default: 60)
//! - `EMPORIUM_STALE_AFTER_SECS` - Age after which a new subscriber refetches (default: 300)
//! - `EMPORIUM_CACHE_CAPACITY` - Maximum retained unreferenced query results (default: 500)
//! - `EMPORIUM_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 30)
//! - `EMPORIUM_PAGE_SIZE` - Products per catalog page (default: 12)
//! - `EMPORIUM_PRICE_MAX` - Upper bound of the price filter slider (default: 1000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Remote API settings
    pub api: ApiConfig,
    /// Durable client-state storage settings
    pub storage: StorageConfig,
    /// Query cache settings
    pub cache: CacheConfig,
    /// Catalog browsing defaults
    pub catalog: CatalogConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Remote API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
}

/// Durable storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub dir: PathBuf,
    pub prefix: String,
}

/// Query cache configuration.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// How long a result with no subscribers survives.
    pub retention: Duration,
    /// Age after which a new subscriber triggers a background refetch.
    pub stale_after: Duration,
    /// Maximum number of retained results with no subscribers.
    pub capacity: u64,
}

/// Catalog browsing defaults.
#[derive(Debug, Clone, Copy)]
pub struct CatalogConfig {
    pub page_size: u32,
    /// Upper bound of the price filter; a maximum equal to it is "no limit".
    pub price_max: Decimal,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".emporium"),
            prefix: "emporium".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            capacity: 500,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: 12,
            price_max: Decimal::from(1000),
        }
    }
}

impl StorefrontConfig {
    /// Configuration for `base_url` with every optional setting at its default.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            api: ApiConfig {
                base_url,
                request_timeout: Duration::from_secs(30),
            },
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            catalog: CatalogConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Source(&lookup);

        let base_url = env.required("EMPORIUM_API_BASE_URL")?;
        let base_url = Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("EMPORIUM_API_BASE_URL".to_string(), e.to_string())
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "EMPORIUM_API_BASE_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        let defaults = Self::new(base_url);

        let api = ApiConfig {
            request_timeout: env.secs_or(
                "EMPORIUM_REQUEST_TIMEOUT_SECS",
                defaults.api.request_timeout,
            )?,
            ..defaults.api
        };
        let storage = StorageConfig {
            dir: env
                .optional("EMPORIUM_STORAGE_DIR")
                .map_or(defaults.storage.dir, PathBuf::from),
            prefix: env
                .optional("EMPORIUM_STORAGE_PREFIX")
                .unwrap_or(defaults.storage.prefix),
        };
        let cache = CacheConfig {
            retention: env.secs_or("EMPORIUM_CACHE_RETENTION_SECS", defaults.cache.retention)?,
            stale_after: env.secs_or("EMPORIUM_STALE_AFTER_SECS", defaults.cache.stale_after)?,
            capacity: env.parsed_or("EMPORIUM_CACHE_CAPACITY", defaults.cache.capacity)?,
        };
        let catalog = CatalogConfig {
            page_size: env.parsed_or("EMPORIUM_PAGE_SIZE", defaults.catalog.page_size)?,
            price_max: env.parsed_or("EMPORIUM_PRICE_MAX", defaults.catalog.price_max)?,
        };
        if catalog.page_size == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "EMPORIUM_PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if catalog.price_max <= Decimal::ZERO {
            return Err(ConfigError::InvalidEnvVar(
                "EMPORIUM_PRICE_MAX".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            api,
            storage,
            cache,
            catalog,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Source<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Source<'_, F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    fn secs_or(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parsed_or(key, default.as_secs())
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("EMPORIUM_API_BASE_URL", "https://api.example.com/v1")]).unwrap();

        assert_eq!(config.api.base_url.as_str(), "https://api.example.com/v1");
        assert_eq!(config.api.request_timeout, Duration::from_secs(30));
        assert_eq!(config.storage.dir, PathBuf::from(".emporium"));
        assert_eq!(config.storage.prefix, "emporium");
        assert_eq!(config.cache.retention, Duration::from_secs(60));
        assert_eq!(config.cache.stale_after, Duration::from_secs(300));
        assert_eq!(config.cache.capacity, 500);
        assert_eq!(config.catalog.page_size, 12);
        assert_eq!(config.catalog.price_max, Decimal::from(1000));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_base_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "EMPORIUM_API_BASE_URL"));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = load(&[("EMPORIUM_API_BASE_URL", "not a url")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar(key, _) if key == "EMPORIUM_API_BASE_URL"
        ));

        let err = load(&[("EMPORIUM_API_BASE_URL", "mailto:shop@example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("EMPORIUM_API_BASE_URL", "http://localhost:5000/api"),
            ("EMPORIUM_STORAGE_DIR", "/tmp/shop"),
            ("EMPORIUM_CACHE_RETENTION_SECS", "0"),
            ("EMPORIUM_PAGE_SIZE", " 24 "),
            ("EMPORIUM_PRICE_MAX", "250.50"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
        ])
        .unwrap();

        assert_eq!(config.storage.dir, PathBuf::from("/tmp/shop"));
        assert_eq!(config.cache.retention, Duration::ZERO);
        assert_eq!(config.catalog.page_size, 24);
        assert_eq!(config.catalog.price_max, Decimal::new(25050, 2));
        assert!(config.sentry_dsn.is_some());
    }

    #[test]
    fn test_invalid_numbers() {
        let err = load(&[
            ("EMPORIUM_API_BASE_URL", "http://localhost"),
            ("EMPORIUM_CACHE_CAPACITY", "lots"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnvVar(key, _) if key == "EMPORIUM_CACHE_CAPACITY"
        ));

        let err = load(&[
            ("EMPORIUM_API_BASE_URL", "http://localhost"),
            ("EMPORIUM_PAGE_SIZE", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(key, _) if key == "EMPORIUM_PAGE_SIZE"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[
            ("EMPORIUM_API_BASE_URL", "http://localhost"),
            ("SENTRY_DSN", "  "),
        ])
        .unwrap();
        assert!(config.sentry_dsn.is_none());
    }
}
