//! Durable local storage for client state.
//!
//! The cart, wishlist, and session each persist under their own key so that a
//! corrupt value in one never takes the others down with it.
//!
//! # Layers
//!
//! - [`DurableStorage`] - the raw, fallible key/string backend
//!   ([`MemoryStorage`], [`FileStorage`])
//! - [`DurableStore`] - the adapter every store uses: typed `load`/`save` that
//!   never fail, wrapping values in a versioned envelope
//!
//! Storage failures are recovered here and only logged. A failed load yields
//! `None` (callers fall back to their default), a failed save is dropped.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::sync::Arc;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{error, warn};

/// Envelope version written by this build.
///
/// Bump when a persisted shape changes incompatibly; older payloads are then
/// discarded on load instead of being misread.
pub const STATE_VERSION: u32 = 1;

/// Keys for the independently persisted client state.
pub mod keys {
    /// Cart lines.
    pub const CART: &str = "cart";

    /// Wishlist entries.
    pub const WISHLIST: &str = "wishlist";

    /// Authentication snapshot (identity and tokens).
    pub const SESSION: &str = "session";
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem read or write failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend refused the write because it would exceed its quota.
    #[error("storage quota exceeded writing {key} ({size} bytes)")]
    QuotaExceeded { key: String, size: usize },

    /// The backend is not usable at all (e.g. private browsing mode).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A synchronous key/string storage backend.
///
/// Implementations report failures; [`DurableStore`] decides what to do with
/// them.
pub trait DurableStorage: Send + Sync {
    /// Read the value stored under `key`, `Ok(None)` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected or fails.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    state: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    state: serde_json::Value,
}

/// Typed, infallible view over a [`DurableStorage`] backend.
///
/// Cheaply cloneable; every store holds its own handle.
#[derive(Clone)]
pub struct DurableStore {
    backend: Arc<dyn DurableStorage>,
    prefix: String,
}

impl DurableStore {
    /// Wrap a backend, namespacing every key with `prefix`.
    #[must_use]
    pub fn new(backend: Arc<dyn DurableStorage>, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    /// A store over a fresh in-memory backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), "emporium")
    }

    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}-{key}", self.prefix)
        }
    }

    /// Load the value stored under `key`.
    ///
    /// Returns `None` when the key is missing, the backend fails, the
    /// envelope version differs from [`STATE_VERSION`], or the payload does not
    /// deserialize as `T`. Never fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);

        let raw = match self.backend.get(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Failed to read persisted state");
                return None;
            }
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key = %full_key, error = %e, "Discarding unparseable persisted state");
                return None;
            }
        };

        if envelope.version != STATE_VERSION {
            warn!(
                key = %full_key,
                found = envelope.version,
                expected = STATE_VERSION,
                "Discarding persisted state with unknown version"
            );
            return None;
        }

        match serde_json::from_value(envelope.state) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Discarding persisted state with invalid shape");
                None
            }
        }
    }

    /// Persist `value` under `key`. Failures are logged and swallowed.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) {
        let full_key = self.full_key(key);
        let envelope = EnvelopeRef {
            version: STATE_VERSION,
            state: value,
        };

        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(e) => {
                error!(key = %full_key, error = %e, "Failed to serialize state for persistence");
                return;
            }
        };

        if let Err(e) = self.backend.set(&full_key, &raw) {
            error!(key = %full_key, error = %e, "Failed to persist state");
        }
    }

    /// Delete the value under `key`. Failures are logged and swallowed.
    pub fn remove(&self, key: &str) {
        let full_key = self.full_key(key);
        if let Err(e) = self.backend.remove(&full_key) {
            error!(key = %full_key, error = %e, "Failed to remove persisted state");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct Sample {
        items: Vec<String>,
        count: u32,
    }

    fn store_with(backend: Arc<MemoryStorage>) -> DurableStore {
        DurableStore::new(backend, "test")
    }

    #[test]
    fn test_round_trip() {
        let store = DurableStore::in_memory();
        let sample = Sample {
            items: vec!["a".to_string(), "b".to_string()],
            count: 2,
        };

        store.save("sample", &sample);
        assert_eq!(store.load::<Sample>("sample"), Some(sample));
    }

    #[test]
    fn test_round_trip_default_shape() {
        let store = DurableStore::in_memory();
        store.save("sample", &Sample::default());
        assert_eq!(store.load::<Sample>("sample"), Some(Sample::default()));
    }

    #[test]
    fn test_missing_key_is_none() {
        let store = DurableStore::in_memory();
        assert_eq!(store.load::<Sample>("absent"), None);
    }

    #[test]
    fn test_corrupt_payload_is_none() {
        let backend = Arc::new(MemoryStorage::new());
        backend.set("test-sample", "{not json").unwrap();

        let store = store_with(backend);
        assert_eq!(store.load::<Sample>("sample"), None);
    }

    #[test]
    fn test_wrong_shape_is_none() {
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set("test-sample", r#"{"version":1,"state":{"items":42}}"#)
            .unwrap();

        let store = store_with(backend);
        assert_eq!(store.load::<Sample>("sample"), None);
    }

    #[test]
    fn test_version_mismatch_is_none() {
        let backend = Arc::new(MemoryStorage::new());
        backend
            .set("test-sample", r#"{"version":0,"state":{"items":[],"count":0}}"#)
            .unwrap();

        let store = store_with(backend);
        assert_eq!(store.load::<Sample>("sample"), None);
    }

    #[test]
    fn test_save_failure_is_swallowed() {
        let backend = Arc::new(MemoryStorage::with_quota(8));
        let store = store_with(Arc::clone(&backend));

        store.save(
            "sample",
            &Sample {
                items: vec!["too large for the quota".to_string()],
                count: 1,
            },
        );

        assert_eq!(store.load::<Sample>("sample"), None);
        assert!(backend.get("test-sample").unwrap().is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let backend = Arc::new(MemoryStorage::new());
        let store = store_with(Arc::clone(&backend));
        store.save(keys::CART, &Sample::default());
        backend.set("test-wishlist", "garbage").unwrap();

        assert_eq!(store.load::<Sample>(keys::CART), Some(Sample::default()));
        assert_eq!(store.load::<Sample>(keys::WISHLIST), None);
    }

    #[test]
    fn test_remove() {
        let store = DurableStore::in_memory();
        store.save("sample", &Sample::default());
        store.remove("sample");
        assert_eq!(store.load::<Sample>("sample"), None);
    }
}
