//! Type-erased cache entries.
//!
//! An entry is shared between the gateway's maps, every subscription to its
//! key, and any fetch task in flight for it. Lock order is always the active
//! map first, then an entry's `meta`.

use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;

use super::endpoint::{Endpoint, RequestSpec};
use super::error::ApiError;
use super::key::CacheKey;
use super::subscription::QueryStatus;
use super::tags::Tag;

pub(crate) type AnyOutput = Arc<dyn Any + Send + Sync>;

/// Observable part of an entry, broadcast to subscribers.
#[derive(Clone)]
pub(crate) struct RawState {
    pub data: Option<AnyOutput>,
    pub error: Option<ApiError>,
    pub status: QueryStatus,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Default for RawState {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Uninitialized,
            is_fetching: false,
            is_stale: false,
            fulfilled_at: None,
        }
    }
}

type ProvidesFn = Box<dyn Fn(Option<&AnyOutput>) -> Vec<Tag> + Send + Sync>;

/// Everything needed to (re)fetch an entry without knowing its endpoint type.
pub(crate) struct Fetcher {
    pub request: Result<RequestSpec, ApiError>,
    pub normalize: fn(Value) -> Result<AnyOutput, ApiError>,
    pub provides: ProvidesFn,
}

impl Fetcher {
    pub fn for_endpoint<E: Endpoint>(args: E::Args) -> Self {
        Self {
            request: E::request(&args),
            normalize: normalize_erased::<E>,
            provides: Box::new(move |output: Option<&AnyOutput>| {
                E::provides(&args, output.and_then(|o| o.downcast_ref::<E::Output>()))
            }),
        }
    }
}

fn normalize_erased<E: Endpoint>(body: Value) -> Result<AnyOutput, ApiError> {
    E::normalize(body).map(|output| Arc::new(output) as AnyOutput)
}

/// Bookkeeping guarded by the entry's mutex.
pub(crate) struct EntryMeta {
    pub tags: Vec<Tag>,
    pub subscribers: usize,
    /// Latest generation issued; only its response may be applied.
    pub issued: u64,
    pub in_flight: Option<u64>,
    pub fetched_at: Option<Instant>,
}

pub(crate) struct EntryCell {
    pub key: CacheKey,
    pub user_scoped: bool,
    pub fetcher: Fetcher,
    pub state: watch::Sender<RawState>,
    pub meta: Mutex<EntryMeta>,
}

impl EntryCell {
    pub fn new(key: CacheKey, user_scoped: bool, fetcher: Fetcher) -> Self {
        let tags = (fetcher.provides)(None);
        let (state, _) = watch::channel(RawState::default());

        Self {
            key,
            user_scoped,
            fetcher,
            state,
            meta: Mutex::new(EntryMeta {
                tags,
                subscribers: 0,
                issued: 0,
                in_flight: None,
                fetched_at: None,
            }),
        }
    }

    pub fn meta(&self) -> MutexGuard<'_, EntryMeta> {
        self.meta.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the entry must not survive an identity change.
    pub fn is_user_scoped(&self, meta: &EntryMeta) -> bool {
        self.user_scoped || meta.tags.iter().any(Tag::is_user_scoped)
    }

    /// Issue a new generation and flag the entry as fetching.
    ///
    /// The caller must spawn the fetch for the returned generation. Any
    /// earlier generation still in flight is superseded.
    pub fn begin_fetch(&self, meta: &mut EntryMeta) -> u64 {
        meta.issued += 1;
        meta.in_flight = Some(meta.issued);
        self.state.send_modify(|s| {
            s.is_fetching = true;
            s.status = QueryStatus::Pending;
        });
        meta.issued
    }

    /// Forget everything fetched so far. Responses in flight are orphaned.
    pub fn reset(&self, meta: &mut EntryMeta) {
        meta.issued += 1;
        meta.in_flight = None;
        meta.fetched_at = None;
        meta.tags = (self.fetcher.provides)(None);
        self.state.send_replace(RawState::default());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Serialize;
    use serde_json::json;

    use super::*;
    use crate::gateway::tags::TagKind;

    struct Orders;

    #[derive(Clone, Serialize)]
    struct OrdersArgs {
        page: u32,
    }

    impl Endpoint for Orders {
        const NAME: &'static str = "orders";
        type Args = OrdersArgs;
        type Output = Vec<i64>;

        fn request(args: &Self::Args) -> Result<RequestSpec, ApiError> {
            Ok(RequestSpec::get("orders").query("page", args.page))
        }

        fn provides(_args: &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
            let mut tags = vec![Tag::kind(TagKind::Order)];
            tags.extend(output.into_iter().flatten().map(|id| Tag::id(TagKind::Order, id)));
            tags
        }

        fn normalize(body: Value) -> Result<Self::Output, ApiError> {
            serde_json::from_value(body).map_err(|e| ApiError::parsing(e.to_string()))
        }
    }

    fn cell() -> EntryCell {
        EntryCell::new(
            CacheKey::new("orders", &json!({"page": 1})),
            false,
            Fetcher::for_endpoint::<Orders>(OrdersArgs { page: 1 }),
        )
    }

    #[test]
    fn test_initial_tags_and_scope() {
        let cell = cell();
        let meta = cell.meta();
        assert_eq!(meta.tags, vec![Tag::kind(TagKind::Order)]);
        assert!(cell.is_user_scoped(&meta));
    }

    #[test]
    fn test_erased_normalize_and_provides() {
        let cell = cell();
        let output = (cell.fetcher.normalize)(json!([4, 5])).unwrap();
        let tags = (cell.fetcher.provides)(Some(&output));
        assert!(tags.contains(&Tag::id(TagKind::Order, 5)));
        assert_eq!(output.downcast_ref::<Vec<i64>>(), Some(&vec![4, 5]));
    }

    #[test]
    fn test_generations_increase() {
        let cell = cell();
        let mut meta = cell.meta();
        let first = cell.begin_fetch(&mut meta);
        let second = cell.begin_fetch(&mut meta);
        assert!(second > first);
        assert_eq!(meta.in_flight, Some(second));
        assert!(cell.state.borrow().is_fetching);

        cell.reset(&mut meta);
        assert!(meta.issued > second);
        assert!(meta.in_flight.is_none());
        assert_eq!(cell.state.borrow().status, QueryStatus::Uninitialized);
    }
}
