//! Subscriber handles and the state they observe.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::GatewayInner;
use super::entry::{EntryCell, RawState};
use super::error::ApiError;
use super::key::CacheKey;

/// Lifecycle of a cache entry as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStatus {
    /// Nothing fetched yet, or the entry was reset by a logout.
    Uninitialized,
    /// A request is in flight.
    Pending,
    /// The latest request succeeded.
    Fulfilled,
    /// The latest request failed.
    Rejected,
}

/// Snapshot of a query as a subscriber sees it.
pub struct QueryState<T> {
    /// Latest successful result. Kept while refetching and after a failed
    /// refetch.
    pub data: Option<Arc<T>>,
    /// Error of the latest request, if it failed.
    pub error: Option<ApiError>,
    pub status: QueryStatus,
    /// No data yet and a request is in flight.
    pub is_loading: bool,
    /// Any request is in flight.
    pub is_fetching: bool,
    /// Data was invalidated and a fresh copy has not arrived yet.
    pub is_stale: bool,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    /// Whether data is present and nothing newer is pending.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.data.is_some() && !self.is_stale && !self.is_fetching
    }
}

impl<T: Send + Sync + 'static> QueryState<T> {
    pub(crate) fn from_raw(raw: &RawState) -> Self {
        Self {
            data: raw.data.clone().and_then(|data| data.downcast::<T>().ok()),
            error: raw.error.clone(),
            status: raw.status,
            is_loading: raw.is_fetching && raw.data.is_none(),
            is_fetching: raw.is_fetching,
            is_stale: raw.is_stale,
            fulfilled_at: raw.fulfilled_at,
        }
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            status: self.status,
            is_loading: self.is_loading,
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            fulfilled_at: self.fulfilled_at,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for QueryState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("data", &self.data)
            .field("error", &self.error)
            .field("status", &self.status)
            .field("is_loading", &self.is_loading)
            .field("is_fetching", &self.is_fetching)
            .field("is_stale", &self.is_stale)
            .finish_non_exhaustive()
    }
}

/// A live subscription to one cache entry.
///
/// Holding the handle keeps the entry active; dropping it releases the
/// subscriber. Dropping does not cancel a request in flight.
pub struct QuerySubscription<T> {
    gateway: Arc<GatewayInner>,
    cell: Arc<EntryCell>,
    rx: watch::Receiver<RawState>,
    _output: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QuerySubscription<T> {
    pub(crate) fn new(gateway: Arc<GatewayInner>, cell: Arc<EntryCell>) -> Self {
        let rx = cell.state.subscribe();
        Self {
            gateway,
            cell,
            rx,
            _output: PhantomData,
        }
    }

    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.cell.key
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.gateway.sync_epoch();
        QueryState::from_raw(&self.rx.borrow())
    }

    /// Wait for the next state change.
    pub async fn changed(&mut self) -> QueryState<T> {
        // The entry owns the sender and we own the entry, so this cannot
        // observe a closed channel.
        let _ = self.rx.changed().await;
        self.state()
    }

    /// Wait until no request is in flight.
    pub async fn settled(&mut self) -> QueryState<T> {
        let _ = self.rx.wait_for(|s| !s.is_fetching).await;
        self.state()
    }

    /// Request a fresh copy. A response still in flight from an earlier
    /// request is discarded when it arrives.
    pub fn refetch(&self) {
        self.gateway.refetch(&self.cell);
    }
}

impl<T> fmt::Debug for QuerySubscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySubscription")
            .field("key", &self.cell.key)
            .finish_non_exhaustive()
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        self.gateway.release(&self.cell);
    }
}
