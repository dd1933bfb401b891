//! Query gateway: cached, deduplicated, tag-invalidated access to the API.
//!
//! # Model
//!
//! - A query is identified by a [`CacheKey`] derived from its endpoint name
//!   and canonicalized arguments.
//! - Each key has one entry. Subscribers attach to the entry through a
//!   [`QuerySubscription`]; a new subscriber never starts a second request
//!   while one is in flight.
//! - Every request for a key gets an increasing generation. Only the
//!   response for the latest generation is applied.
//! - Entries with no subscribers move to a `moka` retention pool and are
//!   revived by the next subscriber within the retention window.
//! - Mutations declare the [`Tag`]s they invalidate. Subscribed entries that
//!   provide a matching tag are refetched; unsubscribed ones are dropped.
//! - The bearer token is read when a request is dispatched. A change of
//!   session identity drops every user-scoped entry.
//!
//! A 401 on an authorized request triggers at most one token refresh and
//! one replay. Concurrent recoveries are serialized; a request whose token
//! was already replaced replays without refreshing again.

mod endpoint;
mod entry;
mod error;
mod key;
mod subscription;
mod tags;
mod transport;

pub use endpoint::{Endpoint, Mutation, RequestSpec};
pub use error::{ApiError, ApiStatus};
pub use key::CacheKey;
pub use subscription::{QueryState, QueryStatus, QuerySubscription};
pub use tags::{Tag, TagKind};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport, TransportError};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use secrecy::SecretString;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::api::auth::RefreshTokens;
use crate::config::CacheConfig;
use crate::error::capture_api_error;
use crate::session::{Credentials, SessionStore};
use entry::{AnyOutput, EntryCell, Fetcher};

/// Cache tuning.
#[derive(Debug, Clone, Copy)]
pub struct GatewayOptions {
    /// How long an entry with no subscribers is kept. Zero drops it at once.
    pub retention: Duration,
    /// Age after which a new subscriber triggers a background refetch.
    pub stale_after: Duration,
    /// Maximum number of retained entries.
    pub capacity: u64,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        CacheConfig::default().into()
    }
}

impl From<CacheConfig> for GatewayOptions {
    fn from(config: CacheConfig) -> Self {
        Self {
            retention: config.retention,
            stale_after: config.stale_after,
            capacity: config.capacity,
        }
    }
}

/// Cached access to the remote API.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct QueryGateway {
    inner: Arc<GatewayInner>,
}

pub(crate) struct GatewayInner {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    options: GatewayOptions,
    active: Mutex<HashMap<CacheKey, Arc<EntryCell>>>,
    retained: Option<moka::sync::Cache<CacheKey, Arc<EntryCell>>>,
    refresh_lock: tokio::sync::Mutex<()>,
    seen_epoch: AtomicU64,
}

impl QueryGateway {
    /// Create a gateway sending requests through `transport` and authorizing
    /// them from `session`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        session: SessionStore,
        options: GatewayOptions,
    ) -> Self {
        let retained = (!options.retention.is_zero()).then(|| {
            moka::sync::Cache::builder()
                .max_capacity(options.capacity)
                .time_to_live(options.retention)
                .build()
        });
        let seen_epoch = AtomicU64::new(session.epoch());

        Self {
            inner: Arc::new(GatewayInner {
                transport,
                session,
                options,
                active: Mutex::new(HashMap::new()),
                retained,
                refresh_lock: tokio::sync::Mutex::new(()),
                seen_epoch,
            }),
        }
    }

    /// The cache key `args` map to for endpoint `E`.
    ///
    /// # Errors
    ///
    /// Returns an error if `args` cannot be serialized.
    pub fn key<E: Endpoint>(args: &E::Args) -> Result<CacheKey, serde_json::Error> {
        CacheKey::for_args(E::NAME, args)
    }

    /// Subscribe to `E` with `args`, starting a request if needed.
    ///
    /// Never fails: request failures are observed on the subscription.
    #[instrument(skip_all, fields(endpoint = E::NAME))]
    pub fn query<E: Endpoint>(&self, args: E::Args) -> QuerySubscription<E::Output> {
        self.inner.sync_epoch();

        let key = match Self::key::<E>(&args) {
            Ok(key) => key,
            Err(e) => {
                let err = ApiError::parsing(format!("failed to encode query arguments: {e}"));
                return self.detached_error::<E>(args, err);
            }
        };

        let (cell, generation) = {
            let mut active = self.inner.lock_active();
            let cell = self.inner.acquire::<E>(&mut active, key, args);

            let mut meta = cell.meta();
            meta.subscribers += 1;
            let generation = self
                .inner
                .needs_fetch(&cell, &meta)
                .then(|| cell.begin_fetch(&mut meta));
            drop(meta);
            (cell, generation)
        };

        if let Some(generation) = generation {
            self.inner.spawn_fetch(Arc::clone(&cell), generation);
        }

        QuerySubscription::new(Arc::clone(&self.inner), cell)
    }

    /// Fetch `E` with `args` and wait for the result.
    ///
    /// Served from cache when fresh data is present.
    ///
    /// # Errors
    ///
    /// Returns the request's [`ApiError`] if the latest attempt failed.
    pub async fn fetch<E: Endpoint>(&self, args: E::Args) -> Result<Arc<E::Output>, ApiError> {
        let mut subscription = self.query::<E>(args);
        let state = subscription.settled().await;

        match (state.status, state.data, state.error) {
            (QueryStatus::Rejected, _, Some(err)) => Err(err),
            (_, Some(data), _) => Ok(data),
            (_, None, Some(err)) => Err(err),
            (_, None, None) => Err(ApiError::network("query was reset before it completed")),
        }
    }

    /// Warm the cache for `E` with `args` without holding a subscriber.
    ///
    /// The entry goes straight to the retention pool, so this has no lasting
    /// effect when retention is disabled.
    pub fn prefetch<E: Endpoint>(&self, args: E::Args) {
        drop(self.query::<E>(args));
    }

    /// Current state of `E` with `args`, without subscribing or fetching.
    #[must_use]
    pub fn peek<E: Endpoint>(&self, args: &E::Args) -> Option<QueryState<E::Output>> {
        self.inner.sync_epoch();
        let key = Self::key::<E>(args).ok()?;
        let cell = self.inner.lookup(&key)?;
        let raw = cell.state.borrow().clone();
        Some(QueryState::from_raw(&raw))
    }

    /// Whether an entry (active or retained) exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.sync_epoch();
        self.inner.lookup(key).is_some()
    }

    /// Number of live subscriptions to `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.inner
            .lock_active()
            .get(key)
            .map_or(0, |cell| cell.meta().subscribers)
    }

    /// Run mutation `M` and invalidate the tags it declares on success.
    ///
    /// # Errors
    ///
    /// Returns the request's [`ApiError`] on failure.
    #[instrument(skip_all, fields(mutation = M::NAME))]
    pub async fn mutate<M: Mutation>(&self, args: M::Args) -> Result<M::Output, ApiError> {
        self.inner.sync_epoch();

        let result = match M::request(&args) {
            Ok(spec) => self.inner.execute(&spec).await.and_then(M::normalize),
            Err(err) => Err(err),
        };

        match result {
            Ok(output) => {
                let tags = M::invalidates(&args, &output);
                self.invalidate_tags(&tags);
                Ok(output)
            }
            Err(err) => {
                capture_api_error(M::NAME, &err);
                Err(err)
            }
        }
    }

    /// Invalidate every entry providing a tag matched by `tags`.
    ///
    /// Subscribed entries are marked stale and refetched; unsubscribed
    /// entries are dropped.
    pub fn invalidate_tags(&self, tags: &[Tag]) {
        if tags.is_empty() {
            return;
        }

        let mut refetch = Vec::new();
        {
            let active = self.inner.lock_active();
            for cell in active.values() {
                let mut meta = cell.meta();
                if !tags::intersects(tags, &meta.tags) {
                    continue;
                }

                // A response already in flight may predate the mutation, so it
                // is superseded rather than awaited.
                cell.state.send_modify(|s| s.is_stale = true);
                refetch.push((Arc::clone(cell), cell.begin_fetch(&mut meta)));
            }
        }

        if let Some(retained) = &self.inner.retained {
            let dropped: Vec<_> = retained
                .iter()
                .filter(|(_, cell)| tags::intersects(tags, &cell.meta().tags))
                .map(|(key, _)| key)
                .collect();
            for key in dropped {
                retained.invalidate(key.as_ref());
            }
        }

        debug!(
            tags = %tags.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
            refetching = refetch.len(),
            "Invalidated tags"
        );

        for (cell, generation) in refetch {
            self.inner.spawn_fetch(cell, generation);
        }
    }

    /// Drop every user-scoped entry.
    ///
    /// Subscribed entries are reset to uninitialized (data cleared, not
    /// marked stale) and responses in flight for them are discarded.
    pub fn purge_user_scoped(&self) {
        self.inner.seen_epoch.store(self.inner.session.epoch(), Ordering::Release);
        self.inner.purge_user_scoped();
    }

    /// The session this gateway authorizes requests from.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    fn detached_error<E: Endpoint>(
        &self,
        args: E::Args,
        err: ApiError,
    ) -> QuerySubscription<E::Output> {
        let cell = Arc::new(EntryCell::new(
            CacheKey::new(E::NAME, &Value::String(err.message())),
            E::USER_SCOPED,
            Fetcher::for_endpoint::<E>(args),
        ));
        cell.meta().subscribers += 1;
        cell.state.send_modify(|s| {
            s.error = Some(err);
            s.status = QueryStatus::Rejected;
        });
        QuerySubscription::new(Arc::clone(&self.inner), cell)
    }
}

impl GatewayInner {
    fn lock_active(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<EntryCell>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Active or retained entry for `key`.
    fn lookup(&self, key: &CacheKey) -> Option<Arc<EntryCell>> {
        let active = self.lock_active();
        active
            .get(key)
            .cloned()
            .or_else(|| self.retained.as_ref().and_then(|r| r.get(key)))
    }

    /// Find the active entry for `key`, reviving a retained one or creating
    /// a new one. The entry is active when this returns.
    fn acquire<E: Endpoint>(
        &self,
        active: &mut HashMap<CacheKey, Arc<EntryCell>>,
        key: CacheKey,
        args: E::Args,
    ) -> Arc<EntryCell> {
        if let Some(cell) = active.get(&key) {
            debug!(%key, "Cache hit");
            return Arc::clone(cell);
        }

        let revived = self.retained.as_ref().and_then(|retained| {
            let cell = retained.get(&key)?;
            retained.invalidate(&key);
            Some(cell)
        });

        let cell = revived.map_or_else(
            || {
                debug!(%key, "Cache miss");
                Arc::new(EntryCell::new(
                    key.clone(),
                    E::USER_SCOPED,
                    Fetcher::for_endpoint::<E>(args),
                ))
            },
            |cell| {
                debug!(%key, "Revived retained entry");
                cell
            },
        );

        active.insert(key, Arc::clone(&cell));
        cell
    }

    /// Whether a new subscriber should trigger a request.
    fn needs_fetch(&self, cell: &EntryCell, meta: &entry::EntryMeta) -> bool {
        if meta.in_flight.is_some() {
            return false;
        }

        let state = cell.state.borrow();
        match state.status {
            QueryStatus::Uninitialized | QueryStatus::Rejected => true,
            QueryStatus::Pending => false,
            QueryStatus::Fulfilled => {
                state.is_stale
                    || meta
                        .fetched_at
                        .is_some_and(|at| at.elapsed() >= self.options.stale_after)
            }
        }
    }

    fn refetch(self: &Arc<Self>, cell: &Arc<EntryCell>) {
        self.sync_epoch();
        let generation = cell.begin_fetch(&mut cell.meta());
        self.spawn_fetch(Arc::clone(cell), generation);
    }

    /// Drop one subscriber; an entry left with none moves to retention.
    fn release(&self, cell: &Arc<EntryCell>) {
        let mut active = self.lock_active();
        let mut meta = cell.meta();
        meta.subscribers = meta.subscribers.saturating_sub(1);
        if meta.subscribers > 0 {
            return;
        }
        drop(meta);

        let is_registered = active
            .get(&cell.key)
            .is_some_and(|registered| Arc::ptr_eq(registered, cell));
        if !is_registered {
            return;
        }
        active.remove(&cell.key);

        match &self.retained {
            Some(retained) => {
                debug!(key = %cell.key, "Retaining unreferenced entry");
                retained.insert(cell.key.clone(), Arc::clone(cell));
            }
            None => debug!(key = %cell.key, "Evicted unreferenced entry"),
        }
    }

    /// Purge user-scoped entries if the session identity changed since the
    /// last check.
    fn sync_epoch(&self) {
        let epoch = self.session.epoch();
        let seen = self.seen_epoch.swap(epoch, Ordering::AcqRel);
        if seen != epoch {
            info!(epoch, "Session identity changed, dropping user-scoped cache entries");
            self.purge_user_scoped();
        }
    }

    fn purge_user_scoped(&self) {
        let mut reset = 0_usize;
        {
            let active = self.lock_active();
            for cell in active.values() {
                let mut meta = cell.meta();
                if cell.is_user_scoped(&meta) {
                    cell.reset(&mut meta);
                    reset += 1;
                }
            }
        }

        let mut dropped = 0_usize;
        if let Some(retained) = &self.retained {
            let keys: Vec<_> = retained
                .iter()
                .filter(|(_, cell)| {
                    let meta = cell.meta();
                    cell.is_user_scoped(&meta)
                })
                .map(|(key, _)| key)
                .collect();
            dropped = keys.len();
            for key in keys {
                retained.invalidate(key.as_ref());
            }
        }

        debug!(reset, dropped, "Purged user-scoped cache entries");
    }

    fn spawn_fetch(self: &Arc<Self>, cell: Arc<EntryCell>, generation: u64) {
        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(self);
                handle.spawn(async move {
                    let result = match &cell.fetcher.request {
                        Ok(spec) => inner
                            .execute(spec)
                            .await
                            .and_then(cell.fetcher.normalize),
                        Err(err) => Err(err.clone()),
                    };
                    inner.apply(&cell, generation, result);
                });
            }
            Err(_) => {
                warn!(key = %cell.key, "No async runtime, cannot fetch");
                self.apply(
                    &cell,
                    generation,
                    Err(ApiError::network("no async runtime available")),
                );
            }
        }
    }

    /// Store the outcome of request `generation` for `cell`.
    fn apply(&self, cell: &EntryCell, generation: u64, result: Result<AnyOutput, ApiError>) {
        // A logout since dispatch must orphan this response before it lands.
        self.sync_epoch();

        let mut meta = cell.meta();
        if meta.issued != generation {
            let reset_by_logout = meta.in_flight.is_none()
                && cell.state.borrow().status == QueryStatus::Uninitialized;
            if let Err(err) = &result {
                if err.is_auth_failure() && reset_by_logout {
                    // The failed refresh that reset this entry is surfaced
                    // so the subscriber can send the user to login.
                    cell.state.send_modify(|s| {
                        s.error = Some(err.clone());
                        s.status = QueryStatus::Rejected;
                    });
                    return;
                }
            }

            warn!(
                key = %cell.key,
                generation,
                latest = meta.issued,
                "Discarding out-of-date response"
            );
            return;
        }

        meta.in_flight = None;
        match result {
            Ok(data) => {
                meta.tags = (cell.fetcher.provides)(Some(&data));
                meta.fetched_at = Some(Instant::now());
                cell.state.send_modify(|s| {
                    s.data = Some(data);
                    s.error = None;
                    s.status = QueryStatus::Fulfilled;
                    s.is_fetching = false;
                    s.is_stale = false;
                    s.fulfilled_at = Some(Utc::now());
                });
                debug!(key = %cell.key, generation, "Cached response");
            }
            Err(err) => {
                capture_api_error(cell.key.endpoint(), &err);
                cell.state.send_modify(|s| {
                    s.error = Some(err);
                    s.status = QueryStatus::Rejected;
                    s.is_fetching = false;
                });
            }
        }
    }

    /// Send `spec` with the current credentials, running the refresh flow on
    /// a 401. Returns the success body.
    async fn execute(&self, spec: &RequestSpec) -> Result<Value, ApiError> {
        let credentials = self.session.credentials();
        let authorized = self.session.is_authenticated();
        let response = self.send(spec, credentials.bearer.clone()).await?;

        if response.status == 401 && spec.reauth && authorized {
            return self.recover_unauthorized(spec, &credentials, response).await;
        }

        into_result(response)
    }

    /// Refresh once and replay `spec`, as long as the identity that sent it
    /// is still signed in. A request is never replayed under another user.
    async fn recover_unauthorized(
        &self,
        spec: &RequestSpec,
        sent: &Credentials,
        rejected: ApiResponse,
    ) -> Result<Value, ApiError> {
        {
            let _guard = self.refresh_lock.lock().await;

            let current = self.session.credentials();
            if current.epoch != sent.epoch {
                debug!(path = %spec.path, "Identity changed since dispatch, not replaying");
                return into_result(rejected);
            }

            if current.version == sent.version {
                if let Err(err) = self.refresh_tokens(sent.epoch).await {
                    if self.session.logout_at(sent.epoch) {
                        warn!(path = %spec.path, error = %err, "Token refresh failed, logging out");
                    }
                    self.sync_epoch();
                    return into_result(rejected);
                }
            } else {
                debug!(path = %spec.path, "Token already replaced, replaying");
            }
        }

        // Replayed once; a second 401 is surfaced as is.
        let credentials = self.session.credentials();
        if credentials.epoch != sent.epoch || !self.session.is_authenticated() {
            return into_result(rejected);
        }
        let response = self.send(spec, credentials.bearer).await?;
        into_result(response)
    }

    async fn refresh_tokens(&self, epoch: u64) -> Result<(), ApiError> {
        let Some(refresh_token) = self.session.refresh_token() else {
            return Err(ApiError::http(
                401,
                serde_json::json!({"message": "no refresh token"}),
            ));
        };

        let spec = RefreshTokens::request(&refresh_token)?;
        let response = self.send(&spec, None).await?;
        let pair = into_result(response).and_then(RefreshTokens::normalize)?;

        if self
            .session
            .refresh_at(epoch, pair.access_token, pair.refresh_token)
        {
            Ok(())
        } else {
            Err(ApiError::http(
                401,
                serde_json::json!({"message": "signed out during refresh"}),
            ))
        }
    }

    async fn send(
        &self,
        spec: &RequestSpec,
        bearer: Option<SecretString>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest {
            method: spec.method.clone(),
            path: spec.path.clone(),
            query: spec.query.clone(),
            body: spec.body.clone(),
            bearer,
            request_id: Uuid::new_v4(),
        };

        self.transport
            .send(request)
            .await
            .map_err(|e| ApiError::network(e.to_string()))
    }
}

fn into_result(response: ApiResponse) -> Result<Value, ApiError> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(ApiError::http(response.status, response.body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
