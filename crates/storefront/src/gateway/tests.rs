use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use emporium_core::{Email, UserId, UserRole, UserSummary};
use futures::FutureExt;
use futures::future::BoxFuture;
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::sync::oneshot;

use super::*;
use crate::storage::DurableStore;

// =============================================================================
// Fixtures
// =============================================================================

enum Reply {
    Now(ApiResponse),
    Gated(oneshot::Receiver<ApiResponse>),
    Fail(String),
}

/// Transport answering from per-route queues of scripted replies.
///
/// Routes are `"METHOD path"`. An unscripted request gets a 404.
#[derive(Default)]
struct Scripted {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<ApiRequest>>,
}

impl Scripted {
    fn push(&self, route: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(reply);
    }

    fn reply(&self, route: &str, status: u16, body: Value) {
        self.push(route, Reply::Now(ApiResponse::new(status, body)));
    }

    fn gate(&self, route: &str) -> oneshot::Sender<ApiResponse> {
        let (tx, rx) = oneshot::channel();
        self.push(route, Reply::Gated(rx));
        tx
    }

    fn fail(&self, route: &str, message: &str) {
        self.push(route, Reply::Fail(message.to_string()));
    }

    fn count(&self, route: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| format!("{} {}", r.method, r.path) == route)
            .count()
    }

    fn bearers(&self, route: &str) -> Vec<Option<String>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| format!("{} {}", r.method, r.path) == route)
            .map(|r| r.bearer.as_ref().map(|b| b.expose_secret().to_string()))
            .collect()
    }
}

impl Transport for Scripted {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
        let route = format!("{} {}", request.method, request.path);
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&route)
            .and_then(VecDeque::pop_front);
        self.log.lock().unwrap().push(request);

        async move {
            match reply {
                None => Ok(ApiResponse::new(404, json!({"message": "not scripted"}))),
                Some(Reply::Now(response)) => Ok(response),
                Some(Reply::Gated(rx)) => rx
                    .await
                    .map_err(|_| TransportError::Connection("gate dropped".to_string())),
                Some(Reply::Fail(message)) => Err(TransportError::Connection(message)),
            }
        }
        .boxed()
    }
}

/// Public catalog data.
struct Widget;

impl Endpoint for Widget {
    const NAME: &'static str = "widget";
    type Args = u32;
    type Output = Value;

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get(format!("widgets/{id}")))
    }

    fn provides(id: &Self::Args, _output: Option<&Self::Output>) -> Vec<Tag> {
        vec![Tag::id(TagKind::Product, id)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        Ok(body)
    }
}

/// Data of the signed-in user.
struct MyOrders;

impl Endpoint for MyOrders {
    const NAME: &'static str = "myOrders";
    const USER_SCOPED: bool = true;
    type Args = ();
    type Output = Value;

    fn request((): &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("orders"))
    }

    fn provides((): &Self::Args, _output: Option<&Self::Output>) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Order)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        Ok(body)
    }
}

/// Second user-scoped query, tagged only through its provided tags.
struct MyAddresses;

impl Endpoint for MyAddresses {
    const NAME: &'static str = "myAddresses";
    type Args = ();
    type Output = Value;

    fn request((): &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("addresses"))
    }

    fn provides((): &Self::Args, _output: Option<&Self::Output>) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Address)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        Ok(body)
    }
}

struct TouchWidget;

impl Mutation for TouchWidget {
    const NAME: &'static str = "touchWidget";
    type Args = u32;
    type Output = ();

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::post(format!("widgets/{id}/touch")))
    }

    fn invalidates(id: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        vec![Tag::id(TagKind::Product, id)]
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}

fn options(retention: Duration) -> GatewayOptions {
    GatewayOptions {
        retention,
        stale_after: Duration::from_secs(300),
        capacity: 100,
    }
}

fn gateway(transport: &Arc<Scripted>) -> QueryGateway {
    gateway_with(transport, options(Duration::from_secs(60)))
}

fn gateway_with(transport: &Arc<Scripted>, options: GatewayOptions) -> QueryGateway {
    let session = SessionStore::load(DurableStore::in_memory());
    QueryGateway::new(Arc::clone(transport) as Arc<dyn Transport>, session, options)
}

fn ada() -> UserSummary {
    UserSummary {
        id: UserId::new(1),
        name: "Ada".to_string(),
        email: Email::parse("ada@example.com").unwrap(),
        role: UserRole::Customer,
        phone: None,
        avatar_url: None,
    }
}

fn bob() -> UserSummary {
    UserSummary {
        id: UserId::new(2),
        name: "Bob".to_string(),
        email: Email::parse("bob@example.com").unwrap(),
        ..ada()
    }
}

fn sign_in(gateway: &QueryGateway) {
    gateway.session().login(
        ada(),
        Some(SecretString::from("a1")),
        Some(SecretString::from("r1")),
    );
}

/// Let spawned fetch tasks run on the current-thread test runtime.
async fn run_pending() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Caching and deduplication
// =============================================================================

#[tokio::test]
async fn test_subscribers_share_one_request() {
    let transport = Arc::new(Scripted::default());
    let gate = transport.gate("GET widgets/1");
    let gateway = gateway(&transport);

    let mut a = gateway.query::<Widget>(1);
    let mut b = gateway.query::<Widget>(1);
    assert!(a.state().is_loading);
    assert_eq!(gateway.subscriber_count(a.key()), 2);

    gate.send(ApiResponse::new(200, json!({"name": "gear"})))
        .unwrap();
    let a_state = a.settled().await;
    let b_state = b.settled().await;

    assert_eq!(transport.count("GET widgets/1"), 1);
    assert_eq!(a_state.status, QueryStatus::Fulfilled);
    assert_eq!(a_state.data.unwrap()["name"], "gear");
    assert!(b_state.is_fresh());
}

#[tokio::test]
async fn test_fresh_entry_served_from_cache() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    let gateway = gateway(&transport);

    let first = gateway.fetch::<Widget>(1).await.unwrap();
    let second = gateway.fetch::<Widget>(1).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(transport.count("GET widgets/1"), 1);
}

#[tokio::test]
async fn test_old_entry_refetched_in_background() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    transport.reply("GET widgets/1", 200, json!({"v": 2}));
    let gateway = gateway_with(
        &transport,
        GatewayOptions {
            stale_after: Duration::ZERO,
            ..options(Duration::from_secs(60))
        },
    );

    let mut first = gateway.query::<Widget>(1);
    first.settled().await;

    let mut second = gateway.query::<Widget>(1);
    let state = second.state();
    assert!(state.is_fetching);
    assert!(!state.is_loading);
    assert_eq!(state.data.unwrap()["v"], 1);

    assert_eq!(second.settled().await.data.unwrap()["v"], 2);
}

#[tokio::test]
async fn test_out_of_date_response_discarded() {
    let transport = Arc::new(Scripted::default());
    let first = transport.gate("GET widgets/1");
    let second = transport.gate("GET widgets/1");
    let gateway = gateway(&transport);

    let mut sub = gateway.query::<Widget>(1);
    run_pending().await;
    sub.refetch();
    run_pending().await;
    assert_eq!(transport.count("GET widgets/1"), 2);

    second
        .send(ApiResponse::new(200, json!({"v": "new"})))
        .unwrap();
    assert_eq!(sub.settled().await.data.unwrap()["v"], "new");

    first
        .send(ApiResponse::new(200, json!({"v": "old"})))
        .unwrap();
    run_pending().await;

    assert_eq!(sub.state().data.unwrap()["v"], "new");
}

#[tokio::test]
async fn test_errors_observed_on_subscription() {
    let transport = Arc::new(Scripted::default());
    transport.fail("GET widgets/1", "connection reset");
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    let gateway = gateway(&transport);

    let mut first = gateway.query::<Widget>(1);
    let state = first.settled().await;
    assert_eq!(state.status, QueryStatus::Rejected);
    assert_eq!(state.error.unwrap().status, ApiStatus::Network);

    // A new subscriber retries a failed entry.
    let mut second = gateway.query::<Widget>(1);
    assert_eq!(second.settled().await.status, QueryStatus::Fulfilled);
    assert_eq!(first.state().data.unwrap()["v"], 1);
}

#[tokio::test]
async fn test_fetch_surfaces_http_error() {
    let transport = Arc::new(Scripted::default());
    let gateway = gateway(&transport);

    let err = gateway.fetch::<Widget>(9).await.unwrap_err();
    assert_eq!(err.status_code(), Some(404));
}

#[test]
fn test_without_runtime_query_fails_with_network_error() {
    let transport = Arc::new(Scripted::default());
    let gateway = gateway(&transport);

    let sub = gateway.query::<Widget>(1);
    let state = sub.state();
    assert_eq!(state.status, QueryStatus::Rejected);
    assert_eq!(state.error.unwrap().status, ApiStatus::Network);
    assert_eq!(transport.count("GET widgets/1"), 0);
}

#[tokio::test]
async fn test_peek_does_not_subscribe() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    let gateway = gateway(&transport);

    assert!(gateway.peek::<Widget>(&1).is_none());

    let mut sub = gateway.query::<Widget>(1);
    sub.settled().await;
    let key = sub.key().clone();

    let peeked = gateway.peek::<Widget>(&1).unwrap();
    assert_eq!(peeked.data.unwrap()["v"], 1);
    assert_eq!(gateway.subscriber_count(&key), 1);

    drop(sub);
    assert_eq!(gateway.subscriber_count(&key), 0);
}

// =============================================================================
// Retention
// =============================================================================

#[tokio::test]
async fn test_retained_entry_revived_then_expires() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    transport.reply("GET widgets/1", 200, json!({"v": 2}));
    let gateway = gateway_with(&transport, options(Duration::from_millis(50)));

    let mut sub = gateway.query::<Widget>(1);
    sub.settled().await;
    let key = sub.key().clone();
    drop(sub);
    assert!(gateway.contains(&key));

    let revived = gateway.query::<Widget>(1);
    assert_eq!(revived.state().data.unwrap()["v"], 1);
    assert!(!revived.state().is_fetching);
    assert_eq!(transport.count("GET widgets/1"), 1);
    drop(revived);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!gateway.contains(&key));

    let mut fresh = gateway.query::<Widget>(1);
    assert!(fresh.state().is_loading);
    assert_eq!(fresh.settled().await.data.unwrap()["v"], 2);
}

#[tokio::test]
async fn test_zero_retention_evicts_immediately() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    let gateway = gateway_with(&transport, options(Duration::ZERO));

    let mut sub = gateway.query::<Widget>(1);
    sub.settled().await;
    let key = sub.key().clone();
    drop(sub);

    assert!(!gateway.contains(&key));
}

#[tokio::test]
async fn test_prefetch_warms_retention() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/3", 200, json!({"v": 3}));
    let gateway = gateway(&transport);

    gateway.prefetch::<Widget>(3);
    run_pending().await;

    let sub = gateway.query::<Widget>(3);
    assert_eq!(sub.state().data.unwrap()["v"], 3);
    assert_eq!(transport.count("GET widgets/3"), 1);
}

// =============================================================================
// Invalidation
// =============================================================================

#[tokio::test]
async fn test_mutation_refetches_subscribed_entry() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    transport.reply("POST widgets/1/touch", 204, Value::Null);
    transport.reply("GET widgets/1", 200, json!({"v": 2}));
    transport.reply("GET widgets/2", 200, json!({"v": 1}));
    let gateway = gateway(&transport);

    let mut one = gateway.query::<Widget>(1);
    let mut two = gateway.query::<Widget>(2);
    one.settled().await;
    two.settled().await;

    gateway.mutate::<TouchWidget>(1).await.unwrap();

    let state = one.state();
    assert!(state.is_stale);
    assert!(state.is_fetching);
    assert_eq!(state.data.unwrap()["v"], 1);

    let state = one.settled().await;
    assert!(!state.is_stale);
    assert_eq!(state.data.unwrap()["v"], 2);

    // Widget 2 was not hit.
    assert!(two.state().is_fresh());
    assert_eq!(transport.count("GET widgets/2"), 1);
}

#[tokio::test]
async fn test_invalidation_drops_unsubscribed_entries() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    let gateway = gateway(&transport);

    let mut sub = gateway.query::<Widget>(1);
    sub.settled().await;
    let key = sub.key().clone();
    drop(sub);
    assert!(gateway.contains(&key));

    gateway.invalidate_tags(&[Tag::kind(TagKind::Product)]);

    assert!(!gateway.contains(&key));
    assert_eq!(transport.count("GET widgets/1"), 1);
}

#[tokio::test]
async fn test_failed_mutation_invalidates_nothing() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    transport.reply("POST widgets/1/touch", 500, json!({"message": "boom"}));
    let gateway = gateway(&transport);

    let mut sub = gateway.query::<Widget>(1);
    sub.settled().await;

    let err = gateway.mutate::<TouchWidget>(1).await.unwrap_err();
    assert!(err.is_server_error());
    assert!(sub.state().is_fresh());
}

// =============================================================================
// Session and authorization
// =============================================================================

#[tokio::test]
async fn test_logout_clears_user_scoped_entries() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET orders", 200, json!([1, 2]));
    transport.reply("GET addresses", 200, json!([]));
    transport.reply("GET widgets/1", 200, json!({"v": 1}));
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let mut orders = gateway.query::<MyOrders>(());
    let mut widget = gateway.query::<Widget>(1);
    orders.settled().await;
    widget.settled().await;

    let mut addresses = gateway.query::<MyAddresses>(());
    addresses.settled().await;
    let addresses_key = addresses.key().clone();
    drop(addresses);
    assert!(gateway.contains(&addresses_key));

    gateway.session().logout();

    let state = orders.state();
    assert!(state.data.is_none());
    assert!(!state.is_stale);
    assert_eq!(state.status, QueryStatus::Uninitialized);
    assert!(!gateway.contains(&addresses_key));
    assert!(widget.state().is_fresh());
}

#[tokio::test]
async fn test_response_in_flight_at_logout_discarded() {
    let transport = Arc::new(Scripted::default());
    let gate = transport.gate("GET orders");
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let orders = gateway.query::<MyOrders>(());
    run_pending().await;
    gateway.session().logout();

    gate.send(ApiResponse::new(200, json!(["private"])))
        .unwrap();
    run_pending().await;

    assert!(orders.state().data.is_none());
}

#[tokio::test]
async fn test_token_captured_at_dispatch() {
    let transport = Arc::new(Scripted::default());
    let gate = transport.gate("GET orders");
    transport.reply("GET orders", 200, json!([]));
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let mut orders = gateway.query::<MyOrders>(());
    run_pending().await;
    gateway.session().refresh(SecretString::from("a2"), None);
    gate.send(ApiResponse::new(200, json!([]))).unwrap();
    orders.settled().await;

    orders.refetch();
    orders.settled().await;

    assert_eq!(
        transport.bearers("GET orders"),
        vec![Some("a1".to_string()), Some("a2".to_string())]
    );
}

#[tokio::test]
async fn test_unauthorized_refreshes_and_replays_once() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET orders", 401, json!({"message": "expired"}));
    transport.reply(
        "POST auth/refresh",
        200,
        json!({"data": {"access_token": "a2", "refresh_token": "r2"}}),
    );
    transport.reply("GET orders", 200, json!([7]));
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let mut orders = gateway.query::<MyOrders>(());
    let state = orders.settled().await;

    assert_eq!(state.data.unwrap()[0], 7);
    assert_eq!(
        transport.bearers("GET orders"),
        vec![Some("a1".to_string()), Some("a2".to_string())]
    );
    assert_eq!(transport.bearers("POST auth/refresh"), vec![None]);
    let session = gateway.session();
    assert_eq!(session.access_token().unwrap().expose_secret(), "a2");
    assert_eq!(session.refresh_token().unwrap().expose_secret(), "r2");
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn test_second_unauthorized_is_surfaced() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET orders", 401, Value::Null);
    transport.reply("POST auth/refresh", 200, json!({"accessToken": "a2"}));
    transport.reply("GET orders", 401, Value::Null);
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let mut orders = gateway.query::<MyOrders>(());
    let state = orders.settled().await;

    assert!(state.error.unwrap().is_auth_failure());
    assert_eq!(transport.count("GET orders"), 2);
    assert_eq!(transport.count("POST auth/refresh"), 1);
    assert!(gateway.session().is_authenticated());
}

#[tokio::test]
async fn test_failed_refresh_logs_out() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET orders", 401, Value::Null);
    transport.reply("POST auth/refresh", 401, json!({"message": "revoked"}));
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let mut orders = gateway.query::<MyOrders>(());
    let state = orders.settled().await;

    assert_eq!(state.status, QueryStatus::Rejected);
    assert!(state.error.unwrap().is_auth_failure());
    assert!(state.data.is_none());
    assert!(!gateway.session().is_authenticated());
    assert_eq!(transport.count("GET orders"), 1);
}

#[tokio::test]
async fn test_concurrent_unauthorized_share_one_refresh() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET orders", 401, Value::Null);
    transport.reply("GET addresses", 401, Value::Null);
    let refresh = transport.gate("POST auth/refresh");
    transport.reply("GET orders", 200, json!(["o"]));
    transport.reply("GET addresses", 200, json!(["a"]));
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let mut orders = gateway.query::<MyOrders>(());
    let mut addresses = gateway.query::<MyAddresses>(());
    run_pending().await;

    refresh
        .send(ApiResponse::new(200, json!({"accessToken": "a2"})))
        .unwrap();
    let orders = orders.settled().await;
    let addresses = addresses.settled().await;

    assert_eq!(orders.data.unwrap()[0], "o");
    assert_eq!(addresses.data.unwrap()[0], "a");
    assert_eq!(transport.count("POST auth/refresh"), 1);
    assert_eq!(
        transport.bearers("GET addresses"),
        vec![Some("a1".to_string()), Some("a2".to_string())]
    );
}

/// Sign Ada out and Bob in, as happens when the user switches accounts.
fn switch_to_bob(gateway: &QueryGateway) {
    let session = gateway.session();
    session.logout();
    session.login(
        bob(),
        Some(SecretString::from("b1")),
        Some(SecretString::from("rb1")),
    );
}

#[tokio::test]
async fn test_unauthorized_after_account_switch_is_not_replayed() {
    let transport = Arc::new(Scripted::default());
    let gate = transport.gate("POST widgets/1/touch");
    transport.reply("POST widgets/1/touch", 204, Value::Null);
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let pending = tokio::spawn({
        let gateway = gateway.clone();
        async move { gateway.mutate::<TouchWidget>(1).await }
    });
    run_pending().await;
    switch_to_bob(&gateway);
    gate.send(ApiResponse::new(401, Value::Null)).unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_auth_failure());
    assert_eq!(
        transport.bearers("POST widgets/1/touch"),
        vec![Some("a1".to_string())]
    );
    assert_eq!(transport.count("POST auth/refresh"), 0);
    let session = gateway.session();
    assert_eq!(session.user().unwrap().id, UserId::new(2));
    assert_eq!(session.access_token().unwrap().expose_secret(), "b1");
}

#[tokio::test]
async fn test_refresh_finishing_after_account_switch_is_dropped() {
    let transport = Arc::new(Scripted::default());
    transport.reply("POST widgets/1/touch", 401, Value::Null);
    let refresh = transport.gate("POST auth/refresh");
    transport.reply("POST widgets/1/touch", 204, Value::Null);
    let gateway = gateway(&transport);
    sign_in(&gateway);

    let pending = tokio::spawn({
        let gateway = gateway.clone();
        async move { gateway.mutate::<TouchWidget>(1).await }
    });
    run_pending().await;
    switch_to_bob(&gateway);
    refresh
        .send(ApiResponse::new(200, json!({"accessToken": "a2"})))
        .unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert!(err.is_auth_failure());
    assert_eq!(transport.count("POST widgets/1/touch"), 1);
    let session = gateway.session();
    assert!(session.is_authenticated());
    assert_eq!(session.access_token().unwrap().expose_secret(), "b1");
    assert_eq!(session.refresh_token().unwrap().expose_secret(), "rb1");
}

#[tokio::test]
async fn test_signed_out_unauthorized_does_not_refresh() {
    let transport = Arc::new(Scripted::default());
    transport.reply("GET orders", 401, Value::Null);
    let gateway = gateway(&transport);

    let err = gateway.fetch::<MyOrders>(()).await.unwrap_err();

    assert!(err.is_auth_failure());
    assert_eq!(transport.count("POST auth/refresh"), 0);
}
