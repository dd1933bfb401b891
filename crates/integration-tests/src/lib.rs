//! Integration tests for Emporium.
//!
//! The scenarios in `tests/` drive a real [`Storefront`] against
//! [`MockApi`], an in-process stand-in for the remote API that keeps just
//! enough state (catalog, accounts, tokens, orders) to answer the endpoints
//! the storefront calls.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p emporium-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use emporium_storefront::gateway::{ApiRequest, ApiResponse, Transport, TransportError};
use emporium_storefront::{DurableStore, Storefront, StorefrontConfig};
use futures::FutureExt;
use futures::future::BoxFuture;
use emporium_core::Email;
use emporium_storefront::api::auth::LoginCredentials;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;

/// Password accepted for every seeded account.
pub const PASSWORD: &str = "correct horse";

/// A catalog product as the mock serves it.
#[derive(Debug, Clone)]
pub struct MockProduct {
    pub id: i64,
    pub title: String,
    /// Price in cents.
    pub cents: i64,
    pub category: String,
    pub rating: f64,
    pub stock: u32,
}

#[derive(Debug, Clone)]
struct Account {
    id: i64,
    name: String,
    email: String,
}

#[derive(Default)]
struct MockState {
    products: Vec<MockProduct>,
    accounts: Vec<Account>,
    /// Access token -> account ID.
    access: HashMap<String, i64>,
    /// Refresh token -> account ID.
    refresh: HashMap<String, i64>,
    /// (owner, order JSON)
    orders: Vec<(i64, Value)>,
    next_token: u32,
    down: bool,
}

/// In-process fake of the remote API.
///
/// Every request is logged as `"METHOD path"`.
#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
    log: Mutex<Vec<String>>,
}

impl MockApi {
    /// A catalog of six products over two categories and one customer,
    /// `ada@example.com`.
    #[must_use]
    pub fn seeded() -> Arc<Self> {
        let api = Self::default();
        {
            let mut state = api.state();
            let product = |id, title: &str, cents, category: &str, rating, stock| MockProduct {
                id,
                title: title.to_string(),
                cents,
                category: category.to_string(),
                rating,
                stock,
            };
            state.products = vec![
                product(1, "Enamel Mug", 1250, "kitchen", 4.6, 40),
                product(2, "Chef Knife", 8900, "kitchen", 4.8, 5),
                product(3, "Cutting Board", 3200, "kitchen", 3.9, 12),
                product(4, "Trail Runner", 12000, "shoes", 4.2, 8),
                product(5, "Canvas Sneaker", 5500, "shoes", 3.1, 0),
                product(6, "Wool Slipper", 4000, "shoes", 2.4, 20),
            ];
            state.accounts = vec![Account {
                id: 7,
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
            }];
        }
        Arc::new(api)
    }

    /// Invalidate every issued access token, as if they all expired.
    pub fn expire_access_tokens(&self) {
        self.state().access.clear();
    }

    /// Invalidate every issued refresh token.
    pub fn revoke_refresh_tokens(&self) {
        self.state().refresh.clear();
    }

    /// Answer every request with a 503 until called again with `false`.
    pub fn set_down(&self, down: bool) {
        self.state().down = down;
    }

    /// Current stock of a product.
    #[must_use]
    pub fn stock(&self, product_id: i64) -> Option<u32> {
        self.state()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .map(|p| p.stock)
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// How many times `route` (`"METHOD path"`) was requested.
    #[must_use]
    pub fn count(&self, route: &str) -> usize {
        self.requests().iter().filter(|r| *r == route).count()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let mut state = self.state();
        if state.down {
            return ApiResponse::new(503, json!({"message": "maintenance"}));
        }

        let caller = request
            .bearer
            .as_ref()
            .and_then(|token| state.access.get(token.expose_secret()).copied());
        let query: HashMap<&str, &str> = request
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        let body = request.body.clone().unwrap_or(Value::Null);
        let segments: Vec<&str> = request.path.split('/').collect();

        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["products"]) => list_products(&state, &query),
            ("GET", ["products", id]) => id
                .parse::<i64>()
                .ok()
                .and_then(|id| state.products.iter().find(|p| p.id == id))
                .map_or_else(not_found, |p| ok(json!({"data": product_json(p)}))),
            ("GET", ["categories"]) => ok(json!({"data": [
                {"id": 1, "name": "Kitchen", "slug": "kitchen", "productCount": 3},
                {"id": 2, "name": "Shoes", "slug": "shoes", "product_count": 3}
            ]})),
            ("POST", ["auth", "login"]) => login(&mut state, &body),
            ("POST", ["auth", "refresh"]) => refresh(&mut state, &body),
            ("POST", ["auth", "logout"]) => {
                if let Some(token) = body.get("refreshToken").and_then(Value::as_str) {
                    state.refresh.remove(token);
                }
                ApiResponse::new(204, Value::Null)
            }
            (_, ["auth", "profile"] | ["orders", ..]) if caller.is_none() => unauthorized(),
            ("GET", ["auth", "profile"]) => {
                let account = caller.and_then(|id| state.accounts.iter().find(|a| a.id == id));
                account.map_or_else(unauthorized, |a| ok(json!({"data": account_json(a)})))
            }
            ("GET", ["orders"]) => {
                let owner = caller.unwrap_or_default();
                let orders: Vec<Value> = state
                    .orders
                    .iter()
                    .rev()
                    .filter(|(o, _)| *o == owner)
                    .map(|(_, order)| order.clone())
                    .collect();
                ok(json!({"data": orders, "pagination": {
                    "page": 1, "limit": 10, "total": orders.len(), "totalPages": 1
                }}))
            }
            ("POST", ["orders"]) => create_order(&mut state, caller.unwrap_or_default(), &body),
            _ => not_found(),
        }
    }
}

impl Transport for MockApi {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(format!("{} {}", request.method, request.path));
        let response = self.handle(&request);

        async move {
            // Let other tasks run between dispatch and response, like a network.
            tokio::task::yield_now().await;
            Ok(response)
        }
        .boxed()
    }
}

/// A storefront over `api` with in-memory persistence.
#[must_use]
pub fn storefront(api: &Arc<MockApi>) -> Storefront {
    storefront_with_store(api, DurableStore::in_memory())
}

/// A storefront over `api` persisting to `store`.
#[must_use]
pub fn storefront_with_store(api: &Arc<MockApi>, store: DurableStore) -> Storefront {
    storefront_with(api, config(), store)
}

/// A storefront over `api` with explicit configuration.
#[must_use]
pub fn storefront_with(
    api: &Arc<MockApi>,
    config: StorefrontConfig,
    store: DurableStore,
) -> Storefront {
    Storefront::init(config, store, Arc::clone(api) as Arc<dyn Transport>)
}

/// Default configuration pointing at a placeholder base URL.
#[must_use]
pub fn config() -> StorefrontConfig {
    let base_url = Url::parse("http://emporium.test/api").expect("static URL parses");
    StorefrontConfig::new(base_url)
}

/// Credentials of the seeded customer.
#[must_use]
pub fn ada() -> LoginCredentials {
    LoginCredentials {
        email: Email::parse("ada@example.com").expect("static email parses"),
        password: SecretString::from(PASSWORD),
    }
}

// ============================================================================
// Route handlers
// ============================================================================

fn ok(body: Value) -> ApiResponse {
    ApiResponse::new(200, body)
}

fn not_found() -> ApiResponse {
    ApiResponse::new(404, json!({"message": "not found"}))
}

fn unauthorized() -> ApiResponse {
    ApiResponse::new(401, json!({"message": "token expired"}))
}

fn price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

fn product_json(p: &MockProduct) -> Value {
    // snake_case on purpose: the storefront accepts both spellings.
    json!({
        "id": p.id.to_string(),
        "title": p.title,
        "price": price(p.cents),
        "category": p.category,
        "rating": p.rating,
        "review_count": 10,
        "stock": p.stock,
        "image_url": format!("/img/{}.jpg", p.id),
    })
}

fn account_json(a: &Account) -> Value {
    json!({"id": a.id, "name": a.name, "email": a.email, "role": "customer"})
}

#[allow(clippy::cast_possible_truncation)]
fn list_products(state: &MockState, query: &HashMap<&str, &str>) -> ApiResponse {
    let cents = |key: &str| {
        query
            .get(key)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| (v * 100.0).round() as i64)
    };
    let min = cents("minPrice");
    let max = cents("maxPrice");
    let min_rating = query.get("minRating").and_then(|v| v.parse::<f64>().ok());
    let search = query.get("search").map(|s| s.to_lowercase());
    let page: usize = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let limit: usize = query.get("limit").and_then(|v| v.parse().ok()).unwrap_or(12);

    let mut matching: Vec<&MockProduct> = state
        .products
        .iter()
        .filter(|p| query.get("category").is_none_or(|c| p.category == *c))
        .filter(|p| min.is_none_or(|m| p.cents >= m))
        .filter(|p| max.is_none_or(|m| p.cents <= m))
        .filter(|p| min_rating.is_none_or(|r| p.rating >= r))
        .filter(|p| {
            search
                .as_ref()
                .is_none_or(|s| p.title.to_lowercase().contains(s))
        })
        .collect();

    match query.get("sort").copied() {
        Some("priceAsc") => matching.sort_by_key(|p| p.cents),
        Some("priceDesc") => matching.sort_by_key(|p| std::cmp::Reverse(p.cents)),
        Some("ratingDesc") => matching.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        Some("newest") => matching.sort_by_key(|p| std::cmp::Reverse(p.id)),
        _ => {}
    }

    let total = matching.len();
    let items: Vec<Value> = matching
        .into_iter()
        .skip((page.max(1) - 1) * limit)
        .take(limit)
        .map(product_json)
        .collect();

    ok(json!({
        "data": items,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "totalPages": total.div_ceil(limit.max(1)).max(1),
        }
    }))
}

fn issue_tokens(state: &mut MockState, account_id: i64) -> (String, String) {
    state.next_token += 1;
    let access = format!("access-{}", state.next_token);
    let refresh = format!("refresh-{}", state.next_token);
    state.access.insert(access.clone(), account_id);
    state.refresh.insert(refresh.clone(), account_id);
    (access, refresh)
}

fn login(state: &mut MockState, body: &Value) -> ApiResponse {
    let email = body.get("email").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    let Some(account) = state
        .accounts
        .iter()
        .find(|a| Some(a.email.as_str()) == email)
        .cloned()
    else {
        return ApiResponse::new(401, json!({"message": "unknown account"}));
    };
    if password != Some(PASSWORD) {
        return ApiResponse::new(401, json!({"message": "wrong password"}));
    }

    let (access, refresh) = issue_tokens(state, account.id);
    ok(json!({"data": {
        "user": account_json(&account),
        "access_token": access,
        "refresh_token": refresh,
    }}))
}

fn refresh(state: &mut MockState, body: &Value) -> ApiResponse {
    let token = body.get("refreshToken").and_then(Value::as_str).unwrap_or_default();
    let Some(account_id) = state.refresh.remove(token) else {
        return ApiResponse::new(401, json!({"message": "refresh token revoked"}));
    };

    let (access, refresh) = issue_tokens(state, account_id);
    ok(json!({"data": {"accessToken": access, "refreshToken": refresh}}))
}

fn create_order(state: &mut MockState, owner: i64, body: &Value) -> ApiResponse {
    let requested = body.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
    if requested.is_empty() {
        return ApiResponse::new(422, json!({"message": "order has no items"}));
    }

    let mut items = Vec::new();
    let mut subtotal = 0_i64;
    for item in &requested {
        let id = item.get("productId").and_then(Value::as_i64).unwrap_or_default();
        let quantity = item
            .get("quantity")
            .and_then(Value::as_u64)
            .and_then(|q| u32::try_from(q).ok())
            .unwrap_or_default();
        let Some(product) = state.products.iter_mut().find(|p| p.id == id) else {
            return ApiResponse::new(422, json!({"message": format!("no product {id}")}));
        };
        if product.stock < quantity {
            let message = format!("{} is out of stock", product.title);
            return ApiResponse::new(422, json!({ "message": message }));
        }
        product.stock -= quantity;
        subtotal += product.cents * i64::from(quantity);
        items.push(json!({
            "productId": id,
            "title": product.title,
            "unitPrice": price(product.cents),
            "quantity": quantity,
        }));
    }

    let id = i64::try_from(state.orders.len()).unwrap_or_default() + 100;
    let order = json!({
        "id": id,
        "userId": owner,
        "status": "pending",
        "items": items,
        "subtotal": price(subtotal),
        "shipping": "0.00",
        "total": price(subtotal),
        "createdAt": "2026-03-01T12:00:00Z",
    });
    state.orders.push((owner, order.clone()));
    ApiResponse::new(201, json!({"data": order}))
}
