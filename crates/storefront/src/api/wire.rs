//! Raw payload shapes as the remote API sends them.
//!
//! Payloads are first passed through [`camelize`], so these structs only
//! spell field names in camelCase. Aliases cover the synonyms the API has
//! used for the same field (`name`/`title`, `zip`/`postalCode`, ...).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Rewrite every snake_case object key to camelCase, recursively.
///
/// Keys with a leading underscore (`_id`) are left alone.
pub(crate) fn camelize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (camel_key(key), camelize(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camelize).collect()),
        other => other,
    }
}

fn camel_key(key: String) -> String {
    if key.starts_with('_') || !key.contains('_') {
        return key;
    }

    let mut out = String::with_capacity(key.len());
    for (i, part) in key.split('_').filter(|p| !p.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(part);
            continue;
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_i64<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            Self::Number(n) => Ok(n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid id: {s:?}"))),
        }
    }
}

/// An id sent as a number or as a numeric string.
pub(crate) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    RawId::deserialize(deserializer)?.into_i64()
}

/// Optional form of [`id`].
pub(crate) fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Option::<RawId>::deserialize(deserializer)?
        .map(RawId::into_i64)
        .transpose()
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductWire {
    #[serde(deserialize_with = "id", alias = "_id")]
    pub id: i64,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default, alias = "compareAtPrice")]
    pub original_price: Option<Decimal>,
    #[serde(default, alias = "discount", alias = "discountPercentage")]
    pub discount_pct: Option<f64>,
    #[serde(default, alias = "image", alias = "thumbnail")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    #[serde(default, alias = "averageRating")]
    pub rating: Option<f64>,
    #[serde(default, alias = "numReviews", alias = "reviewsCount")]
    pub review_count: Option<u32>,
    #[serde(default, alias = "stockQuantity", alias = "inventory")]
    pub stock: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A product's category, sent either as a slug or as an embedded object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CategoryRef {
    Slug(String),
    Object {
        #[serde(default)]
        slug: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CategoryWire {
    #[serde(deserialize_with = "id", alias = "_id")]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
    #[serde(default, alias = "count", alias = "productsCount")]
    pub product_count: Option<u32>,
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserWire {
    #[serde(deserialize_with = "id", alias = "_id", alias = "userId")]
    pub id: i64,
    #[serde(alias = "fullName", alias = "username")]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "phoneNumber")]
    pub phone: Option<String>,
    #[serde(default, alias = "avatar")]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddressWire {
    #[serde(default, deserialize_with = "opt_id", alias = "_id")]
    pub id: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "name", alias = "recipientName")]
    pub full_name: Option<String>,
    #[serde(alias = "addressLine1", alias = "street")]
    pub line1: String,
    #[serde(default, alias = "addressLine2")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, alias = "province", alias = "region")]
    pub state: Option<String>,
    #[serde(alias = "zip", alias = "zipCode", alias = "postcode")]
    pub postal_code: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PaymentMethodWire {
    #[serde(deserialize_with = "id", alias = "_id")]
    pub id: i64,
    #[serde(alias = "cardBrand", alias = "type")]
    pub brand: String,
    #[serde(alias = "lastFour", alias = "last4Digits")]
    pub last4: String,
    #[serde(alias = "expiryMonth")]
    pub exp_month: u8,
    #[serde(alias = "expiryYear")]
    pub exp_year: u16,
    #[serde(default, alias = "cardholderName", alias = "nameOnCard")]
    pub holder_name: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderItemWire {
    #[serde(deserialize_with = "id")]
    pub product_id: i64,
    #[serde(alias = "name", alias = "productName")]
    pub title: String,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    #[serde(alias = "qty")]
    pub quantity: u32,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderWire {
    #[serde(deserialize_with = "id", alias = "_id", alias = "orderId")]
    pub id: i64,
    #[serde(default, deserialize_with = "opt_id")]
    pub user_id: Option<i64>,
    pub status: String,
    #[serde(default, alias = "orderItems", alias = "lineItems")]
    pub items: Vec<OrderItemWire>,
    #[serde(default)]
    pub subtotal: Option<Decimal>,
    #[serde(default, alias = "shippingCost", alias = "shippingFee")]
    pub shipping: Option<Decimal>,
    #[serde(default, alias = "totalAmount", alias = "totalPrice")]
    pub total: Option<Decimal>,
    #[serde(default)]
    pub shipping_address: Option<AddressWire>,
    #[serde(alias = "orderDate", alias = "date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MessageWire {
    #[serde(deserialize_with = "id", alias = "_id")]
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(alias = "message", alias = "content")]
    pub body: String,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct StatsWire {
    #[serde(alias = "revenue")]
    pub total_revenue: Decimal,
    #[serde(alias = "totalOrders", alias = "orders")]
    pub order_count: u64,
    pub pending_orders: u64,
    #[serde(alias = "totalCustomers", alias = "totalUsers", alias = "customers")]
    pub customer_count: u64,
    #[serde(alias = "totalProducts", alias = "products")]
    pub product_count: u64,
    #[serde(alias = "newMessages")]
    pub unread_messages: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct PaginationWire {
    #[serde(alias = "currentPage")]
    pub page: Option<u32>,
    #[serde(alias = "perPage", alias = "pageSize")]
    pub limit: Option<u32>,
    #[serde(alias = "totalItems", alias = "count")]
    pub total: Option<u64>,
    #[serde(alias = "pages")]
    pub total_pages: Option<u32>,
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthGrantWire {
    pub user: UserWire,
    #[serde(default, alias = "token")]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenPairWire {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_camelize_nested_keys() {
        let value = camelize(json!({
            "order_items": [{"unit_price": "1.00", "product_id": 3}],
            "shipping_address": {"postal_code": "12345", "address_line_1": "Main St"},
            "_id": "x",
            "total": 1
        }));

        assert_eq!(
            value,
            json!({
                "orderItems": [{"unitPrice": "1.00", "productId": 3}],
                "shippingAddress": {"postalCode": "12345", "addressLine1": "Main St"},
                "_id": "x",
                "total": 1
            })
        );
    }

    #[test]
    fn test_camel_key_edge_cases() {
        assert_eq!(camel_key("already_Camel".to_string()), "alreadyCamel");
        assert_eq!(camel_key("trailing_".to_string()), "trailing");
        assert_eq!(camel_key("plain".to_string()), "plain");
    }

    #[test]
    fn test_ids_accept_strings() {
        let product: ProductWire = serde_json::from_value(json!({
            "id": "42", "title": "Mug", "price": 9.5
        }))
        .unwrap();
        assert_eq!(product.id, 42);
        assert_eq!(product.price, Decimal::new(95, 1));

        let err = serde_json::from_value::<ProductWire>(json!({
            "id": "abc", "title": "Mug", "price": 1
        }));
        assert!(err.is_err());
    }

    #[test]
    fn test_category_ref_forms() {
        let slug: CategoryRef = serde_json::from_value(json!("shoes")).unwrap();
        assert!(matches!(slug, CategoryRef::Slug(s) if s == "shoes"));

        let object: CategoryRef =
            serde_json::from_value(json!({"name": "Shoes", "slug": "shoes"})).unwrap();
        assert!(matches!(object, CategoryRef::Object { slug: Some(_), .. }));
    }
}
