//! Back-office operations.
//!
//! Admin lists are ordinary gateway queries. They are all user-scoped, so
//! nothing an admin loaded survives a logout.

use emporium_core::{
    Category, CategoryId, ContactMessage, DashboardStats, MessageId, MessageStatus, Order,
    OrderId, OrderStatus, Page, Product, ProductId, UserId, UserRole, UserSummary,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::conversions;
use super::orders::OrderListArgs;
use super::wire::{CategoryWire, MessageWire, OrderWire, ProductWire, StatsWire, UserWire};
use crate::gateway::{ApiError, Endpoint, Mutation, RequestSpec, Tag, TagKind};

/// The bare tag for `kind` plus one tag per listed id.
fn tagged(kind: TagKind, ids: impl IntoIterator<Item = String>) -> Vec<Tag> {
    let mut tags = vec![Tag::kind(kind)];
    tags.extend(ids.into_iter().map(|id| Tag::id(kind, id)));
    tags
}

// =============================================================================
// Dashboard
// =============================================================================

/// `GET /admin/stats`
pub struct AdminStats;

impl Endpoint for AdminStats {
    const NAME: &'static str = "adminStats";
    const USER_SCOPED: bool = true;
    type Args = ();
    type Output = DashboardStats;

    fn request((): &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("admin/stats"))
    }

    fn provides((): &Self::Args, _output: Option<&Self::Output>) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Stats)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<StatsWire>(body).and_then(conversions::stats)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// `GET /admin/orders`
pub struct AdminOrders;

impl Endpoint for AdminOrders {
    const NAME: &'static str = "adminOrders";
    const USER_SCOPED: bool = true;
    type Args = OrderListArgs;
    type Output = Page<Order>;

    fn request(args: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("admin/orders")
            .query_opt("status", args.status)
            .query("page", args.page)
            .query("limit", args.limit))
    }

    fn provides(_args: &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let ids = output
            .into_iter()
            .flat_map(|page| &page.items)
            .map(|order| order.id.to_string());
        tagged(TagKind::Order, ids)
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::page::<OrderWire, _>(body, conversions::order)
    }
}

/// `PUT /admin/orders/{id}/status`
pub struct UpdateOrderStatus;

impl Mutation for UpdateOrderStatus {
    const NAME: &'static str = "updateOrderStatus";
    type Args = (OrderId, OrderStatus);
    type Output = Order;

    fn request((id, status): &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::put(format!("admin/orders/{id}/status")).json(&json!({"status": status}))
    }

    fn invalidates((id, _status): &Self::Args, _order: &Self::Output) -> Vec<Tag> {
        vec![Tag::id(TagKind::Order, id), Tag::kind(TagKind::Stats)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<OrderWire>(body).and_then(conversions::order)
    }
}

// =============================================================================
// Users
// =============================================================================

/// Arguments of `GET /admin/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    pub page: u32,
    pub limit: u32,
}

impl Default for UserListArgs {
    fn default() -> Self {
        Self {
            search: None,
            role: None,
            page: 1,
            limit: 20,
        }
    }
}

/// `GET /admin/users`
pub struct AdminUsers;

impl Endpoint for AdminUsers {
    const NAME: &'static str = "adminUsers";
    const USER_SCOPED: bool = true;
    type Args = UserListArgs;
    type Output = Page<UserSummary>;

    fn request(args: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("admin/users")
            .query_opt("search", args.search.as_deref())
            .query_opt("role", args.role)
            .query("page", args.page)
            .query("limit", args.limit))
    }

    fn provides(_args: &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let ids = output
            .into_iter()
            .flat_map(|page| &page.items)
            .map(|user| user.id.to_string());
        tagged(TagKind::User, ids)
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::page::<UserWire, _>(body, conversions::user)
    }
}

/// `PUT /admin/users/{id}/role`
pub struct UpdateUserRole;

impl Mutation for UpdateUserRole {
    const NAME: &'static str = "updateUserRole";
    type Args = (UserId, UserRole);
    type Output = UserSummary;

    fn request((id, role): &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::put(format!("admin/users/{id}/role")).json(&json!({"role": role}))
    }

    fn invalidates((id, _role): &Self::Args, _user: &Self::Output) -> Vec<Tag> {
        vec![Tag::id(TagKind::User, id), Tag::kind(TagKind::Stats)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<UserWire>(body).and_then(conversions::user)
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Arguments of `GET /admin/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    pub page: u32,
    pub limit: u32,
}

impl Default for MessageListArgs {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            limit: 20,
        }
    }
}

/// `GET /admin/messages`
pub struct AdminMessages;

impl Endpoint for AdminMessages {
    const NAME: &'static str = "adminMessages";
    const USER_SCOPED: bool = true;
    type Args = MessageListArgs;
    type Output = Page<ContactMessage>;

    fn request(args: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("admin/messages")
            .query_opt("status", args.status)
            .query("page", args.page)
            .query("limit", args.limit))
    }

    fn provides(_args: &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let ids = output
            .into_iter()
            .flat_map(|page| &page.items)
            .map(|message| message.id.to_string());
        tagged(TagKind::Message, ids)
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::page::<MessageWire, _>(body, conversions::message)
    }
}

/// `PUT /admin/messages/{id}/status`
pub struct UpdateMessageStatus;

impl Mutation for UpdateMessageStatus {
    const NAME: &'static str = "updateMessageStatus";
    type Args = (MessageId, MessageStatus);
    type Output = ContactMessage;

    fn request((id, status): &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::put(format!("admin/messages/{id}/status")).json(&json!({"status": status}))
    }

    fn invalidates((id, _status): &Self::Args, _message: &Self::Output) -> Vec<Tag> {
        vec![Tag::id(TagKind::Message, id), Tag::kind(TagKind::Stats)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<MessageWire>(body).and_then(conversions::message)
    }
}

/// `DELETE /admin/messages/{id}`
pub struct DeleteMessage;

impl Mutation for DeleteMessage {
    const NAME: &'static str = "deleteMessage";
    type Args = MessageId;
    type Output = ();

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::delete(format!("admin/messages/{id}")))
    }

    fn invalidates(id: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        vec![Tag::id(TagKind::Message, id), Tag::kind(TagKind::Stats)]
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}

// =============================================================================
// Catalog management
// =============================================================================

/// Fields of a new or edited product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    /// Category slug.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    pub stock: u32,
}

/// Product changes can move products between filtered lists and change
/// category counts, so every catalog list is refetched.
fn catalog_changed() -> Vec<Tag> {
    vec![
        Tag::kind(TagKind::Product),
        Tag::kind(TagKind::Category),
        Tag::kind(TagKind::Stats),
    ]
}

fn validate_product(input: &ProductInput) -> Result<(), ApiError> {
    let problem = if input.title.trim().is_empty() {
        Some("title cannot be empty")
    } else if input.price.is_sign_negative() {
        Some("price cannot be negative")
    } else if input.original_price.is_some_and(|o| o < input.price) {
        Some("original price cannot be below the price")
    } else {
        None
    };

    problem.map_or(Ok(()), |message| {
        Err(ApiError::http(422, json!({"message": message})))
    })
}

/// `POST /admin/products`
pub struct CreateProduct;

impl Mutation for CreateProduct {
    const NAME: &'static str = "createProduct";
    type Args = ProductInput;
    type Output = Product;

    fn request(input: &Self::Args) -> Result<RequestSpec, ApiError> {
        validate_product(input)?;
        RequestSpec::post("admin/products").json(input)
    }

    fn invalidates(_input: &Self::Args, _product: &Self::Output) -> Vec<Tag> {
        catalog_changed()
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<ProductWire>(body).and_then(conversions::product)
    }
}

/// `PUT /admin/products/{id}`
pub struct UpdateProduct;

impl Mutation for UpdateProduct {
    const NAME: &'static str = "updateProduct";
    type Args = (ProductId, ProductInput);
    type Output = Product;

    fn request((id, input): &Self::Args) -> Result<RequestSpec, ApiError> {
        validate_product(input)?;
        RequestSpec::put(format!("admin/products/{id}")).json(input)
    }

    fn invalidates(_args: &Self::Args, _product: &Self::Output) -> Vec<Tag> {
        catalog_changed()
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<ProductWire>(body).and_then(conversions::product)
    }
}

/// `DELETE /admin/products/{id}`
pub struct DeleteProduct;

impl Mutation for DeleteProduct {
    const NAME: &'static str = "deleteProduct";
    type Args = ProductId;
    type Output = ();

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::delete(format!("admin/products/{id}")))
    }

    fn invalidates(_id: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        catalog_changed()
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}

/// Fields of a new or edited category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    /// Derived from the name by the server when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// `POST /admin/categories`
pub struct CreateCategory;

impl Mutation for CreateCategory {
    const NAME: &'static str = "createCategory";
    type Args = CategoryInput;
    type Output = Category;

    fn request(input: &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::post("admin/categories").json(input)
    }

    fn invalidates(_input: &Self::Args, _category: &Self::Output) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Category)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<CategoryWire>(body).and_then(conversions::category)
    }
}

/// `PUT /admin/categories/{id}`
pub struct UpdateCategory;

impl Mutation for UpdateCategory {
    const NAME: &'static str = "updateCategory";
    type Args = (CategoryId, CategoryInput);
    type Output = Category;

    fn request((id, input): &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::put(format!("admin/categories/{id}")).json(input)
    }

    fn invalidates(_args: &Self::Args, _category: &Self::Output) -> Vec<Tag> {
        // A renamed slug changes what products report as their category.
        vec![Tag::kind(TagKind::Category), Tag::kind(TagKind::Product)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<CategoryWire>(body).and_then(conversions::category)
    }
}

/// `DELETE /admin/categories/{id}`
pub struct DeleteCategory;

impl Mutation for DeleteCategory {
    const NAME: &'static str = "deleteCategory";
    type Args = CategoryId;
    type Output = ();

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::delete(format!("admin/categories/{id}")))
    }

    fn invalidates(_id: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Category), Tag::kind(TagKind::Product)]
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product_input() -> ProductInput {
        ProductInput {
            title: "Mug".to_string(),
            description: String::new(),
            price: Decimal::new(900, 2),
            original_price: None,
            category: Some("kitchen".to_string()),
            image_url: None,
            images: Vec::new(),
            stock: 5,
        }
    }

    #[test]
    fn test_admin_lists_are_user_scoped() {
        assert!(AdminStats::USER_SCOPED);
        assert!(AdminOrders::USER_SCOPED);
        assert!(AdminUsers::USER_SCOPED);
        assert!(AdminMessages::USER_SCOPED);
    }

    #[test]
    fn test_stats_aliases() {
        let stats = AdminStats::normalize(json!({
            "data": {"revenue": "1520.50", "total_orders": 12, "pending_orders": 3,
                     "total_users": 40, "total_products": 18, "new_messages": 2}
        }))
        .unwrap();

        assert_eq!(stats.total_revenue, Decimal::new(152_050, 2));
        assert_eq!(stats.order_count, 12);
        assert_eq!(stats.customer_count, 40);
        assert_eq!(stats.unread_messages, 2);
    }

    #[test]
    fn test_order_status_update_body() {
        let spec = UpdateOrderStatus::request(&(OrderId::new(3), OrderStatus::Shipped)).unwrap();
        assert_eq!(spec.path, "admin/orders/3/status");
        assert_eq!(spec.body, Some(json!({"status": "shipped"})));
    }

    #[test]
    fn test_user_list_tags() {
        let page = AdminUsers::normalize(json!({
            "data": [{"id": 1, "name": "Ada", "email": "ada@example.com", "role": "admin"}],
            "pagination": {"page": 1, "limit": 20, "total": 1}
        }))
        .unwrap();

        let tags = AdminUsers::provides(&UserListArgs::default(), Some(&page));
        assert_eq!(tags, vec![Tag::kind(TagKind::User), Tag::id(TagKind::User, 1)]);
    }

    #[test]
    fn test_role_update_hits_user_list() {
        let provided = vec![Tag::kind(TagKind::User), Tag::id(TagKind::User, 1)];
        let user = UserWire {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: Some("admin".to_string()),
            phone: None,
            avatar_url: None,
        };
        let user = conversions::user(user).unwrap();

        let invalidated = UpdateUserRole::invalidates(&(UserId::new(1), UserRole::Admin), &user);
        assert!(invalidated.iter().any(|t| provided.iter().any(|p| t.matches(p))));
    }

    #[test]
    fn test_product_validation() {
        assert!(CreateProduct::request(&product_input()).is_ok());

        let mut bad = product_input();
        bad.original_price = Some(Decimal::new(100, 2));
        assert_eq!(
            CreateProduct::request(&bad).unwrap_err().status_code(),
            Some(422)
        );

        let mut blank = product_input();
        blank.title = "  ".to_string();
        assert!(UpdateProduct::request(&(ProductId::new(1), blank)).is_err());
    }

    #[test]
    fn test_catalog_mutations_refetch_product_lists() {
        let tags = DeleteProduct::invalidates(&ProductId::new(1), &());
        assert!(tags.contains(&Tag::kind(TagKind::Product)));
        assert!(tags.contains(&Tag::kind(TagKind::Category)));
    }
}
