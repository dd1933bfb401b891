//! Order history and checkout.

use emporium_core::{AddressId, Order, OrderId, OrderStatus, Page, PaymentMethodId, ProductId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::account::AddressInput;
use super::conversions;
use super::wire::OrderWire;
use crate::cart::CheckoutDraft;
use crate::gateway::{ApiError, Endpoint, Mutation, RequestSpec, Tag, TagKind};

/// Arguments of `GET /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    pub page: u32,
    pub limit: u32,
}

impl Default for OrderListArgs {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            limit: 10,
        }
    }
}

/// Tags of an order page: the kind plus every listed order.
fn order_page_tags(output: Option<&Page<Order>>) -> Vec<Tag> {
    let mut tags = vec![Tag::kind(TagKind::Order)];
    tags.extend(
        output
            .into_iter()
            .flat_map(|page| &page.items)
            .map(|order| Tag::id(TagKind::Order, order.id)),
    );
    tags
}

/// `GET /orders`
pub struct ListOrders;

impl Endpoint for ListOrders {
    const NAME: &'static str = "listOrders";
    const USER_SCOPED: bool = true;
    type Args = OrderListArgs;
    type Output = Page<Order>;

    fn request(args: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("orders")
            .query_opt("status", args.status)
            .query("page", args.page)
            .query("limit", args.limit))
    }

    fn provides(_args: &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        order_page_tags(output)
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::page::<OrderWire, _>(body, conversions::order)
    }
}

/// `GET /orders/{id}`
pub struct GetOrder;

impl Endpoint for GetOrder {
    const NAME: &'static str = "getOrder";
    const USER_SCOPED: bool = true;
    type Args = OrderId;
    type Output = Order;

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get(format!("orders/{id}")))
    }

    fn provides(id: &Self::Args, _output: Option<&Self::Output>) -> Vec<Tag> {
        vec![Tag::id(TagKind::Order, id)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<OrderWire>(body).and_then(conversions::order)
    }
}

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ShippingDestination {
    /// A saved address.
    #[serde(rename = "shippingAddressId")]
    Saved(AddressId),
    /// A one-off address entered at checkout.
    #[serde(rename = "shippingAddress")]
    New(AddressInput),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub items: Vec<NewOrderItem>,
    #[serde(flatten)]
    pub shipping: ShippingDestination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_id: Option<PaymentMethodId>,
}

impl NewOrder {
    /// Order for the lines of a checked-out cart.
    #[must_use]
    pub fn from_draft(
        draft: &CheckoutDraft,
        shipping: ShippingDestination,
        payment_method_id: Option<PaymentMethodId>,
    ) -> Self {
        Self {
            items: draft
                .lines
                .iter()
                .map(|line| NewOrderItem {
                    product_id: line.product_id,
                    quantity: line.quantity,
                })
                .collect(),
            shipping,
            payment_method_id,
        }
    }
}

/// `POST /orders`
pub struct CreateOrder;

impl Mutation for CreateOrder {
    const NAME: &'static str = "createOrder";
    type Args = NewOrder;
    type Output = Order;

    fn request(order: &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::post("orders").json(order)
    }

    fn invalidates(order: &Self::Args, _output: &Self::Output) -> Vec<Tag> {
        // Stock of every ordered product changed.
        let mut tags = vec![Tag::kind(TagKind::Order), Tag::kind(TagKind::Stats)];
        tags.extend(
            order
                .items
                .iter()
                .map(|item| Tag::id(TagKind::Product, item.product_id)),
        );
        tags
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<OrderWire>(body).and_then(conversions::order)
    }
}

/// `POST /orders/{id}/cancel`
pub struct CancelOrder;

impl Mutation for CancelOrder {
    const NAME: &'static str = "cancelOrder";
    type Args = OrderId;
    type Output = Order;

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::post(format!("orders/{id}/cancel")))
    }

    fn invalidates(id: &Self::Args, _output: &Self::Output) -> Vec<Tag> {
        vec![Tag::id(TagKind::Order, id), Tag::kind(TagKind::Stats)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<OrderWire>(body).and_then(conversions::order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn order_body(id: i64) -> Value {
        json!({
            "id": id,
            "status": "pending",
            "items": [{"productId": 1, "title": "Mug", "unitPrice": "4.00", "quantity": 1}],
            "createdAt": "2025-03-01T10:00:00Z"
        })
    }

    #[test]
    fn test_new_order_body() {
        let order = NewOrder {
            items: vec![NewOrderItem {
                product_id: ProductId::new(1),
                quantity: 2,
            }],
            shipping: ShippingDestination::Saved(AddressId::new(4)),
            payment_method_id: None,
        };

        let spec = CreateOrder::request(&order).unwrap();
        assert_eq!(
            spec.body,
            Some(json!({
                "items": [{"productId": 1, "quantity": 2}],
                "shippingAddressId": 4
            }))
        );
    }

    #[test]
    fn test_create_invalidates_orders_stock_and_stats() {
        let order = NewOrder {
            items: vec![NewOrderItem {
                product_id: ProductId::new(7),
                quantity: 1,
            }],
            shipping: ShippingDestination::Saved(AddressId::new(1)),
            payment_method_id: Some(PaymentMethodId::new(2)),
        };
        let output = CreateOrder::normalize(order_body(9)).unwrap();

        let tags = CreateOrder::invalidates(&order, &output);
        assert!(tags.contains(&Tag::kind(TagKind::Order)));
        assert!(tags.contains(&Tag::id(TagKind::Product, 7)));
        assert!(tags.contains(&Tag::kind(TagKind::Stats)));
    }

    #[test]
    fn test_cancel_hits_listing_page() {
        let page = ListOrders::normalize(json!({"data": [order_body(3), order_body(4)]})).unwrap();
        let provided = ListOrders::provides(&OrderListArgs::default(), Some(&page));
        let output = CancelOrder::normalize(order_body(4)).unwrap();

        let invalidated = CancelOrder::invalidates(&OrderId::new(4), &output);
        assert!(provided.iter().any(|p| invalidated[0].matches(p)));
        assert!(
            !provided
                .iter()
                .any(|p| Tag::id(TagKind::Order, 5).matches(p))
        );
    }

    #[test]
    fn test_list_status_filter() {
        let args = OrderListArgs {
            status: Some(OrderStatus::Shipped),
            ..OrderListArgs::default()
        };
        let spec = ListOrders::request(&args).unwrap();
        assert_eq!(spec.query[0], ("status".to_string(), "shipped".to_string()));
    }
}
