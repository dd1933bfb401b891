use emporium_core::{
    ContactMessage, DashboardStats, MessageId, MessageStatus, Order, OrderId, OrderItem,
    OrderStatus, ProductId, UserId, line_total,
};
use rust_decimal::Decimal;

use super::{address, email};
use crate::api::wire::{MessageWire, OrderItemWire, OrderWire, StatsWire};
use crate::gateway::ApiError;

pub(crate) fn order(wire: OrderWire) -> Result<Order, ApiError> {
    let status: OrderStatus = wire.status.parse().map_err(ApiError::parsing)?;
    let items: Vec<OrderItem> = wire.items.into_iter().map(order_item).collect();

    let subtotal = wire.subtotal.unwrap_or_else(|| {
        items
            .iter()
            .map(|item| line_total(item.unit_price, item.quantity))
            .sum()
    });
    let shipping = wire.shipping.unwrap_or(Decimal::ZERO);
    let total = wire.total.unwrap_or(subtotal + shipping);

    Ok(Order {
        id: OrderId::new(wire.id),
        user_id: wire.user_id.map(UserId::new),
        status,
        items,
        subtotal,
        shipping,
        total,
        shipping_address: wire.shipping_address.map(address).transpose()?,
        created_at: wire.created_at,
    })
}

fn order_item(wire: OrderItemWire) -> OrderItem {
    OrderItem {
        product_id: ProductId::new(wire.product_id),
        title: wire.title,
        unit_price: wire.unit_price,
        quantity: wire.quantity,
        image_url: wire.image_url,
    }
}

pub(crate) fn message(wire: MessageWire) -> Result<ContactMessage, ApiError> {
    Ok(ContactMessage {
        id: MessageId::new(wire.id),
        email: email(&wire.email)?,
        name: wire.name,
        subject: wire.subject,
        body: wire.body,
        status: wire
            .status
            .map(|s| s.parse::<MessageStatus>())
            .transpose()
            .map_err(ApiError::parsing)?
            .unwrap_or_default(),
        created_at: wire.created_at,
    })
}

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn stats(wire: StatsWire) -> Result<DashboardStats, ApiError> {
    Ok(DashboardStats {
        total_revenue: wire.total_revenue,
        order_count: wire.order_count,
        pending_orders: wire.pending_orders,
        customer_count: wire.customer_count,
        product_count: wire.product_count,
        unread_messages: wire.unread_messages,
    })
}
