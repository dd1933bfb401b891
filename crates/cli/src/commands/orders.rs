//! Order history and checkout commands.

use std::io::Write;

use emporium_core::{AddressId, OrderId, OrderStatus, PaymentMethodId, format_price};
use emporium_storefront::Storefront;
use emporium_storefront::api::orders::{CancelOrder, ListOrders, OrderListArgs, ShippingDestination};

use super::CommandError;

/// `emporium orders`
pub async fn list(
    storefront: &Storefront,
    status: Option<&str>,
    page: u32,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let status = status
        .map(str::parse::<OrderStatus>)
        .transpose()
        .map_err(CommandError::InvalidInput)?;

    let orders = storefront
        .gateway()
        .fetch::<ListOrders>(OrderListArgs {
            status,
            page: page.max(1),
            ..OrderListArgs::default()
        })
        .await?;

    for order in &orders.items {
        writeln!(
            out,
            "#{:<6} {:<11} {:>3} items {:>10}  {}",
            order.id,
            order.status,
            order.item_count(),
            format_price(order.total),
            order.created_at.format("%Y-%m-%d")
        )?;
    }
    writeln!(
        out,
        "page {}/{}",
        orders.pagination.page, orders.pagination.total_pages
    )?;
    Ok(())
}

/// `emporium checkout --address-id <id>`
pub async fn checkout(
    storefront: &Storefront,
    address_id: i64,
    payment_method_id: Option<i64>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let order = storefront
        .place_order(
            ShippingDestination::Saved(AddressId::new(address_id)),
            payment_method_id.map(PaymentMethodId::new),
        )
        .await?;

    writeln!(
        out,
        "Placed order #{} for {}",
        order.id,
        format_price(order.total)
    )?;
    Ok(())
}

/// `emporium cancel <id>`
pub async fn cancel(
    storefront: &Storefront,
    id: i64,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let order = storefront
        .gateway()
        .mutate::<CancelOrder>(OrderId::new(id))
        .await?;
    writeln!(out, "Order #{} is now {}", order.id, order.status)?;
    Ok(())
}
