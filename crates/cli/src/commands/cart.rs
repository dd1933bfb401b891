//! Cart and wishlist commands. Both stores are local; only adding a product
//! reaches the API, to look the product up.

use std::io::Write;

use emporium_core::{ProductId, format_price};
use emporium_storefront::api::catalog::GetProduct;
use emporium_storefront::{Storefront, WishlistEntry};

use super::{CartAction, CommandError, WishlistAction};

/// `emporium cart ...`
pub async fn run(
    storefront: &Storefront,
    action: CartAction,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let cart = storefront.cart();

    match action {
        CartAction::Show => {}
        CartAction::Add {
            product_id,
            quantity,
        } => {
            let product = storefront
                .gateway()
                .fetch::<GetProduct>(ProductId::new(product_id))
                .await?;
            cart.add_product(&product, quantity);
        }
        CartAction::Set {
            product_id,
            quantity,
        } => {
            if !cart.set_quantity(ProductId::new(product_id), quantity) {
                return Err(not_in_cart(product_id));
            }
        }
        CartAction::Remove { product_id } => {
            if !cart.remove_item(ProductId::new(product_id)) {
                return Err(not_in_cart(product_id));
            }
        }
        CartAction::Clear => cart.clear(),
    }

    if cart.is_empty() {
        writeln!(out, "Your cart is empty")?;
        return Ok(());
    }
    for line in cart.lines() {
        writeln!(
            out,
            "{:>6}  {:<40} {:>3} x {:>10} = {:>10}",
            line.product_id,
            line.title,
            line.quantity,
            format_price(line.unit_price),
            format_price(line.total())
        )?;
    }
    writeln!(
        out,
        "{} items, subtotal {}",
        cart.item_count(),
        format_price(cart.subtotal())
    )?;
    Ok(())
}

/// `emporium wishlist ...`
pub async fn wishlist(
    storefront: &Storefront,
    action: WishlistAction,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let wishlist = storefront.wishlist();

    match action {
        WishlistAction::Show => {}
        WishlistAction::Toggle { product_id } => {
            let product = storefront
                .gateway()
                .fetch::<GetProduct>(ProductId::new(product_id))
                .await?;
            let saved = wishlist.toggle(WishlistEntry::from(&*product));
            writeln!(
                out,
                "{} {}",
                if saved { "Saved" } else { "Removed" },
                product.title
            )?;
        }
        WishlistAction::Move { product_id } => {
            if !wishlist.move_to_cart(ProductId::new(product_id), storefront.cart()) {
                return Err(CommandError::InvalidInput(format!(
                    "product {product_id} is not in the wishlist"
                )));
            }
        }
        WishlistAction::Clear => wishlist.clear(),
    }

    for entry in wishlist.entries() {
        writeln!(
            out,
            "{:>6}  {:<40} {:>10}",
            entry.product_id,
            entry.title,
            format_price(entry.unit_price)
        )?;
    }
    writeln!(out, "{} saved", wishlist.len())?;
    Ok(())
}

fn not_in_cart(product_id: i64) -> CommandError {
    CommandError::InvalidInput(format!("product {product_id} is not in the cart"))
}
