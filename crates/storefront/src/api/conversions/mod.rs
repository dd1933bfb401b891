//! Conversions from wire shapes to `emporium-core` types.
//!
//! Conversions are fallible only where the wire can carry a value the
//! internal type cannot represent (a malformed email, an unknown order
//! status). Everything else falls back to a neutral default.

mod account;
mod catalog;
mod orders;

pub(crate) use account::{address, payment_method, user};
pub(crate) use catalog::{category, product};
pub(crate) use orders::{message, order, stats};

use emporium_core::Email;

use crate::gateway::ApiError;

fn email(raw: &str) -> Result<Email, ApiError> {
    Email::parse(raw).map_err(|e| ApiError::parsing(format!("invalid email {raw:?}: {e}")))
}

/// URL-safe slug: lowercase ASCII alphanumerics separated by single dashes.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
