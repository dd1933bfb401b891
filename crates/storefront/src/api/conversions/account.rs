use emporium_core::{Address, AddressId, PaymentMethod, PaymentMethodId, UserId, UserSummary};

use super::email;
use crate::api::wire::{AddressWire, PaymentMethodWire, UserWire};
use crate::gateway::ApiError;

pub(crate) fn user(wire: UserWire) -> Result<UserSummary, ApiError> {
    Ok(UserSummary {
        id: UserId::new(wire.id),
        email: email(&wire.email)?,
        name: wire.name,
        // Unknown roles get the least privilege.
        role: wire
            .role
            .and_then(|role| role.parse().ok())
            .unwrap_or_default(),
        phone: wire.phone,
        avatar_url: wire.avatar_url,
    })
}

/// Convert an address. Addresses embedded in orders may lack an id; those
/// get id 0.
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn address(wire: AddressWire) -> Result<Address, ApiError> {
    Ok(Address {
        id: AddressId::new(wire.id.unwrap_or(0)),
        label: wire.label,
        full_name: wire.full_name.unwrap_or_default(),
        line1: wire.line1,
        line2: wire.line2.filter(|l| !l.trim().is_empty()),
        city: wire.city,
        state: wire.state.unwrap_or_default(),
        postal_code: wire.postal_code,
        country: wire.country.unwrap_or_default(),
        phone: wire.phone,
        is_default: wire.is_default,
    })
}

pub(crate) fn payment_method(wire: PaymentMethodWire) -> Result<PaymentMethod, ApiError> {
    if !(1..=12).contains(&wire.exp_month) {
        return Err(ApiError::parsing(format!(
            "payment method {} has expiry month {}",
            wire.id, wire.exp_month
        )));
    }

    // Some responses carry the full masked number.
    let last4 = wire
        .last4
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<Vec<_>>();
    let last4 = last4[last4.len().saturating_sub(4)..].iter().collect();

    Ok(PaymentMethod {
        id: PaymentMethodId::new(wire.id),
        brand: wire.brand,
        last4,
        exp_month: wire.exp_month,
        exp_year: wire.exp_year,
        holder_name: wire.holder_name,
        is_default: wire.is_default,
    })
}
