//! Account types: user identity, addresses, saved payment methods.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{AddressId, PaymentMethodId, UserId};
use super::status::UserRole;

/// Minimal identity of the signed-in user.
///
/// Persisted as part of the session snapshot, so every field added here must
/// stay deserializable from older snapshots (`#[serde(default)]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl UserSummary {
    /// Whether this user may use the admin back-office.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub label: Option<String>,
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub is_default: bool,
}

/// A saved card, as much of it as the API exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub holder_name: Option<String>,
    pub is_default: bool,
}

impl PaymentMethod {
    /// Masked display form, e.g. `Visa •••• 4242`.
    #[must_use]
    pub fn masked(&self) -> String {
        format!("{} •••• {}", self.brand, self.last4)
    }
}
