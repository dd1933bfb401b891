//! Profile, saved addresses, and saved payment methods of the signed-in user.

use emporium_core::{Address, AddressId, PaymentMethod, PaymentMethodId, UserSummary};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::conversions;
use super::wire::{AddressWire, PaymentMethodWire, UserWire};
use crate::gateway::{ApiError, Endpoint, Mutation, RequestSpec, Tag, TagKind};
use crate::session::UserPatch;

// =============================================================================
// Profile
// =============================================================================

/// `GET /auth/profile`
pub struct GetProfile;

impl Endpoint for GetProfile {
    const NAME: &'static str = "getProfile";
    const USER_SCOPED: bool = true;
    type Args = ();
    type Output = UserSummary;

    fn request((): &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("auth/profile"))
    }

    fn provides((): &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let mut tags = vec![Tag::kind(TagKind::Profile)];
        tags.extend(output.map(|user| Tag::id(TagKind::User, user.id)));
        tags
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<UserWire>(body).and_then(conversions::user)
    }
}

/// `PUT /auth/profile`
pub struct UpdateProfile;

impl Mutation for UpdateProfile {
    const NAME: &'static str = "updateProfile";
    type Args = UserPatch;
    type Output = UserSummary;

    fn request(patch: &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::put("auth/profile").json(patch)
    }

    fn invalidates(_patch: &Self::Args, user: &Self::Output) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Profile), Tag::id(TagKind::User, user.id)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<UserWire>(body).and_then(conversions::user)
    }
}

// =============================================================================
// Addresses
// =============================================================================

/// Fields of a new or edited address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub full_name: String,
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_default: bool,
}

impl From<&Address> for AddressInput {
    fn from(address: &Address) -> Self {
        Self {
            label: address.label.clone(),
            full_name: address.full_name.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
            is_default: address.is_default,
        }
    }
}

/// `GET /addresses`
pub struct ListAddresses;

impl Endpoint for ListAddresses {
    const NAME: &'static str = "listAddresses";
    const USER_SCOPED: bool = true;
    type Args = ();
    type Output = Vec<Address>;

    fn request((): &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("addresses"))
    }

    fn provides((): &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let mut tags = vec![Tag::kind(TagKind::Address)];
        tags.extend(
            output
                .into_iter()
                .flatten()
                .map(|address| Tag::id(TagKind::Address, address.id)),
        );
        tags
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::list::<AddressWire, _>(body, conversions::address)
    }
}

/// `POST /addresses`
pub struct CreateAddress;

impl Mutation for CreateAddress {
    const NAME: &'static str = "createAddress";
    type Args = AddressInput;
    type Output = Address;

    fn request(input: &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::post("addresses").json(input)
    }

    fn invalidates(_input: &Self::Args, _output: &Self::Output) -> Vec<Tag> {
        // A new default demotes the previous one, so the whole list changes.
        vec![Tag::kind(TagKind::Address)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<AddressWire>(body).and_then(conversions::address)
    }
}

/// `PUT /addresses/{id}`
pub struct UpdateAddress;

impl Mutation for UpdateAddress {
    const NAME: &'static str = "updateAddress";
    type Args = (AddressId, AddressInput);
    type Output = Address;

    fn request((id, input): &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::put(format!("addresses/{id}")).json(input)
    }

    fn invalidates(_args: &Self::Args, _output: &Self::Output) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Address)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<AddressWire>(body).and_then(conversions::address)
    }
}

/// `DELETE /addresses/{id}`
pub struct DeleteAddress;

impl Mutation for DeleteAddress {
    const NAME: &'static str = "deleteAddress";
    type Args = AddressId;
    type Output = ();

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::delete(format!("addresses/{id}")))
    }

    fn invalidates(_id: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        vec![Tag::kind(TagKind::Address)]
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}

// =============================================================================
// Payment methods
// =============================================================================

/// A card to save, as returned by the payment provider's tokenization step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodInput {
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    pub is_default: bool,
}

/// `GET /payment-methods`
pub struct ListPaymentMethods;

impl Endpoint for ListPaymentMethods {
    const NAME: &'static str = "listPaymentMethods";
    const USER_SCOPED: bool = true;
    type Args = ();
    type Output = Vec<PaymentMethod>;

    fn request((): &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::get("payment-methods"))
    }

    fn provides((): &Self::Args, output: Option<&Self::Output>) -> Vec<Tag> {
        let mut tags = vec![Tag::kind(TagKind::PaymentMethod)];
        tags.extend(
            output
                .into_iter()
                .flatten()
                .map(|method| Tag::id(TagKind::PaymentMethod, method.id)),
        );
        tags
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::list::<PaymentMethodWire, _>(body, conversions::payment_method)
    }
}

/// `POST /payment-methods`
pub struct AddPaymentMethod;

impl Mutation for AddPaymentMethod {
    const NAME: &'static str = "addPaymentMethod";
    type Args = PaymentMethodInput;
    type Output = PaymentMethod;

    fn request(input: &Self::Args) -> Result<RequestSpec, ApiError> {
        RequestSpec::post("payment-methods").json(input)
    }

    fn invalidates(_input: &Self::Args, _output: &Self::Output) -> Vec<Tag> {
        vec![Tag::kind(TagKind::PaymentMethod)]
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        super::decode::<PaymentMethodWire>(body).and_then(conversions::payment_method)
    }
}

/// `DELETE /payment-methods/{id}`
pub struct DeletePaymentMethod;

impl Mutation for DeletePaymentMethod {
    const NAME: &'static str = "deletePaymentMethod";
    type Args = PaymentMethodId;
    type Output = ();

    fn request(id: &Self::Args) -> Result<RequestSpec, ApiError> {
        Ok(RequestSpec::delete(format!("payment-methods/{id}")))
    }

    fn invalidates(_id: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        vec![Tag::kind(TagKind::PaymentMethod)]
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::{Email, UserId};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_profile_tags_include_user_id() {
        let user = GetProfile::normalize(json!({
            "data": {"id": 3, "name": "Ada", "email": "ada@example.com"}
        }))
        .unwrap();

        let tags = GetProfile::provides(&(), Some(&user));
        assert_eq!(
            tags,
            vec![Tag::kind(TagKind::Profile), Tag::id(TagKind::User, UserId::new(3))]
        );
        assert!(GetProfile::USER_SCOPED);
    }

    #[test]
    fn test_update_profile_sends_only_set_fields() {
        let patch = UserPatch {
            email: Some(Email::parse("new@example.com").unwrap()),
            ..UserPatch::default()
        };
        let spec = UpdateProfile::request(&patch).unwrap();
        assert_eq!(spec.body, Some(json!({"email": "new@example.com"})));
    }

    #[test]
    fn test_update_address_path_and_body() {
        let input = AddressInput {
            full_name: "Ada".to_string(),
            line1: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
            ..AddressInput::default()
        };
        let spec = UpdateAddress::request(&(AddressId::new(4), input)).unwrap();
        assert_eq!(spec.path, "addresses/4");
        assert_eq!(spec.body.unwrap()["postalCode"], "12345");
    }

    #[test]
    fn test_address_mutations_invalidate_list() {
        let invalidated = DeleteAddress::invalidates(&AddressId::new(1), &());
        let provided = ListAddresses::provides(&(), None);
        assert!(
            invalidated
                .iter()
                .any(|tag| provided.iter().any(|p| tag.matches(p)))
        );
    }
}
