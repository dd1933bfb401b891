//! Contact form.

use emporium_core::Email;
use serde::Serialize;
use serde_json::Value;

use crate::gateway::{ApiError, Mutation, RequestSpec, Tag, TagKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    pub name: String,
    pub email: Email,
    pub subject: String,
    #[serde(rename = "message")]
    pub body: String,
}

/// `POST /contact`
pub struct SendContactMessage;

impl Mutation for SendContactMessage {
    const NAME: &'static str = "sendContactMessage";
    type Args = ContactForm;
    type Output = ();

    fn request(form: &Self::Args) -> Result<RequestSpec, ApiError> {
        if form.body.trim().is_empty() {
            return Err(ApiError::http(
                422,
                serde_json::json!({"message": "message cannot be empty"}),
            ));
        }
        RequestSpec::post("contact").json(form)
    }

    fn invalidates(_form: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        // Shows up in the back-office inbox.
        vec![Tag::kind(TagKind::Message), Tag::kind(TagKind::Stats)]
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}
