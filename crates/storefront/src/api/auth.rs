//! Login, registration, logout, and token refresh.
//!
//! None of these requests run the refresh flow on a 401: a rejected login is
//! a wrong password, and a rejected refresh ends the session.

use emporium_core::{Email, UserSummary};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};

use super::conversions;
use super::wire::{AuthGrantWire, TokenPairWire};
use crate::gateway::{ApiError, Mutation, RequestSpec, Tag};

/// Email and password for `POST /auth/login`.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: Email,
    pub password: SecretString,
}

/// Fields for `POST /auth/register`.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: Email,
    pub password: SecretString,
    pub phone: Option<String>,
}

/// Identity and tokens issued by login or registration.
#[derive(Debug, Clone)]
pub struct AuthGrant {
    pub user: UserSummary,
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
}

/// Tokens issued by a refresh.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    /// `None` when the server keeps the current refresh token valid.
    pub refresh_token: Option<SecretString>,
}

fn grant(body: Value) -> Result<AuthGrant, ApiError> {
    let wire: AuthGrantWire = super::decode(body)?;
    Ok(AuthGrant {
        user: conversions::user(wire.user)?,
        access_token: wire.access_token.map(SecretString::from),
        refresh_token: wire.refresh_token.map(SecretString::from),
    })
}

/// `POST /auth/login`
pub struct Login;

impl Mutation for Login {
    const NAME: &'static str = "login";
    type Args = LoginCredentials;
    type Output = AuthGrant;

    fn request(credentials: &Self::Args) -> Result<RequestSpec, ApiError> {
        let body = json!({
            "email": credentials.email.as_str(),
            "password": credentials.password.expose_secret(),
        });
        Ok(RequestSpec::post("auth/login").json(&body)?.without_reauth())
    }

    fn invalidates(_credentials: &Self::Args, _grant: &Self::Output) -> Vec<Tag> {
        // The identity change itself purges user-scoped entries.
        Vec::new()
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        grant(body)
    }
}

/// `POST /auth/register`
pub struct Register;

impl Mutation for Register {
    const NAME: &'static str = "register";
    type Args = Registration;
    type Output = AuthGrant;

    fn request(registration: &Self::Args) -> Result<RequestSpec, ApiError> {
        let mut body = Map::new();
        body.insert("name".into(), registration.name.clone().into());
        body.insert("email".into(), registration.email.as_str().into());
        body.insert(
            "password".into(),
            registration.password.expose_secret().into(),
        );
        if let Some(phone) = &registration.phone {
            body.insert("phone".into(), phone.clone().into());
        }

        Ok(RequestSpec::post("auth/register")
            .json(&body)?
            .without_reauth())
    }

    fn invalidates(_registration: &Self::Args, _grant: &Self::Output) -> Vec<Tag> {
        Vec::new()
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        grant(body)
    }
}

/// `POST /auth/logout`, revoking the refresh token server-side.
pub struct Logout;

impl Mutation for Logout {
    const NAME: &'static str = "logout";
    type Args = Option<SecretString>;
    type Output = ();

    fn request(refresh_token: &Self::Args) -> Result<RequestSpec, ApiError> {
        let spec = RequestSpec::post("auth/logout").without_reauth();
        match refresh_token {
            Some(token) => spec.json(&json!({"refreshToken": token.expose_secret()})),
            None => Ok(spec),
        }
    }

    fn invalidates(_refresh_token: &Self::Args, (): &Self::Output) -> Vec<Tag> {
        Vec::new()
    }

    fn normalize(_body: Value) -> Result<Self::Output, ApiError> {
        Ok(())
    }
}

/// `POST /auth/refresh`
///
/// Run by the gateway itself when an authorized request gets a 401.
pub struct RefreshTokens;

impl Mutation for RefreshTokens {
    const NAME: &'static str = "refreshTokens";
    type Args = SecretString;
    type Output = TokenPair;

    fn request(refresh_token: &Self::Args) -> Result<RequestSpec, ApiError> {
        let body = json!({"refreshToken": refresh_token.expose_secret()});
        Ok(RequestSpec::post("auth/refresh").json(&body)?.without_reauth())
    }

    fn invalidates(_refresh_token: &Self::Args, _pair: &Self::Output) -> Vec<Tag> {
        Vec::new()
    }

    fn normalize(body: Value) -> Result<Self::Output, ApiError> {
        let wire: TokenPairWire = super::decode(body)?;
        Ok(TokenPair {
            access_token: SecretString::from(wire.access_token),
            refresh_token: wire.refresh_token.map(SecretString::from),
        })
    }
}
