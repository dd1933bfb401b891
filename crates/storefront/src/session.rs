//! Authentication session store.
//!
//! Holds the signed-in identity and the bearer/refresh tokens. The store is a
//! cheap handle shared by the facade and the query gateway; every identity
//! change (login, logout) bumps an epoch the gateway watches so user-scoped
//! cache entries never outlive the identity that fetched them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use emporium_core::{Email, UserSummary};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::storage::{DurableStore, keys};

/// The current authentication state.
///
/// `is_authenticated()` is derived from the presence of a user. Tokens are
/// independent of it: a session may be authenticated through a cookie-based
/// transport without a bearer token.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user: Option<UserSummary>,
    access_token: Option<SecretString>,
    refresh_token: Option<SecretString>,
    /// Bumped whenever either token changes. Not persisted.
    token_version: u64,
}

impl Session {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserSummary> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn access_token(&self) -> Option<&SecretString> {
        self.access_token.as_ref()
    }

    #[must_use]
    pub const fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(UserSummary::is_admin)
    }

    /// Plain, serializable copy of the session.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_authenticated: self.is_authenticated(),
            user: self.user.clone(),
            access_token: self
                .access_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            refresh_token: self
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
        }
    }

    fn is_default(&self) -> bool {
        self.user.is_none() && self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl From<SessionSnapshot> for Session {
    fn from(snapshot: SessionSnapshot) -> Self {
        // The flag is derived; a snapshot claiming otherwise is ignored.
        // Tokens without a user belong to no one and are dropped.
        let Some(user) = snapshot.user else {
            return Self::default();
        };
        Self {
            user: Some(user),
            access_token: snapshot.access_token.map(SecretString::from),
            refresh_token: snapshot.refresh_token.map(SecretString::from),
            token_version: 0,
        }
    }
}

/// Persisted shape of a [`Session`].
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSnapshot {
    pub is_authenticated: bool,
    pub user: Option<UserSummary>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("SessionSnapshot")
            .field("is_authenticated", &self.is_authenticated)
            .field("user", &self.user)
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Partial update of the signed-in user. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&UserSummary> for UserPatch {
    /// A patch overwriting every field with the server's copy of the user.
    fn from(user: &UserSummary) -> Self {
        Self {
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            phone: user.phone.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

impl UserPatch {
    fn apply(self, user: &mut UserSummary) {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(phone) = self.phone {
            user.phone = Some(phone);
        }
        if let Some(avatar_url) = self.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
    }
}

/// Bearer token plus the token version and identity epoch it was read at.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub bearer: Option<SecretString>,
    pub version: u64,
    pub epoch: u64,
}

/// Shared handle to the session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

struct SessionStoreInner {
    session: RwLock<Session>,
    store: DurableStore,
    epoch: AtomicU64,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.current())
            .field("epoch", &self.epoch())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Load the persisted session, falling back to signed out.
    #[must_use]
    pub fn load(store: DurableStore) -> Self {
        let session = store
            .load::<SessionSnapshot>(keys::SESSION)
            .map(Session::from)
            .unwrap_or_default();

        if let Some(user) = session.user() {
            debug!(user_id = %user.id, "Restored session");
            set_sentry_user(&user.id, Some(user.email.as_str()));
        }

        Self {
            inner: Arc::new(SessionStoreInner {
                session: RwLock::new(session),
                store,
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Copy of the current session.
    #[must_use]
    pub fn current(&self) -> Session {
        self.read(Session::clone)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read(Session::is_authenticated)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.read(Session::is_admin)
    }

    #[must_use]
    pub fn user(&self) -> Option<UserSummary> {
        self.read(|s| s.user.clone())
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.read(|s| s.access_token.clone())
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.read(|s| s.refresh_token.clone())
    }

    /// Bearer token with its version and epoch, read atomically.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        self.read(|s| Credentials {
            bearer: s.access_token.clone(),
            version: s.token_version,
            epoch: self.epoch(),
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.read(Session::snapshot)
    }

    /// Identity epoch, bumped on every login and logout.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    /// Sign `user` in with the given tokens.
    pub fn login(
        &self,
        user: UserSummary,
        access_token: Option<SecretString>,
        refresh_token: Option<SecretString>,
    ) {
        let user_id = user.id;
        set_sentry_user(&user.id, Some(user.email.as_str()));

        let mut session = self.write();
        session.user = Some(user);
        session.access_token = access_token;
        session.refresh_token = refresh_token;
        session.token_version += 1;
        self.persist(&session);
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        drop(session);

        add_breadcrumb("auth", "Logged in", None);
        info!(%user_id, "Logged in");
    }

    /// Reset to the signed-out default. No-op when already signed out.
    pub fn logout(&self) {
        self.reset(None);
    }

    /// [`logout`](Self::logout), but only while the identity is still the one
    /// seen at `epoch`. Returns whether the session was reset.
    pub fn logout_at(&self, epoch: u64) -> bool {
        self.reset(Some(epoch))
    }

    fn reset(&self, epoch: Option<u64>) -> bool {
        let mut session = self.write();
        if session.is_default() {
            return false;
        }
        if epoch.is_some_and(|e| e != self.epoch()) {
            debug!("Ignoring logout for a replaced identity");
            return false;
        }

        let version = session.token_version + 1;
        *session = Session {
            token_version: version,
            ..Session::default()
        };
        self.persist(&session);
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        drop(session);

        clear_sentry_user();
        add_breadcrumb("auth", "Logged out", None);
        info!("Logged out");
        true
    }

    /// Merge `patch` into the signed-in user.
    ///
    /// Returns `false` (and changes nothing) when signed out.
    pub fn update_user(&self, patch: UserPatch) -> bool {
        let mut session = self.write();
        let Some(user) = session.user.as_mut() else {
            debug!("Ignoring user update while signed out");
            return false;
        };

        patch.apply(user);
        self.persist(&session);
        true
    }

    /// Replace the tokens without touching the identity.
    ///
    /// The refresh token is kept when `refresh_token` is `None`. Returns
    /// `false` (and changes nothing) when signed out, so a refresh completing
    /// after a logout cannot resurrect credentials.
    pub fn refresh(&self, access_token: SecretString, refresh_token: Option<SecretString>) -> bool {
        let mut session = self.write();
        if !session.is_authenticated() {
            debug!("Ignoring token refresh while signed out");
            return false;
        }
        self.replace_tokens(&mut session, access_token, refresh_token);
        true
    }

    /// [`refresh`](Self::refresh), but only while the identity is still the
    /// one seen at `epoch`. Tokens refreshed for a user who has since signed
    /// out never land on the next user's session.
    pub fn refresh_at(
        &self,
        epoch: u64,
        access_token: SecretString,
        refresh_token: Option<SecretString>,
    ) -> bool {
        let mut session = self.write();
        if !session.is_authenticated() || self.epoch() != epoch {
            debug!("Ignoring token refresh for a replaced identity");
            return false;
        }
        self.replace_tokens(&mut session, access_token, refresh_token);
        true
    }

    fn replace_tokens(
        &self,
        session: &mut Session,
        access_token: SecretString,
        refresh_token: Option<SecretString>,
    ) {
        session.access_token = Some(access_token);
        if let Some(refresh_token) = refresh_token {
            session.refresh_token = Some(refresh_token);
        }
        session.token_version += 1;
        self.persist(session);
        debug!("Tokens refreshed");
    }

    fn read<T>(&self, f: impl FnOnce(&Session) -> T) -> T {
        f(&self
            .inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, session: &Session) {
        self.inner.store.save(keys::SESSION, &session.snapshot());
    }
}
