//! The storefront facade.
//!
//! [`Storefront`] owns one of each store, the query gateway, and the catalog
//! composer, and wires the flows that span them: signing in and out,
//! checkout, and profile edits.

use std::sync::Arc;

use emporium_core::{Order, Page, PaymentMethodId, Product, UserSummary};
use tracing::{info, instrument, warn};

use crate::api::account::UpdateProfile;
use crate::api::auth::{AuthGrant, Login, LoginCredentials, Logout, Register, Registration};
use crate::api::catalog::ListProducts;
use crate::api::orders::{CreateOrder, NewOrder, ShippingDestination};
use crate::cart::{CartStore, CheckoutError};
use crate::catalog::{CatalogComposer, QueryFilterState};
use crate::config::StorefrontConfig;
use crate::error::{Result, add_breadcrumb};
use crate::gateway::{GatewayOptions, HttpTransport, QueryGateway, QuerySubscription, Transport};
use crate::session::{SessionStore, UserPatch};
use crate::storage::{DurableStore, FileStorage};
use crate::wishlist::WishlistStore;

/// Client-side commerce state shared by every screen.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    session: SessionStore,
    cart: CartStore,
    wishlist: WishlistStore,
    gateway: QueryGateway,
    composer: CatalogComposer,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("session", &self.inner.session)
            .field("cart", &self.inner.cart)
            .field("wishlist", &self.inner.wishlist)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Load the persisted stores from `store` and build the gateway over
    /// `transport`.
    ///
    /// Never fails: unreadable state falls back to defaults.
    #[must_use]
    pub fn init(
        config: StorefrontConfig,
        store: DurableStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let session = SessionStore::load(store.clone());
        let cart = CartStore::load(store.clone());
        let wishlist = WishlistStore::load(store);
        let gateway = QueryGateway::new(
            transport,
            session.clone(),
            GatewayOptions::from(config.cache),
        );
        let composer = CatalogComposer::new(config.catalog);

        info!(
            base_url = %config.api.base_url,
            signed_in = session.is_authenticated(),
            cart_lines = cart.lines().len(),
            "Storefront initialized"
        );

        Self {
            inner: Arc::new(StorefrontInner {
                config,
                session,
                cart,
                wishlist,
                gateway,
                composer,
            }),
        }
    }

    /// Build a storefront persisting to files under the configured directory
    /// and talking HTTP to the configured API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: StorefrontConfig) -> Result<Self> {
        let backend = FileStorage::new(&config.storage.dir);
        let store = DurableStore::new(Arc::new(backend), config.storage.prefix.clone());
        let transport =
            HttpTransport::new(config.api.base_url.clone(), config.api.request_timeout)?;

        Ok(Self::init(config, store, Arc::new(transport)))
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn gateway(&self) -> &QueryGateway {
        &self.inner.gateway
    }

    #[must_use]
    pub fn composer(&self) -> &CatalogComposer {
        &self.inner.composer
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Compose `filters` into product list arguments and subscribe to them.
    pub fn compose_and_run(&self, filters: &QueryFilterState) -> QuerySubscription<Page<Product>> {
        let args = self.inner.composer.compose(filters);
        self.inner.gateway.query::<ListProducts>(args)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the API error on rejected credentials or a failed request.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: LoginCredentials) -> Result<UserSummary> {
        let grant = self.inner.gateway.mutate::<Login>(credentials).await?;
        Ok(self.sign_in(grant))
    }

    /// Create an account and sign in to it.
    ///
    /// # Errors
    ///
    /// Returns the API error if registration is rejected.
    #[instrument(skip_all)]
    pub async fn register(&self, registration: Registration) -> Result<UserSummary> {
        let grant = self.inner.gateway.mutate::<Register>(registration).await?;
        Ok(self.sign_in(grant))
    }

    fn sign_in(&self, grant: AuthGrant) -> UserSummary {
        let user = grant.user.clone();
        self.inner
            .session
            .login(grant.user, grant.access_token, grant.refresh_token);
        // Entries fetched for a previous identity must not leak into this one.
        self.inner.gateway.purge_user_scoped();
        user
    }

    /// Sign out.
    ///
    /// The server is asked to revoke the refresh token first; the local
    /// session is cleared whatever it answers.
    #[instrument(skip_all)]
    pub async fn logout(&self) {
        if !self.inner.session.is_authenticated() {
            return;
        }

        let refresh_token = self.inner.session.refresh_token();
        if let Err(e) = self.inner.gateway.mutate::<Logout>(refresh_token).await {
            warn!(error = %e, "Server-side logout failed, clearing local session anyway");
        }

        self.inner.session.logout();
        self.inner.gateway.purge_user_scoped();
    }

    /// Save profile changes and apply the server's copy to the session.
    ///
    /// # Errors
    ///
    /// Returns the API error if the update is rejected.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, patch: UserPatch) -> Result<UserSummary> {
        let user = self.inner.gateway.mutate::<UpdateProfile>(patch).await?;
        self.inner.session.update_user(UserPatch::from(&user));
        Ok(user)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Place an order for the cart's contents and empty the cart.
    ///
    /// The cart is left untouched if the order is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotSignedIn`] when signed out,
    /// [`CheckoutError::EmptyCart`] for an empty cart, or the API error.
    #[instrument(skip_all)]
    pub async fn place_order(
        &self,
        shipping: ShippingDestination,
        payment_method_id: Option<PaymentMethodId>,
    ) -> Result<Order> {
        if !self.inner.session.is_authenticated() {
            return Err(CheckoutError::NotSignedIn.into());
        }
        let draft = self.inner.cart.checkout_draft()?;

        let order = self
            .inner
            .gateway
            .mutate::<CreateOrder>(NewOrder::from_draft(&draft, shipping, payment_method_id))
            .await?;

        self.inner.cart.clear();
        add_breadcrumb(
            "checkout",
            "Order placed",
            Some(&[("order_id", &order.id.to_string())]),
        );
        info!(order_id = %order.id, items = draft.item_count, "Order placed");

        Ok(order)
    }
}
