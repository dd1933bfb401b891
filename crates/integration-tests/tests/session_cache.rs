//! Identity changes and the query cache.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use emporium_core::ProductId;
use emporium_integration_tests::{MockApi, ada, storefront, storefront_with_store};
use emporium_storefront::api::account::GetProfile;
use emporium_storefront::api::catalog::{GetProduct, ListCategories};
use emporium_storefront::api::orders::{ListOrders, OrderListArgs};
use emporium_storefront::{CartLine, DurableStore, FileStorage, QueryStatus};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;

#[tokio::test]
async fn test_logout_drops_user_data_keeps_catalog() {
    let api = MockApi::seeded();
    let storefront = storefront(&api);
    storefront.login(ada()).await.unwrap();

    let mut orders = storefront
        .gateway()
        .query::<ListOrders>(OrderListArgs::default());
    let mut categories = storefront.gateway().query::<ListCategories>(());
    assert_eq!(orders.settled().await.status, QueryStatus::Fulfilled);
    assert_eq!(categories.settled().await.data.unwrap().len(), 2);

    storefront.logout().await;

    let state = orders.state();
    assert_eq!(state.status, QueryStatus::Uninitialized);
    assert!(state.data.is_none());
    assert!(categories.state().data.is_some());

    // The next identity fetches its own copy.
    storefront.login(ada()).await.unwrap();
    orders.refetch();
    assert!(orders.settled().await.data.is_some());
    assert_eq!(api.count("GET orders"), 2);
    assert_eq!(api.count("GET categories"), 1);
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed_once() {
    let api = MockApi::seeded();
    let storefront = storefront(&api);
    storefront.login(ada()).await.unwrap();
    let before = storefront.session().access_token().unwrap();

    api.expire_access_tokens();
    let profile = storefront.gateway().fetch::<GetProfile>(()).await.unwrap();

    assert_eq!(profile.name, "Ada Lovelace");
    assert_eq!(api.count("POST auth/refresh"), 1);
    assert_eq!(api.count("GET auth/profile"), 2);
    let after = storefront.session().access_token().unwrap();
    assert_ne!(before.expose_secret(), after.expose_secret());
    assert!(storefront.session().is_authenticated());
}

#[tokio::test]
async fn test_revoked_refresh_token_signs_out() {
    let api = MockApi::seeded();
    let storefront = storefront(&api);
    storefront.login(ada()).await.unwrap();

    api.expire_access_tokens();
    api.revoke_refresh_tokens();
    let err = storefront
        .gateway()
        .fetch::<GetProfile>(())
        .await
        .unwrap_err();

    assert!(err.is_auth_failure());
    assert!(!storefront.session().is_authenticated());
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = || DurableStore::new(Arc::new(FileStorage::new(dir.path())), "emporium");
    let api = MockApi::seeded();

    {
        let first = storefront_with_store(&api, store());
        first.login(ada()).await.unwrap();
        first.cart().add_item(CartLine {
            product_id: ProductId::new(3),
            title: "Cutting Board".to_string(),
            unit_price: Decimal::new(3200, 2),
            image_url: String::new(),
            quantity: 2,
        });
    }

    let second = storefront_with_store(&api, store());
    assert!(second.session().is_authenticated());
    assert_eq!(second.cart().subtotal(), Decimal::new(6400, 2));

    // The persisted token still authorizes requests.
    let profile = second.gateway().fetch::<GetProfile>(()).await.unwrap();
    assert_eq!(profile.email.as_str(), "ada@example.com");
    assert_eq!(api.count("POST auth/login"), 1);
}

#[tokio::test]
async fn test_outage_leaves_local_state_usable() {
    let api = MockApi::seeded();
    let storefront = storefront(&api);
    api.set_down(true);

    let err = storefront
        .gateway()
        .fetch::<GetProduct>(ProductId::new(1))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(503));

    storefront.cart().add_item(CartLine {
        product_id: ProductId::new(1),
        title: "Enamel Mug".to_string(),
        unit_price: Decimal::new(1250, 2),
        image_url: String::new(),
        quantity: 1,
    });
    assert_eq!(storefront.cart().item_count(), 1);

    // A new subscriber retries the failed entry once the API is back.
    api.set_down(false);
    let product = storefront
        .gateway()
        .fetch::<GetProduct>(ProductId::new(1))
        .await
        .unwrap();
    assert_eq!(product.title, "Enamel Mug");
}
