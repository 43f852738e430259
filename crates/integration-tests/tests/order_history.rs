//! Integration tests for order history after checkout.

#![allow(clippy::unwrap_used)]

use pocket_store_core::{Price, ProductId};
use pocket_store_integration_tests::{ORDERS, PRODUCTS, sample_address, seed_catalog};
use pocket_store_storefront::backend::memory::{MemoryDocumentStore, MemoryIdentityProvider};
use pocket_store_storefront::catalog::CatalogScreen;
use pocket_store_storefront::checkout::OrderSubmitter;
use pocket_store_storefront::orders::{OrderHistory, OrderHistoryError};

async fn buy(store: &MemoryDocumentStore, identity: &MemoryIdentityProvider, id: &str) {
    let mut screen = CatalogScreen::new(store, PRODUCTS);
    screen.enter().await.unwrap();
    let payload = screen.details(&ProductId::new(id)).unwrap().buy_now();
    OrderSubmitter::new(store, identity, ORDERS)
        .submit(&sample_address(), &payload)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_history_shows_only_own_orders_newest_first() {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store);
    let alice = MemoryIdentityProvider::signed_in("alice");
    let bob = MemoryIdentityProvider::signed_in("bob");

    buy(&store, &alice, "mug").await;
    buy(&store, &bob, "hat").await;
    buy(&store, &alice, "tea").await;

    let orders = OrderHistory::new(&store, &alice, ORDERS).load().await.unwrap();
    let names: Vec<_> = orders.iter().map(|o| o.product_name.as_str()).collect();
    assert_eq!(names, vec!["Tea", "Mug"]);
    assert_eq!(orders[1].line_total, Price::from_cents(1250));
    assert_eq!(orders[0].state, "CA");
    assert!(orders[0].created_at > orders[1].created_at);

    let orders = OrderHistory::new(&store, &bob, ORDERS).load().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].product_name, "Hat");
}

#[tokio::test]
async fn test_history_requires_sign_in_and_reports_read_failures() {
    let store = MemoryDocumentStore::new();
    let nobody = MemoryIdentityProvider::new();
    let err = OrderHistory::new(&store, &nobody, ORDERS).load().await.unwrap_err();
    assert!(matches!(err, OrderHistoryError::NotSignedIn));

    store.set_reads_failing(true);
    let alice = MemoryIdentityProvider::signed_in("alice");
    let err = OrderHistory::new(&store, &alice, ORDERS).load().await.unwrap_err();
    assert!(matches!(err, OrderHistoryError::ReadFailure(_)));
    assert_eq!(err.user_message(), "Failed to fetch orders");
}

#[tokio::test]
async fn test_new_user_has_no_orders() {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store);
    buy(&store, &MemoryIdentityProvider::signed_in("alice"), "mug").await;

    let carol = MemoryIdentityProvider::signed_in("carol");
    let orders = OrderHistory::new(&store, &carol, ORDERS).load().await.unwrap();
    assert!(orders.is_empty());
}
