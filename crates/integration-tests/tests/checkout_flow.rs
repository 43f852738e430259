//! Integration tests for the checkout flow over the in-memory backends.

#![allow(clippy::unwrap_used)]

use pocket_store_core::{AddressError, AddressField, OwnerId, ProductId};
use pocket_store_integration_tests::{ORDERS, PRODUCTS, sample_address, seed_catalog};
use pocket_store_storefront::backend::FieldValue;
use pocket_store_storefront::backend::memory::{MemoryDocumentStore, MemoryIdentityProvider};
use pocket_store_storefront::cart::Cart;
use pocket_store_storefront::catalog::CatalogScreen;
use pocket_store_storefront::checkout::{CheckoutError, OrderSubmitter, ValidationError, wire};

async fn cart_of(store: &MemoryDocumentStore, ids: &[&str]) -> Cart {
    let mut screen = CatalogScreen::new(store, PRODUCTS);
    screen.enter().await.unwrap();
    let mut cart = Cart::new();
    for id in ids {
        screen
            .details(&ProductId::new(*id))
            .unwrap()
            .add_to_cart(&mut cart);
    }
    cart
}

#[tokio::test]
async fn test_one_document_per_line() {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store);
    let identity = MemoryIdentityProvider::signed_in("alice");
    let cart = cart_of(&store, &["mug", "hat", "mug"]).await;

    let mut address = sample_address();
    address.city = "  London  ".to_owned();

    let report = OrderSubmitter::new(&store, &identity, ORDERS)
        .submit(&address, &cart.to_order_payload())
        .await
        .unwrap();
    assert_eq!(report.written.len(), 2);
    assert!(report.is_complete());

    let orders = store.documents(ORDERS);
    assert_eq!(orders.len(), 2);
    for order in &orders {
        assert_eq!(order.string(wire::OWNER_ID), Some("alice"));
        assert_eq!(order.string(wire::CITY), Some("London"));
        assert_eq!(order.string(wire::POSTAL_CODE), Some("90210"));
        assert!(order.get(wire::CREATED_AT).unwrap().as_timestamp().is_some());
    }

    let mug = orders
        .iter()
        .find(|o| o.string(wire::PRODUCT_NAME) == Some("Mug"))
        .unwrap();
    assert_eq!(mug.get(wire::QUANTITY), Some(&FieldValue::Integer(2)));
    assert_eq!(mug.get(wire::PRICE), Some(&FieldValue::Double(12.5)));
    assert_eq!(mug.string(wire::IMAGE), Some("https://img.example/Mug.png"));
}

#[tokio::test]
async fn test_buy_now_writes_a_single_unit() {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store);
    let identity = MemoryIdentityProvider::signed_in("alice");

    let mut screen = CatalogScreen::new(&store, PRODUCTS);
    screen.enter().await.unwrap();
    let payload = screen.details(&ProductId::new("hat")).unwrap().buy_now();

    OrderSubmitter::new(&store, &identity, ORDERS)
        .submit(&sample_address(), &payload)
        .await
        .unwrap();

    let orders = store.documents(ORDERS);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].string(wire::PRODUCT_NAME), Some("Hat"));
    assert_eq!(orders[0].get(wire::QUANTITY), Some(&FieldValue::Integer(1)));
    assert_eq!(orders[0].get(wire::PRICE), Some(&FieldValue::Double(20.0)));
}

#[tokio::test]
async fn test_rejections_write_nothing() {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store);
    let cart = cart_of(&store, &["mug"]).await;
    let payload = cart.to_order_payload();

    let nobody = MemoryIdentityProvider::new();
    let err = OrderSubmitter::new(&store, &nobody, ORDERS)
        .submit(&sample_address(), &payload)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::Validation(ValidationError::NotSignedIn)
    ));

    let alice = MemoryIdentityProvider::signed_in("alice");
    let mut address = sample_address();
    address.phone = "   ".to_owned();
    let err = OrderSubmitter::new(&store, &alice, ORDERS)
        .submit(&address, &payload)
        .await
        .unwrap_err();
    match err {
        CheckoutError::Validation(ValidationError::Address(AddressError::MissingFields(fields))) => {
            assert_eq!(fields, vec![AddressField::Phone]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = OrderSubmitter::new(&store, &alice, ORDERS)
        .submit(&sample_address(), &[])
        .await
        .unwrap_err();
    assert!(matches!(err, CheckoutError::Validation(ValidationError::NoItems)));

    assert_eq!(store.write_attempts(), 0);
    assert!(store.documents(ORDERS).is_empty());
}

#[tokio::test]
async fn test_partial_failure_is_reported_and_kept() {
    let store = MemoryDocumentStore::new().fail_nth_write(2);
    seed_catalog(&store);
    let identity = MemoryIdentityProvider::signed_in("alice");
    let cart = cart_of(&store, &["mug", "hat", "tea"]).await;

    let err = OrderSubmitter::new(&store, &identity, ORDERS)
        .submit(&sample_address(), &cart.to_order_payload())
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Failed to submit data");

    let CheckoutError::WriteFailure(report) = err else {
        panic!("expected a write failure");
    };
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.failures.len(), 1);

    // Successful writes are not rolled back
    assert_eq!(store.documents(ORDERS).len(), 2);
}

#[tokio::test]
async fn test_submit_as_explicit_owner() {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store);
    let nobody = MemoryIdentityProvider::new();
    let cart = cart_of(&store, &["tea"]).await;

    OrderSubmitter::new(&store, &nobody, ORDERS)
        .submit_as(
            Some(&OwnerId::new("bob")),
            &sample_address(),
            &cart.to_order_payload(),
        )
        .await
        .unwrap();

    assert_eq!(store.documents(ORDERS)[0].string(wire::OWNER_ID), Some("bob"));
}

#[tokio::test]
async fn test_resubmitting_writes_duplicate_orders() {
    let store = MemoryDocumentStore::new();
    seed_catalog(&store);
    let identity = MemoryIdentityProvider::signed_in("alice");
    let cart = cart_of(&store, &["mug", "hat", "mug"]).await;
    let payload = cart.to_order_payload();
    let submitter = OrderSubmitter::new(&store, &identity, ORDERS);

    let first = submitter.submit(&sample_address(), &payload).await.unwrap();
    let second = submitter.submit(&sample_address(), &payload).await.unwrap();
    assert_eq!(first.written.len(), payload.len());
    assert_eq!(second.written.len(), payload.len());

    let orders = store.documents(ORDERS);
    assert_eq!(orders.len(), 2 * payload.len());

    let mut ids: Vec<_> = orders.iter().map(|o| o.id.to_string()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), orders.len());

    let without_created_at = |index: usize| {
        let mut fields = orders[index].fields.clone();
        fields.remove(wire::CREATED_AT);
        fields
    };
    for line in 0..payload.len() {
        assert_eq!(without_created_at(line), without_created_at(line + payload.len()));
        assert_ne!(
            orders[line].get(wire::CREATED_AT),
            orders[line + payload.len()].get(wire::CREATED_AT)
        );
    }
}
