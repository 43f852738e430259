//! Integration tests for Pocket Store.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pocket-store-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart`, `checkout_flow`, `order_history`, `catalog`, `accounts` - flows
//!   over the in-memory backends
//! - `firebase_rest` - the Firebase REST clients against [`FakeFirebase`], a
//!   local server speaking the same JSON
//!
//! Shared fixtures live here.

pub mod fake_firebase;

use std::path::PathBuf;

use pocket_store_core::Address;
use pocket_store_storefront::backend::memory::MemoryDocumentStore;
use pocket_store_storefront::backend::{FieldValue, Fields};
use pocket_store_storefront::catalog::wire;

pub use fake_firebase::FakeFirebase;

/// Products collection used by the fixtures.
pub const PRODUCTS: &str = "products";

/// Orders collection used by the fixtures.
pub const ORDERS: &str = "addresses";

/// Users collection used by the fixtures.
pub const USERS: &str = "users";

/// A fully filled-in shipping address.
#[must_use]
pub fn sample_address() -> Address {
    Address {
        recipient_name: "Ada Lovelace".to_owned(),
        phone: "555-0100".to_owned(),
        street: "12 Analytical Way".to_owned(),
        city: "London".to_owned(),
        state: "CA".to_owned(),
        postal_code: "90210".to_owned(),
    }
}

/// Product document fields with the price stored as given.
#[must_use]
pub fn product_fields(name: &str, price: impl Into<FieldValue>) -> Fields {
    Fields::from([
        (wire::PRODUCT_NAME.to_owned(), FieldValue::from(name)),
        (
            wire::DESCRIPTION.to_owned(),
            FieldValue::from(format!("A fine {name}")),
        ),
        (wire::PRICE.to_owned(), price.into()),
        (
            wire::IMAGE_URL.to_owned(),
            FieldValue::from(format!("https://img.example/{name}.png")),
        ),
    ])
}

/// Seed a small catalog: `mug` at 12.50 (number), `hat` at "20" (text) and
/// `tea` at 5.5 (number).
pub fn seed_catalog(store: &MemoryDocumentStore) {
    store.seed(PRODUCTS, "mug", product_fields("Mug", FieldValue::Double(12.5)));
    store.seed(PRODUCTS, "hat", product_fields("Hat", "20"));
    store.seed(PRODUCTS, "tea", product_fields("Tea", FieldValue::Double(5.5)));
}

/// A fresh path for device storage under the system temp directory.
#[must_use]
pub fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pocket-store-it-{}-{name}", uuid::Uuid::new_v4()))
}
