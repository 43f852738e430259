//! Product catalog browsing.
//!
//! [`CatalogScreen`] loads the catalog once when entered and again only when
//! asked to refresh. A failed load leaves the screen with an empty list and
//! hands the error back for display.

use thiserror::Error;
use tracing::instrument;

use pocket_store_core::{Price, ProductId};

use crate::backend::{BackendError, Document, DocumentStore, Query};
use crate::cart::{Cart, OrderLine, ProductRef};

/// Field names of product documents.
pub mod wire {
    pub const PRODUCT_NAME: &str = "productName";
    pub const DESCRIPTION: &str = "description";
    pub const PRICE: &str = "price";
    pub const IMAGE_URL: &str = "imageUrl";
    pub const CREATED_AT: &str = "createdAt";
}

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to fetch products: {0}")]
    ReadFailure(#[source] BackendError),
}

impl CatalogError {
    /// Message to show the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ReadFailure(_) => "Failed to fetch products".to_owned(),
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: String,
}

impl Product {
    /// Decode a product document. Missing text fields read as empty and an
    /// unusable price reads as zero.
    #[must_use]
    pub fn from_document(doc: &Document) -> Self {
        let text = |field: &str| doc.string(field).unwrap_or_default().to_owned();

        Self {
            id: ProductId::new(doc.id.as_str()),
            name: text(wire::PRODUCT_NAME),
            description: text(wire::DESCRIPTION),
            price: doc
                .get(wire::PRICE)
                .map_or(Price::ZERO, |v| Price::from_json(&v.to_json())),
            image_url: text(wire::IMAGE_URL),
        }
    }

    /// The fields the cart keeps.
    #[must_use]
    pub fn to_ref(&self) -> ProductRef {
        ProductRef {
            id: self.id.clone(),
            name: self.name.clone(),
            price: Some(self.price),
            image_url: self.image_url.clone(),
        }
    }
}

/// Read every product in `collection`.
///
/// # Errors
///
/// Returns `CatalogError::ReadFailure` if the query fails.
#[instrument(skip(store))]
pub async fn fetch_products(
    store: &dyn DocumentStore,
    collection: &str,
) -> Result<Vec<Product>, CatalogError> {
    let docs = store
        .query_collection(collection, &Query::all())
        .await
        .map_err(CatalogError::ReadFailure)?;

    let products: Vec<Product> = docs.iter().map(Product::from_document).collect();
    tracing::debug!(count = products.len(), "Fetched products");
    Ok(products)
}

/// Where a [`CatalogScreen`] is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// The browsing screen's state.
pub struct CatalogScreen<'a> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
    products: Vec<Product>,
    state: LoadState,
}

impl<'a> CatalogScreen<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore, collection: &'a str) -> Self {
        Self {
            store,
            collection,
            products: Vec::new(),
            state: LoadState::NotLoaded,
        }
    }

    /// Load the catalog on first entry. Later entries reuse what was loaded.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::ReadFailure` if the load fails; the product list
    /// is then empty.
    pub async fn enter(&mut self) -> Result<&[Product], CatalogError> {
        if self.state == LoadState::Loaded {
            return Ok(&self.products);
        }
        self.refresh().await
    }

    /// Reload the catalog.
    ///
    /// # Errors
    ///
    /// Same as [`CatalogScreen::enter`].
    pub async fn refresh(&mut self) -> Result<&[Product], CatalogError> {
        self.state = LoadState::Loading;
        match fetch_products(self.store, self.collection).await {
            Ok(products) => {
                self.products = products;
                self.state = LoadState::Loaded;
                Ok(&self.products)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Catalog load failed");
                self.products.clear();
                self.state = LoadState::Failed;
                Err(e)
            }
        }
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// Open a product's details.
    #[must_use]
    pub fn details(&self, id: &ProductId) -> Option<ProductDetails<'_>> {
        self.products
            .iter()
            .find(|p| &p.id == id)
            .map(ProductDetails::new)
    }
}

/// A single product's detail view.
#[derive(Debug, Clone, Copy)]
pub struct ProductDetails<'p> {
    product: &'p Product,
}

impl<'p> ProductDetails<'p> {
    #[must_use]
    pub const fn new(product: &'p Product) -> Self {
        Self { product }
    }

    #[must_use]
    pub const fn product(&self) -> &'p Product {
        self.product
    }

    /// Add one unit to `cart`.
    pub fn add_to_cart(&self, cart: &mut Cart) {
        cart.add(&self.product.to_ref());
    }

    /// Payload for buying one unit straight away.
    #[must_use]
    pub fn buy_now(&self) -> Vec<OrderLine> {
        vec![OrderLine::single(&self.product.to_ref())]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::{FieldValue, Fields};
    use crate::backend::memory::MemoryDocumentStore;

    fn product_fields(name: &str, price: FieldValue) -> Fields {
        Fields::from([
            (wire::PRODUCT_NAME.to_string(), FieldValue::from(name)),
            (wire::DESCRIPTION.to_string(), FieldValue::from("desc")),
            (wire::PRICE.to_string(), price),
            (wire::IMAGE_URL.to_string(), FieldValue::from("https://img.test/x.png")),
        ])
    }

    #[test]
    fn test_price_as_text_or_number() {
        let text = Document {
            id: "a".into(),
            fields: product_fields("Mug", FieldValue::from("12.50")),
        };
        let number = Document {
            id: "b".into(),
            fields: product_fields("Tea", FieldValue::Double(5.5)),
        };
        let junk = Document {
            id: "c".into(),
            fields: product_fields("Odd", FieldValue::from("cheap")),
        };

        assert_eq!(Product::from_document(&text).price, Price::from_cents(1250));
        assert_eq!(Product::from_document(&number).price, Price::from_cents(550));
        assert_eq!(Product::from_document(&junk).price, Price::ZERO);
    }

    #[test]
    fn test_missing_fields_read_as_empty() {
        let doc = Document {
            id: "x".into(),
            fields: Fields::new(),
        };
        let product = Product::from_document(&doc);
        assert_eq!(product.name, "");
        assert_eq!(product.price, Price::ZERO);
    }

    #[tokio::test]
    async fn test_enter_fetches_once() {
        let store = MemoryDocumentStore::new();
        store.seed("products", "p1", product_fields("Mug", FieldValue::from("3")));

        let mut screen = CatalogScreen::new(&store, "products");
        assert_eq!(screen.state(), LoadState::NotLoaded);
        assert_eq!(screen.enter().await.unwrap().len(), 1);

        store.seed("products", "p2", product_fields("Tea", FieldValue::from("4")));
        assert_eq!(screen.enter().await.unwrap().len(), 1);
        assert_eq!(screen.refresh().await.unwrap().len(), 2);
        assert_eq!(screen.state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_read_failure_leaves_empty_list() {
        let store = MemoryDocumentStore::new();
        store.seed("products", "p1", product_fields("Mug", FieldValue::from("3")));
        let mut screen = CatalogScreen::new(&store, "products");
        screen.enter().await.unwrap();

        store.set_reads_failing(true);
        let err = screen.refresh().await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to fetch products");
        assert!(screen.products().is_empty());
        assert_eq!(screen.state(), LoadState::Failed);

        store.set_reads_failing(false);
        assert_eq!(screen.enter().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_details_add_and_buy_now() {
        let store = MemoryDocumentStore::new();
        store.seed("products", "p1", product_fields("Mug", FieldValue::from("3")));
        let mut screen = CatalogScreen::new(&store, "products");
        screen.enter().await.unwrap();

        let details = screen.details(&ProductId::new("p1")).unwrap();
        let mut cart = Cart::new();
        details.add_to_cart(&mut cart);
        details.add_to_cart(&mut cart);
        assert_eq!(cart.item_count(), 2);

        let lines = details.buy_now();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[0].product_name, "Mug");

        assert!(screen.details(&ProductId::new("nope")).is_none());
    }
}
