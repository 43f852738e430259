//! Publishing new catalog products.

use std::path::PathBuf;

use thiserror::Error;
use tracing::instrument;

use pocket_store_core::ProductId;

use crate::backend::{BackendError, BlobStore, DocumentStore, FieldValue, Fields};
use crate::catalog::wire;

/// Folder in the blob store that holds product images.
const IMAGE_FOLDER: &str = "products";

/// Product publishing errors.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A text field is blank or no image was picked.
    #[error("please fill out all fields")]
    Incomplete,

    /// The image path has no usable file name.
    #[error("image path has no file name: {0}")]
    BadImagePath(PathBuf),

    #[error("image upload failed: {0}")]
    Upload(#[source] BackendError),

    #[error("failed to save product: {0}")]
    Write(#[source] BackendError),
}

impl PublishError {
    /// Message to show the seller.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Incomplete | Self::BadImagePath(_) => "Please fill out all fields".to_owned(),
            Self::Upload(_) | Self::Write(_) => "Failed to save product".to_owned(),
        }
    }
}

/// The "add product" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    /// Stored as typed; the catalog parses it leniently on read.
    pub price_text: String,
    pub image: Option<PathBuf>,
}

impl NewProduct {
    /// Check that every text field is filled in and an image is picked.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Incomplete` otherwise.
    pub fn validate(&self) -> Result<(), PublishError> {
        let filled = [&self.name, &self.description, &self.price_text]
            .iter()
            .all(|f| !f.trim().is_empty());
        if filled && self.image.is_some() {
            Ok(())
        } else {
            Err(PublishError::Incomplete)
        }
    }
}

/// Uploads product images and writes product documents.
pub struct ProductPublisher<'a> {
    store: &'a dyn DocumentStore,
    blobs: &'a dyn BlobStore,
    collection: &'a str,
}

impl<'a> ProductPublisher<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn DocumentStore,
        blobs: &'a dyn BlobStore,
        collection: &'a str,
    ) -> Self {
        Self {
            store,
            blobs,
            collection,
        }
    }

    /// Upload the image, then add the product document.
    ///
    /// The image lands at `products/{file name}`; an existing image with the
    /// same name is replaced. No document is written if the upload fails.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` if validation, the upload or the write fails.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn publish(&self, product: &NewProduct) -> Result<ProductId, PublishError> {
        product.validate()?;
        let image = product.image.as_ref().ok_or(PublishError::Incomplete)?;
        let file_name = image
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PublishError::BadImagePath(image.clone()))?;

        let image_url = self
            .blobs
            .put_file(&format!("{IMAGE_FOLDER}/{file_name}"), image)
            .await
            .map_err(PublishError::Upload)?;

        let fields = Fields::from([
            (wire::PRODUCT_NAME.to_owned(), FieldValue::from(product.name.as_str())),
            (
                wire::DESCRIPTION.to_owned(),
                FieldValue::from(product.description.as_str()),
            ),
            (wire::PRICE.to_owned(), FieldValue::from(product.price_text.as_str())),
            (wire::IMAGE_URL.to_owned(), FieldValue::from(image_url)),
            (wire::CREATED_AT.to_owned(), FieldValue::ServerTimestamp),
        ]);

        let id = self
            .store
            .add_document(self.collection, fields)
            .await
            .map_err(PublishError::Write)?;
        tracing::info!(product_id = %id, "Product published");

        Ok(ProductId::new(id.into_inner()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBlobStore, MemoryDocumentStore};
    use crate::catalog::{Product, fetch_products};
    use pocket_store_core::Price;

    async fn temp_image(bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }

    fn form(image: Option<PathBuf>) -> NewProduct {
        NewProduct {
            name: "Mug".to_string(),
            description: "Holds tea".to_string(),
            price_text: "12.50".to_string(),
            image,
        }
    }

    #[test]
    fn test_validate_requires_everything() {
        assert!(matches!(form(None).validate(), Err(PublishError::Incomplete)));
        let blank = NewProduct {
            price_text: "  ".to_string(),
            ..form(Some(PathBuf::from("a.png")))
        };
        assert!(blank.validate().is_err());
        assert!(form(Some(PathBuf::from("a.png"))).validate().is_ok());
    }

    #[tokio::test]
    async fn test_publish_uploads_then_writes() {
        let store = MemoryDocumentStore::new();
        let blobs = MemoryBlobStore::new();
        let image = temp_image(b"png-bytes").await;
        let file_name = image.file_name().unwrap().to_str().unwrap().to_owned();

        let publisher = ProductPublisher::new(&store, &blobs, "products");
        publisher.publish(&form(Some(image.clone()))).await.unwrap();

        assert_eq!(
            blobs.file(&format!("products/{file_name}")).unwrap(),
            b"png-bytes"
        );
        let products: Vec<Product> = fetch_products(&store, "products").await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].price, Price::from_cents(1250));
        assert_eq!(products[0].image_url, format!("memory://products/{file_name}"));

        let docs = store.documents("products");
        assert_eq!(docs[0].string(wire::PRICE), Some("12.50"));

        tokio::fs::remove_file(image).await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_failure_writes_nothing() {
        let store = MemoryDocumentStore::new();
        let blobs = MemoryBlobStore::new().unavailable();
        let image = temp_image(b"x").await;

        let publisher = ProductPublisher::new(&store, &blobs, "products");
        let err = publisher.publish(&form(Some(image.clone()))).await.unwrap_err();

        assert!(matches!(err, PublishError::Upload(_)));
        assert_eq!(err.user_message(), "Failed to save product");
        assert_eq!(store.write_attempts(), 0);

        tokio::fs::remove_file(image).await.unwrap();
    }
}
