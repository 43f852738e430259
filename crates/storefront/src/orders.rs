//! Order history.
//!
//! Every order document is one purchased line, newest first. The query sorts
//! on the server and the owner filter runs here, so documents belonging to
//! other users are fetched and dropped.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use pocket_store_core::{DocumentId, Price};

use crate::backend::{
    BackendError, Direction, Document, DocumentStore, FieldValue, IdentityProvider, Query,
};
use crate::checkout::wire;

/// Order history errors.
#[derive(Debug, Error)]
pub enum OrderHistoryError {
    #[error("user not authenticated")]
    NotSignedIn,

    #[error("failed to fetch orders: {0}")]
    ReadFailure(#[source] BackendError),
}

impl OrderHistoryError {
    /// Message to show the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotSignedIn => "User not authenticated".to_owned(),
            Self::ReadFailure(_) => "Failed to fetch orders".to_owned(),
        }
    }
}

/// One past order as listed in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: DocumentId,
    pub product_name: String,
    pub price: Price,
    pub quantity: u32,
    pub line_total: Price,
    /// The shipping address's state, shown under "Status".
    pub state: String,
    pub image_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderSummary {
    #[must_use]
    pub fn from_document(doc: &Document) -> Self {
        let text = |field: &str| doc.string(field).unwrap_or_default().to_owned();
        let price = doc
            .get(wire::PRICE)
            .map_or(Price::ZERO, |v| Price::from_json(&v.to_json()));
        let quantity = doc
            .get(wire::QUANTITY)
            .and_then(FieldValue::as_i64)
            .and_then(|q| u32::try_from(q).ok())
            .filter(|&q| q > 0)
            .unwrap_or(1);

        Self {
            id: doc.id.clone(),
            product_name: text(wire::PRODUCT_NAME),
            price,
            quantity,
            line_total: price.times(quantity),
            state: text(wire::STATE),
            image_url: text(wire::IMAGE),
            created_at: doc.get(wire::CREATED_AT).and_then(FieldValue::as_timestamp),
        }
    }
}

/// Reads the signed-in user's orders.
pub struct OrderHistory<'a> {
    store: &'a dyn DocumentStore,
    identity: &'a dyn IdentityProvider,
    collection: &'a str,
}

impl<'a> OrderHistory<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn DocumentStore,
        identity: &'a dyn IdentityProvider,
        collection: &'a str,
    ) -> Self {
        Self {
            store,
            identity,
            collection,
        }
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderHistoryError::NotSignedIn` before any read if nobody is
    /// signed in, and `OrderHistoryError::ReadFailure` if the query fails.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn load(&self) -> Result<Vec<OrderSummary>, OrderHistoryError> {
        let owner = self
            .identity
            .current_identity()
            .ok_or(OrderHistoryError::NotSignedIn)?
            .owner_id;

        let query = Query::all().order_by(wire::CREATED_AT, Direction::Descending);
        let docs = self
            .store
            .query_collection(self.collection, &query)
            .await
            .map_err(OrderHistoryError::ReadFailure)?;

        let orders: Vec<OrderSummary> = docs
            .iter()
            .filter(|doc| doc.string(wire::OWNER_ID) == Some(owner.as_str()))
            .map(OrderSummary::from_document)
            .collect();
        tracing::debug!(fetched = docs.len(), kept = orders.len(), "Loaded order history");

        Ok(orders)
    }
}
