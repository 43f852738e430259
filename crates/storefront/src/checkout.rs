//! Order submission.
//!
//! Checkout turns an address plus a list of [`OrderLine`]s into one order
//! document per line. The writes are independent: they are dispatched
//! concurrently, every result is collected, and the outcome is returned as a
//! [`SubmissionReport`]. A failed write does not undo the ones that landed,
//! and nothing is retried. Resubmitting the same lines writes new documents.
//!
//! Each line becomes its own order; lines from one checkout share an address,
//! owner and approximate creation time but are not otherwise linked.

use futures::future::join_all;
use rust_decimal::prelude::ToPrimitive;
use thiserror::Error;
use tracing::instrument;

use pocket_store_core::{Address, AddressError, DocumentId, OwnerId, Price};

use crate::backend::{BackendError, DocumentStore, FieldValue, Fields, IdentityProvider};
use crate::cart::OrderLine;

/// Field names of order documents.
pub mod wire {
    pub const OWNER_ID: &str = "userId";
    pub const RECIPIENT_NAME: &str = "name";
    pub const PHONE: &str = "phone";
    pub const STREET: &str = "street";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const POSTAL_CODE: &str = "postalCode";
    pub const IMAGE: &str = "img";
    pub const PRODUCT_NAME: &str = "ProductName";
    pub const PRICE: &str = "price";
    pub const QUANTITY: &str = "quantity";
    pub const CREATED_AT: &str = "createdAt";
}

/// Reasons a checkout is rejected before anything is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("please sign in to place an order")]
    NotSignedIn,

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("there is nothing to order")]
    NoItems,
}

/// Checkout errors.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Rejected up front; no writes were attempted.
    #[error("checkout rejected: {0}")]
    Validation(#[from] ValidationError),

    /// At least one order write failed. Writes listed in the report's
    /// `written` were persisted and stay persisted.
    #[error(
        "failed to submit order: {} of {} writes failed",
        .0.failures.len(),
        .0.attempted()
    )]
    WriteFailure(SubmissionReport),
}

impl CheckoutError {
    /// Message to show the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.to_string(),
            Self::WriteFailure(_) => "Failed to submit data".to_owned(),
        }
    }
}

/// One order write that did not go through.
#[derive(Debug)]
pub struct FailedWrite {
    /// Position of the line in the submitted list.
    pub index: usize,
    pub product_name: String,
    pub error: BackendError,
}

/// An order line that was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOrder {
    /// Position of the line in the submitted list.
    pub index: usize,
    pub id: DocumentId,
}

/// Outcome of every write in one submission.
#[derive(Debug, Default)]
pub struct SubmissionReport {
    /// Documents written, in line order.
    pub written: Vec<WrittenOrder>,
    pub failures: Vec<FailedWrite>,
}

impl SubmissionReport {
    /// Number of writes dispatched.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.written.len() + self.failures.len()
    }

    /// Whether every write succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One order document: a single line plus the buyer and shipping address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub owner_id: OwnerId,
    pub address: Address,
    pub product_name: String,
    pub price: Price,
    pub quantity: u32,
    pub image_url: String,
}

impl OrderRecord {
    #[must_use]
    pub fn new(owner_id: &OwnerId, address: &Address, line: &OrderLine) -> Self {
        Self {
            owner_id: owner_id.clone(),
            address: address.clone(),
            product_name: line.product_name.clone(),
            price: line.unit_price,
            quantity: line.quantity.max(1),
            image_url: line.image_url.clone(),
        }
    }

    /// Document fields; the creation time is left for the store to assign.
    #[must_use]
    pub fn to_fields(&self) -> Fields {
        fn field(name: &str, value: impl Into<FieldValue>) -> (String, FieldValue) {
            (name.to_owned(), value.into())
        }

        let price = self.price.amount().to_f64().unwrap_or(0.0);
        let address = &self.address;

        Fields::from([
            field(wire::OWNER_ID, self.owner_id.as_str()),
            field(wire::RECIPIENT_NAME, address.recipient_name.as_str()),
            field(wire::PHONE, address.phone.as_str()),
            field(wire::STREET, address.street.as_str()),
            field(wire::CITY, address.city.as_str()),
            field(wire::STATE, address.state.as_str()),
            field(wire::POSTAL_CODE, address.postal_code.as_str()),
            field(wire::IMAGE, self.image_url.as_str()),
            field(wire::PRODUCT_NAME, self.product_name.as_str()),
            field(wire::PRICE, price),
            field(wire::QUANTITY, self.quantity),
            field(wire::CREATED_AT, FieldValue::ServerTimestamp),
        ])
    }
}

/// Writes checkout orders to the document store.
pub struct OrderSubmitter<'a> {
    store: &'a dyn DocumentStore,
    identity: &'a dyn IdentityProvider,
    collection: &'a str,
}

impl<'a> OrderSubmitter<'a> {
    /// Create a submitter writing to `collection`.
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

    /// Submit `items` for the signed-in user.
    ///
    /// # Errors
    ///
    /// See [`OrderSubmitter::submit_as`].
    pub async fn submit(
        &self,
        address: &Address,
        items: &[OrderLine],
    ) -> Result<SubmissionReport, CheckoutError> {
        let owner = self.identity.current_identity().map(|i| i.owner_id);
        self.submit_as(owner.as_ref(), address, items).await
    }

    /// Submit `items` on behalf of `owner`.
    ///
    /// Checks, in order, that there is an owner, that every address field is
    /// filled in, and that there is at least one line. Address fields are
    /// stored trimmed.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Validation` without writing anything if a
    /// check fails, and `CheckoutError::WriteFailure` if any write fails.
    #[instrument(skip(self, owner, address, items), fields(collection = %self.collection, lines = items.len()))]
    pub async fn submit_as(
        &self,
        owner: Option<&OwnerId>,
        address: &Address,
        items: &[OrderLine],
    ) -> Result<SubmissionReport, CheckoutError> {
        let owner = owner.ok_or(ValidationError::NotSignedIn)?;
        let address = address.trimmed().map_err(ValidationError::from)?;
        if items.is_empty() {
            return Err(ValidationError::NoItems.into());
        }

        let records: Vec<OrderRecord> = items
            .iter()
            .map(|line| OrderRecord::new(owner, &address, line))
            .collect();

        let results = join_all(
            records
                .iter()
                .map(|record| self.store.add_document(self.collection, record.to_fields())),
        )
        .await;

        let mut report = SubmissionReport::default();
        for (index, (record, result)) in records.iter().zip(results).enumerate() {
            match result {
                Ok(id) => report.written.push(WrittenOrder { index, id }),
                Err(error) => {
                    tracing::warn!(index, product = %record.product_name, error = %error, "Order write failed");
                    report.failures.push(FailedWrite {
                        index,
                        product_name: record.product_name.clone(),
                        error,
                    });
                }
            }
        }

        if report.is_complete() {
            tracing::info!(written = report.written.len(), "Order submitted");
            Ok(report)
        } else {
            tracing::error!(
                written = report.written.len(),
                failed = report.failures.len(),
                "Order submission partially failed"
            );
            Err(CheckoutError::WriteFailure(report))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryDocumentStore, MemoryIdentityProvider};
    use pocket_store_core::AddressField;

    const ORDERS: &str = "addresses";

    fn address() -> Address {
        Address {
            recipient_name: " Ada Lovelace ".to_string(),
            phone: "555-0100".to_string(),
            street: "12 Analytical Way".to_string(),
            city: "London".to_string(),
            state: "LDN".to_string(),
            postal_code: "10001".to_string(),
        }
    }

    fn line(name: &str, cents: i64, quantity: u32) -> OrderLine {
        OrderLine {
            product_name: name.to_string(),
            unit_price: Price::from_cents(cents),
            quantity,
            image_url: format!("https://img.test/{name}.png"),
        }
    }

    #[test]
    fn test_order_record_fields() {
        let record = OrderRecord::new(
            &OwnerId::new("u1"),
            &address().trimmed().unwrap(),
            &line("Mug", 1250, 3),
        );
        let fields = record.to_fields();

        assert_eq!(fields.len(), 12);
        assert_eq!(fields[wire::OWNER_ID], FieldValue::from("u1"));
        assert_eq!(fields[wire::RECIPIENT_NAME], FieldValue::from("Ada Lovelace"));
        assert_eq!(fields[wire::PRODUCT_NAME], FieldValue::from("Mug"));
        assert_eq!(fields[wire::PRICE], FieldValue::Double(12.5));
        assert_eq!(fields[wire::QUANTITY], FieldValue::Integer(3));
        assert_eq!(fields[wire::CREATED_AT], FieldValue::ServerTimestamp);
    }

    #[tokio::test]
    async fn test_not_signed_in_rejected_first() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::new();
        let submitter = OrderSubmitter::new(&store, &identity, ORDERS);

        // Address is also invalid; authentication is checked first.
        let err = submitter
            .submit(&Address::default(), &[line("Mug", 100, 1)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::NotSignedIn)
        ));
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_blank_field_rejected_without_writes() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::signed_in("u1");
        let submitter = OrderSubmitter::new(&store, &identity, ORDERS);

        let bad = Address {
            postal_code: "  ".to_string(),
            ..address()
        };
        let err = submitter
            .submit(&bad, &[line("Mug", 100, 1)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::Address(AddressError::MissingFields(ref f)))
                if f == &[AddressField::PostalCode]
        ));
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::signed_in("u1");
        let submitter = OrderSubmitter::new(&store, &identity, ORDERS);

        let err = submitter.submit(&address(), &[]).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Validation(ValidationError::NoItems)
        ));
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_one_document_per_line() {
        let store = MemoryDocumentStore::new();
        let identity = MemoryIdentityProvider::signed_in("u1");
        let submitter = OrderSubmitter::new(&store, &identity, ORDERS);

        let report = submitter
            .submit(&address(), &[line("Mug", 1000, 2), line("Tea", 550, 1)])
            .await
            .unwrap();

        assert_eq!(report.written.len(), 2);
        let docs = store.documents(ORDERS);
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.string(wire::OWNER_ID) == Some("u1")));
        assert!(docs.iter().all(|d| d.string(wire::CITY) == Some("London")));
        assert_eq!(docs[0].string(wire::PRODUCT_NAME), Some("Mug"));
        assert_eq!(docs[1].get(wire::PRICE), Some(&FieldValue::Double(5.5)));
    }

    #[tokio::test]
    async fn test_partial_failure_reports_and_keeps_earlier_writes() {
        let store = MemoryDocumentStore::new().fail_nth_write(2);
        let identity = MemoryIdentityProvider::signed_in("u1");
        let submitter = OrderSubmitter::new(&store, &identity, ORDERS);

        let err = submitter
            .submit(
                &address(),
                &[line("A", 100, 1), line("B", 200, 1), line("C", 300, 1)],
            )
            .await
            .unwrap_err();

        let CheckoutError::WriteFailure(report) = &err else {
            panic!("expected write failure, got {err:?}");
        };
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].product_name, "B");
        let written: Vec<_> = report.written.iter().map(|w| w.index).collect();
        assert_eq!(written, vec![0, 2]);
        assert_eq!(err.user_message(), "Failed to submit data");

        let docs = store.documents(ORDERS);
        let names: Vec<_> = docs
            .iter()
            .map(|d| d.string(wire::PRODUCT_NAME).unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
        let c = docs.iter().find(|d| d.string(wire::PRODUCT_NAME) == Some("C")).unwrap();
        assert_eq!(c.id, report.written[1].id);
    }
}
