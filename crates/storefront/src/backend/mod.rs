//! Remote service interfaces.
//!
//! The storefront talks to three collaborators, each behind an async trait so
//! the flows can run against the Firebase REST clients in production and the
//! in-memory [`memory`] implementations in tests:
//!
//! - [`IdentityProvider`] - who is signed in; sign up, sign in, sign out
//! - [`DocumentStore`] - schemaless documents grouped in named collections
//! - [`BlobStore`] - file uploads that yield a public download URL
//!
//! Documents are flat maps of [`FieldValue`]s. Writers that want the
//! service's clock instead of the device's put [`FieldValue::ServerTimestamp`]
//! in a field; each store resolves it at write time.

pub mod memory;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use thiserror::Error;

use pocket_store_core::{DocumentId, Email, OwnerId};

/// Errors returned by any backend implementation.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// A response could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The requested document or file does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation needs a signed-in user.
    #[error("not signed in")]
    Unauthenticated,

    /// Wrong email or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The resource already exists (e.g. email already registered).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The service could not take the request.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// Documents
// =============================================================================

/// A single field value in a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    /// Placeholder replaced by the store's clock when the document is written.
    ServerTimestamp,
}

impl FieldValue {
    /// The string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as an integer, truncating doubles.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // quantities are small whole numbers
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Double(d) if d.is_finite() => Some(d.trunc() as i64),
            _ => None,
        }
    }

    /// The value as a timestamp.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Loosely typed JSON view, used where documents carry numbers as text.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::ServerTimestamp => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Double(d) => serde_json::Number::from_f64(*d)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        }
    }

    /// Ordering used by queries: null < bool < number < timestamp < string.
    #[must_use]
    pub fn query_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &FieldValue) -> u8 {
            match v {
                FieldValue::Null => 0,
                FieldValue::Bool(_) => 1,
                FieldValue::Integer(_) | FieldValue::Double(_) => 2,
                FieldValue::Timestamp(_) | FieldValue::ServerTimestamp => 3,
                FieldValue::String(_) => 4,
            }
        }

        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Integer(a), Self::Double(b)) => (*a as f64).total_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Double(a), Self::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Self::Double(a), Self::Double(b)) => a.total_cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

/// Field map of a document, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// A stored document with its ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    /// Field value by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// String field by name; missing or non-string fields read as `None`.
    #[must_use]
    pub fn string(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Sort direction for [`OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality filter on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: FieldValue,
}

/// Sort order for query results.
///
/// Documents that lack the sort field are excluded from the results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A collection query: optional equality filter plus optional ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<FieldFilter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// A query that returns the whole collection in store order.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep only documents whose `field` equals `value`.
    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.to_owned(),
            value: value.into(),
        });
        self
    }

    /// Sort by `field`.
    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_owned(),
            direction,
        });
        self
    }
}

// =============================================================================
// Service traits
// =============================================================================

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub owner_id: OwnerId,
    pub email: Option<Email>,
}

/// Authentication service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any.
    fn current_identity(&self) -> Option<Identity>;

    /// Create an account and sign it in.
    async fn sign_up(&self, email: &Email, password: &SecretString)
    -> Result<Identity, BackendError>;

    /// Sign in with email and password.
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<Identity, BackendError>;

    /// Forget the signed-in user.
    fn sign_out(&self);
}

/// Remote document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add a document with a store-assigned ID.
    async fn add_document(&self, collection: &str, fields: Fields)
    -> Result<DocumentId, BackendError>;

    /// Create or overwrite the document with the given ID.
    async fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), BackendError>;

    /// Run a query against one collection.
    async fn query_collection(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, BackendError>;
}

/// Remote file storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file to `path` and return its public download URL.
    async fn put_file(&self, path: &str, local_file: &Path) -> Result<String, BackendError>;
}
