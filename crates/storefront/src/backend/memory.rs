//! In-memory backends for tests and offline development.
//!
//! All three stores are cheap to clone (shared `Arc` state) so a test can keep
//! a handle for inspection while the flow under test borrows another.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use pocket_store_core::{DocumentId, Email, OwnerId};

use super::{
    BackendError, BlobStore, Direction, Document, DocumentStore, FieldValue, Fields, Identity,
    IdentityProvider, Query,
};

fn poisoned(operation: &str) -> BackendError {
    BackendError::Unavailable(format!("lock poisoned during {operation}"))
}

// =============================================================================
// Documents
// =============================================================================

struct DocumentState {
    collections: HashMap<String, Vec<Document>>,
    /// Write attempts so far, including failed ones.
    write_attempts: usize,
    /// 1-based write attempts that should fail.
    failing_writes: HashSet<usize>,
    /// Fail every query while set.
    failing_reads: bool,
    /// Clock origin for server timestamps.
    epoch: DateTime<Utc>,
    ticks: i64,
}

impl DocumentState {
    /// Next server timestamp; strictly increasing per store.
    fn now(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        self.epoch + Duration::milliseconds(self.ticks)
    }

    fn resolve(&mut self, mut fields: Fields) -> Fields {
        if fields.values().any(|v| *v == FieldValue::ServerTimestamp) {
            let now = self.now();
            for value in fields.values_mut() {
                if *value == FieldValue::ServerTimestamp {
                    *value = FieldValue::Timestamp(now);
                }
            }
        }
        fields
    }

    fn begin_write(&mut self, collection: &str) -> Result<(), BackendError> {
        self.write_attempts += 1;
        if self.failing_writes.contains(&self.write_attempts) {
            tracing::debug!(
                attempt = self.write_attempts,
                collection,
                "Injected write failure"
            );
            return Err(BackendError::Unavailable(format!(
                "injected failure on write {}",
                self.write_attempts
            )));
        }
        Ok(())
    }
}

/// Document store backed by a `HashMap` of collections.
#[derive(Clone)]
pub struct MemoryDocumentStore {
    state: Arc<RwLock<DocumentState>>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(DocumentState {
                collections: HashMap::new(),
                write_attempts: 0,
                failing_writes: HashSet::new(),
                failing_reads: false,
                epoch: Utc::now(),
                ticks: 0,
            })),
        }
    }

    /// Make the `n`th write attempt (1-based, counted from store creation) fail.
    #[must_use]
    pub fn fail_nth_write(self, n: usize) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.failing_writes.insert(n);
        }
        self
    }

    /// Make queries fail (or succeed again).
    pub fn set_reads_failing(&self, failing: bool) {
        if let Ok(mut state) = self.state.write() {
            state.failing_reads = failing;
        }
    }

    /// Number of write attempts so far, including failed ones.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.state.read().map_or(0, |s| s.write_attempts)
    }

    /// Snapshot of a collection in insertion order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.collections.get(collection).cloned())
            .unwrap_or_default()
    }

    /// Insert a document directly, bypassing write counting and failure injection.
    ///
    /// Server timestamps are still resolved so seeded data sorts correctly.
    pub fn seed(&self, collection: &str, id: impl Into<DocumentId>, fields: Fields) {
        if let Ok(mut state) = self.state.write() {
            let fields = state.resolve(fields);
            state
                .collections
                .entry(collection.to_owned())
                .or_default()
                .push(Document {
                    id: id.into(),
                    fields,
                });
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> Result<DocumentId, BackendError> {
        let mut state = self.state.write().map_err(|_| poisoned("add_document"))?;
        state.begin_write(collection)?;

        let id = DocumentId::new(Uuid::new_v4().simple().to_string());
        let fields = state.resolve(fields);
        state
            .collections
            .entry(collection.to_owned())
            .or_default()
            .push(Document {
                id: id.clone(),
                fields,
            });

        Ok(id)
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().map_err(|_| poisoned("set_document"))?;
        state.begin_write(collection)?;

        let fields = state.resolve(fields);
        let docs = state.collections.entry(collection.to_owned()).or_default();
        match docs.iter_mut().find(|d| &d.id == id) {
            Some(existing) => existing.fields = fields,
            None => docs.push(Document {
                id: id.clone(),
                fields,
            }),
        }

        Ok(())
    }

    async fn query_collection(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, BackendError> {
        let state = self
            .state
            .read()
            .map_err(|_| poisoned("query_collection"))?;
        if state.failing_reads {
            return Err(BackendError::Unavailable(format!(
                "injected failure reading {collection}"
            )));
        }

        let mut docs: Vec<Document> = state
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| {
                        query
                            .filter
                            .as_ref()
                            .is_none_or(|f| doc.get(&f.field) == Some(&f.value))
                    })
                    .filter(|doc| {
                        query
                            .order_by
                            .as_ref()
                            .is_none_or(|o| doc.fields.contains_key(&o.field))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            docs.sort_by(|a, b| {
                let ordering = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => x.query_cmp(y),
                    _ => std::cmp::Ordering::Equal,
                };
                match order.direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        Ok(docs)
    }
}

// =============================================================================
// Identity
// =============================================================================

#[derive(Default)]
struct IdentityState {
    /// Registered accounts keyed by email: (uid, password).
    accounts: HashMap<String, (OwnerId, String)>,
    current: Option<Identity>,
}

/// Identity provider with a local account table.
#[derive(Clone, Default)]
pub struct MemoryIdentityProvider {
    state: Arc<RwLock<IdentityState>>,
}

impl MemoryIdentityProvider {
    /// A provider with nobody signed in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider already signed in as `owner_id`.
    #[must_use]
    pub fn signed_in(owner_id: impl Into<OwnerId>) -> Self {
        let provider = Self::new();
        if let Ok(mut state) = provider.state.write() {
            state.current = Some(Identity {
                owner_id: owner_id.into(),
                email: None,
            });
        }
        provider
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.state.read().ok().and_then(|s| s.current.clone())
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, BackendError> {
        let mut state = self.state.write().map_err(|_| poisoned("sign_up"))?;
        if state.accounts.contains_key(email.as_str()) {
            return Err(BackendError::Conflict(
                "email address is already in use".to_owned(),
            ));
        }

        let owner_id = OwnerId::new(Uuid::new_v4().simple().to_string());
        state.accounts.insert(
            email.as_str().to_owned(),
            (owner_id.clone(), password.expose_secret().to_owned()),
        );

        let identity = Identity {
            owner_id,
            email: Some(email.clone()),
        };
        state.current = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, BackendError> {
        let mut state = self.state.write().map_err(|_| poisoned("sign_in"))?;
        let owner_id = match state.accounts.get(email.as_str()) {
            Some((owner_id, stored)) if stored == password.expose_secret() => owner_id.clone(),
            _ => return Err(BackendError::InvalidCredentials),
        };

        let identity = Identity {
            owner_id,
            email: Some(email.clone()),
        };
        state.current = Some(identity.clone());
        Ok(identity)
    }

    fn sign_out(&self) {
        if let Ok(mut state) = self.state.write() {
            state.current = None;
        }
    }
}

// =============================================================================
// Blobs
// =============================================================================

#[derive(Default)]
struct BlobState {
    files: HashMap<String, Vec<u8>>,
    unavailable: bool,
}

/// Blob store that keeps uploaded bytes in memory.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    state: Arc<RwLock<BlobState>>,
}

impl MemoryBlobStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload fail.
    #[must_use]
    pub fn unavailable(self) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.unavailable = true;
        }
        self
    }

    /// Bytes stored at `path`.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.read().ok().and_then(|s| s.files.get(path).cloned())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_file(&self, path: &str, local_file: &Path) -> Result<String, BackendError> {
        if self.state.read().map_err(|_| poisoned("put_file"))?.unavailable {
            return Err(BackendError::Unavailable("blob store offline".to_owned()));
        }

        let bytes = tokio::fs::read(local_file).await?;
        self.state
            .write()
            .map_err(|_| poisoned("put_file"))?
            .files
            .insert(path.to_owned(), bytes);

        Ok(format!("memory://{path}"))
    }
}
