//! Cloud Firestore documents over REST.
//!
//! Writes go through `documents:commit` so a server timestamp can ride along
//! as a field transform; reads go through `documents:runQuery`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use pocket_store_core::DocumentId;

use super::value::{RawDocument, decode_document, encode_fields, encode_value};
use super::{FirebaseAuth, endpoint, send_json};
use crate::backend::{BackendError, Direction, Document, DocumentStore, Fields, Query};
use crate::config::FirebaseConfig;

#[derive(Deserialize)]
struct QueryResult {
    /// Absent on the progress-only entries the API interleaves with results.
    document: Option<RawDocument>,
}

/// Firestore client for the project's default database.
#[derive(Clone)]
pub struct FirestoreClient {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    api_key: SecretString,
    auth: FirebaseAuth,
}

impl FirestoreClient {
    /// Create a client authorizing as whoever is signed in to `auth`.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &FirebaseConfig, auth: FirebaseAuth) -> Self {
        Self {
            client,
            base_url: config.firestore_base_url.clone(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            auth,
        }
    }

    /// Resource name of the database's document root.
    fn documents_root(&self) -> String {
        format!("projects/{}/databases/(default)/documents", self.project_id)
    }

    /// URL of a database-level method such as `documents:commit`.
    fn method_url(&self, method: &str) -> Result<Url, BackendError> {
        let mut url = endpoint(
            &self.base_url,
            &["projects", &self.project_id, "databases", "(default)", method],
        )?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    async fn post(&self, url: Url, body: &Value) -> Result<reqwest::RequestBuilder, BackendError> {
        let request = self.client.post(url).json(body);
        Ok(match self.auth.id_token().await? {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        })
    }

    /// Write one document; `create_only` fails if it already exists.
    async fn commit(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: &Fields,
        create_only: bool,
    ) -> Result<(), BackendError> {
        let name = format!("{}/{collection}/{id}", self.documents_root());
        let (encoded, server_timestamps) = encode_fields(fields);

        let mut write = json!({
            "update": { "name": name, "fields": encoded },
        });
        if !server_timestamps.is_empty() {
            write["updateTransforms"] = server_timestamps
                .iter()
                .map(|field| json!({ "fieldPath": field, "setToServerValue": "REQUEST_TIME" }))
                .collect();
        }
        if create_only {
            write["currentDocument"] = json!({ "exists": false });
        }

        let request = self
            .post(self.method_url("documents:commit")?, &json!({ "writes": [write] }))
            .await?;
        let _: Value = send_json(request).await.map_err(|e| match e {
            BackendError::Api { status: 409, .. } => {
                BackendError::Conflict(format!("{collection}/{id} already exists"))
            }
            other => other,
        })?;

        Ok(())
    }

    fn structured_query(collection: &str, query: &Query) -> Result<Value, BackendError> {
        let mut structured = json!({ "from": [{ "collectionId": collection }] });

        if let Some(filter) = &query.filter {
            let value = encode_value(&filter.value).ok_or_else(|| {
                BackendError::Parse("cannot filter on a server timestamp".to_owned())
            })?;
            structured["where"] = json!({
                "fieldFilter": {
                    "field": { "fieldPath": filter.field },
                    "op": "EQUAL",
                    "value": value,
                }
            });
        }

        if let Some(order) = &query.order_by {
            let direction = match order.direction {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            structured["orderBy"] = json!([{
                "field": { "fieldPath": order.field },
                "direction": direction,
            }]);
        }

        Ok(json!({ "structuredQuery": structured }))
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip_all, fields(collection = %collection))]
    async fn add_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> Result<DocumentId, BackendError> {
        let id = DocumentId::new(Uuid::new_v4().simple().to_string());
        self.commit(collection, &id, &fields, true).await?;
        tracing::debug!(document_id = %id, "Document added");
        Ok(id)
    }

    #[instrument(skip_all, fields(collection = %collection, document_id = %id))]
    async fn set_document(
        &self,
        collection: &str,
        id: &DocumentId,
        fields: Fields,
    ) -> Result<(), BackendError> {
        self.commit(collection, id, &fields, false).await
    }

    #[instrument(skip_all, fields(collection = %collection))]
    async fn query_collection(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, BackendError> {
        let body = Self::structured_query(collection, query)?;
        let request = self.post(self.method_url("documents:runQuery")?, &body).await?;
        let results: Vec<QueryResult> = send_json(request).await?;

        let documents = results
            .into_iter()
            .filter_map(|r| r.document)
            .map(decode_document)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = documents.len(), "Query returned");

        Ok(documents)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::FieldValue;

    #[test]
    fn test_structured_query_shape() {
        let query = Query::all()
            .where_eq("userId", "u1")
            .order_by("createdAt", Direction::Descending);
        let body = FirestoreClient::structured_query("addresses", &query).unwrap();

        assert_eq!(
            body,
            json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "addresses" }],
                    "where": {
                        "fieldFilter": {
                            "field": { "fieldPath": "userId" },
                            "op": "EQUAL",
                            "value": { "stringValue": "u1" }
                        }
                    },
                    "orderBy": [{
                        "field": { "fieldPath": "createdAt" },
                        "direction": "DESCENDING"
                    }]
                }
            })
        );
    }

    #[test]
    fn test_unfiltered_query_has_only_from() {
        let body = FirestoreClient::structured_query("products", &Query::all()).unwrap();
        assert_eq!(
            body,
            json!({ "structuredQuery": { "from": [{ "collectionId": "products" }] } })
        );
    }

    #[test]
    fn test_server_timestamp_filter_rejected() {
        let query = Query::all().where_eq("createdAt", FieldValue::ServerTimestamp);
        assert!(FirestoreClient::structured_query("c", &query).is_err());
    }

    #[test]
    fn test_method_url() {
        let config = FirebaseConfig::new("demo", SecretString::from("k"), "demo.appspot.com");
        let client = reqwest::Client::new();
        let firestore =
            FirestoreClient::new(client.clone(), &config, FirebaseAuth::new(client, &config));

        let url = firestore.method_url("documents:commit").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents:commit?key=k"
        );
    }
}
