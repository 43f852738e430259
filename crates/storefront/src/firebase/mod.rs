//! Firebase REST clients.
//!
//! Production implementations of the [`backend`](crate::backend) traits:
//!
//! - [`FirebaseAuth`] - Identity Toolkit email/password accounts
//! - [`FirestoreClient`] - Cloud Firestore documents
//! - [`FirebaseStorage`] - Cloud Storage for Firebase uploads
//!
//! The three share one HTTP client, and the Firestore and Storage clients
//! authorize their requests with the ID token of whoever is signed in through
//! [`FirebaseAuth`]. Base URLs come from [`FirebaseConfig`] so the local
//! emulators can stand in for production.

pub mod auth;
pub mod firestore;
pub mod storage;
mod value;

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

pub use auth::{FirebaseAuth, StoredSession};
pub use firestore::FirestoreClient;
pub use storage::FirebaseStorage;

use crate::backend::BackendError;
use crate::config::FirebaseConfig;

/// Request timeout for every Firebase call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Clients for one Firebase project.
#[derive(Clone)]
pub struct FirebaseApp {
    auth: FirebaseAuth,
    firestore: FirestoreClient,
    storage: FirebaseStorage,
}

impl FirebaseApp {
    /// Create clients for the configured project.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("pocket-store/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let auth = FirebaseAuth::new(client.clone(), config);
        let firestore = FirestoreClient::new(client.clone(), config, auth.clone());
        let storage = FirebaseStorage::new(client, config, auth.clone());

        Ok(Self {
            auth,
            firestore,
            storage,
        })
    }

    #[must_use]
    pub const fn auth(&self) -> &FirebaseAuth {
        &self.auth
    }

    #[must_use]
    pub const fn firestore(&self) -> &FirestoreClient {
        &self.firestore
    }

    #[must_use]
    pub const fn storage(&self) -> &FirebaseStorage {
        &self.storage
    }
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Append path segments to a base URL, percent-encoding each one.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url, BackendError> {
    let mut url = Url::parse(base)
        .map_err(|e| BackendError::Parse(format!("invalid base URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| BackendError::Parse(format!("base URL cannot take a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Pull the message out of a Google API error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body).map_or_else(
        |_| body.chars().take(200).collect(),
        |envelope| envelope.error.message,
    )
}

/// Send a request and decode its JSON body, mapping error statuses.
pub(crate) async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, BackendError> {
    let response = request.send().await?;
    let status = response.status();

    // Get response body as text first for better error diagnostics
    let body = response.text().await?;

    if !status.is_success() {
        let message = api_error_message(&body);
        tracing::debug!(status = %status, message = %message, "Firebase returned non-success status");
        return Err(match status.as_u16() {
            401 => BackendError::Unauthenticated,
            404 => BackendError::NotFound(message),
            503 => BackendError::Unavailable(message),
            code => BackendError::Api {
                status: code,
                message,
            },
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "Failed to parse Firebase response"
        );
        BackendError::Parse(e.to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = endpoint(
            "https://firebasestorage.googleapis.com/v0/",
            &["b", "shop.appspot.com", "o", "products/mug.png"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/shop.appspot.com/o/products%2Fmug.png"
        );
    }

    #[test]
    fn test_endpoint_keeps_firestore_verbs() {
        let url = endpoint(
            "http://127.0.0.1:8080/v1",
            &["projects", "demo", "databases", "(default)", "documents:runQuery"],
        )
        .unwrap();
        assert_eq!(
            url.path(),
            "/v1/projects/demo/databases/(default)/documents:runQuery"
        );
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert_eq!(api_error_message(body), "EMAIL_EXISTS");
        assert_eq!(api_error_message("gateway timeout"), "gateway timeout");
    }
}
