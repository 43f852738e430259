//! Cloud Storage for Firebase uploads.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use super::{FirebaseAuth, endpoint, send_json};
use crate::backend::{BackendError, BlobStore};
use crate::config::FirebaseConfig;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    name: String,
    /// Comma-separated; the first token is used in download URLs.
    download_tokens: Option<String>,
}

/// Storage client for one bucket.
#[derive(Clone)]
pub struct FirebaseStorage {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    auth: FirebaseAuth,
}

impl FirebaseStorage {
    /// Create a client for the configured bucket.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &FirebaseConfig, auth: FirebaseAuth) -> Self {
        Self {
            client,
            base_url: config.storage_base_url.clone(),
            bucket: config.storage_bucket.clone(),
            auth,
        }
    }

    /// Public download URL for an object.
    fn download_url(&self, name: &str, token: Option<&str>) -> Result<Url, BackendError> {
        let mut url = endpoint(&self.base_url, &["b", &self.bucket, "o", name])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("alt", "media");
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl BlobStore for FirebaseStorage {
    #[instrument(skip(self, local_file), fields(path = %path))]
    async fn put_file(&self, path: &str, local_file: &Path) -> Result<String, BackendError> {
        let bytes = tokio::fs::read(local_file).await?;
        let size = bytes.len();

        let mut url = endpoint(&self.base_url, &["b", &self.bucket, "o"])?;
        url.query_pairs_mut().append_pair("name", path);

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type(local_file))
            .body(bytes);
        if let Some(token) = self.auth.id_token().await? {
            request = request.bearer_auth(token.expose_secret());
        }

        let response: UploadResponse = send_json(request).await?;
        let token = response
            .download_tokens
            .as_deref()
            .and_then(|t| t.split(',').next());
        let download_url = self.download_url(&response.name, token)?;
        tracing::info!(size, "Uploaded file");

        Ok(download_url.into())
    }
}

/// Content type guessed from the file extension.
fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn storage() -> FirebaseStorage {
        let config = FirebaseConfig::new("demo", SecretString::from("k"), "demo.appspot.com");
        let client = reqwest::Client::new();
        FirebaseStorage::new(client.clone(), &config, FirebaseAuth::new(client, &config))
    }

    #[test]
    fn test_download_url() {
        let url = storage()
            .download_url("products/mug.png", Some("tok-1"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/demo.appspot.com/o/products%2Fmug.png?alt=media&token=tok-1"
        );
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("a/B.JPG")), "image/jpeg");
        assert_eq!(content_type(Path::new("x.png")), "image/png");
        assert_eq!(content_type(Path::new("noext")), "application/octet-stream");
    }
}
