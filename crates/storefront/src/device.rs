//! Local key-value storage for the device.
//!
//! A single JSON object of string keys to string values, kept in one file.
//! Every change rewrites the whole file through a temporary sibling and a
//! rename, so a crash leaves either the old contents or the new ones.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;

/// Keys written by the storefront.
pub mod keys {
    pub const PROFILE_IMAGE: &str = "profileImage";
    pub const USER_NAME: &str = "userName";
    pub const USER_EMAIL: &str = "userEmail";
    pub const AUTH_SESSION: &str = "authSession";

    /// Keys cleared on logout.
    pub const PROFILE: [&str; 3] = [PROFILE_IMAGE, USER_NAME, USER_EMAIL];
}

/// Device storage errors.
#[derive(Debug, Error)]
pub enum DeviceStorageError {
    #[error("device storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device storage file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// File-backed string map.
pub struct DeviceStorage {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl DeviceStorage {
    /// Open the storage file, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, DeviceStorageError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| DeviceStorageError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), "Opened device storage");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), DeviceStorageError> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_owned(), value.to_owned());
        self.persist(&entries).await
    }

    /// Remove several keys in one write.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn remove_many(&self, keys: &[&str]) -> Result<(), DeviceStorageError> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        self.persist(&entries).await
    }

    /// Read a JSON-encoded value. Undecodable values read as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        serde_json::from_str(&raw)
            .inspect_err(|e| tracing::warn!(key, error = %e, "Ignoring undecodable stored value"))
            .ok()
    }

    /// Store a value as JSON.
    ///
    /// # Errors
    ///
    /// Returns error if encoding or writing fails.
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), DeviceStorageError> {
        let raw = serde_json::to_string(value).map_err(|source| DeviceStorageError::Encode {
            key: key.to_owned(),
            source,
        })?;
        self.set(key, &raw).await
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), DeviceStorageError> {
        let bytes = serde_json::to_vec_pretty(entries).map_err(|source| {
            DeviceStorageError::Encode {
                key: "*".to_owned(),
                source,
            }
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
