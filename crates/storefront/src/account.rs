//! Account and profile management.
//!
//! Sign-up creates the auth user and then a `users/{uid}` record. The profile
//! shown in the app (name, email, photo) lives in device storage, not in the
//! document store.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use pocket_store_core::{DocumentId, Email, EmailError};

use crate::backend::{BackendError, DocumentStore, FieldValue, Fields, Identity, IdentityProvider};
use crate::device::{DeviceStorage, DeviceStorageError, keys};

/// Minimum password length enforced by the auth service.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Field names of user records.
pub mod wire {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const CREATED_AT: &str = "createdAt";
}

/// Account errors.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("please fill in all fields")]
    MissingFields,

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("password must be at least {} characters", MIN_PASSWORD_LENGTH)]
    WeakPassword,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth user was created but the user record was not written.
    #[error("account created but profile record failed: {0}")]
    ProfileRecord(#[source] BackendError),

    #[error("auth service error: {0}")]
    Backend(#[source] BackendError),

    #[error(transparent)]
    Device(#[from] DeviceStorageError),
}

impl AccountError {
    /// Message to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingFields => "Please fill in all fields".to_owned(),
            Self::InvalidEmail(_) => "Invalid email address".to_owned(),
            Self::WeakPassword | Self::EmailTaken | Self::InvalidCredentials => self.to_string(),
            Self::ProfileRecord(_) | Self::Backend(_) => "Authentication error".to_owned(),
            Self::Device(_) => "Could not save settings on this device".to_owned(),
        }
    }
}

impl From<BackendError> for AccountError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict(_) => Self::EmailTaken,
            BackendError::InvalidCredentials => Self::InvalidCredentials,
            other => Self::Backend(other),
        }
    }
}

/// What the profile screen shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image_uri: Option<String>,
}

/// Sign-up, login and profile operations.
pub struct AccountService<'a> {
    identity: &'a dyn IdentityProvider,
    store: &'a dyn DocumentStore,
    device: &'a DeviceStorage,
    users_collection: &'a str,
}

impl<'a> AccountService<'a> {
    #[must_use]
    pub const fn new(
        identity: &'a dyn IdentityProvider,
        store: &'a dyn DocumentStore,
        device: &'a DeviceStorage,
        users_collection: &'a str,
    ) -> Self {
        Self {
            identity,
            store,
            device,
            users_collection,
        }
    }

    /// Create an account and its user record.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::MissingFields`, `InvalidEmail` or `WeakPassword`
    /// before contacting the auth service, `EmailTaken` if the email is
    /// registered, and `ProfileRecord` if the user record write fails.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AccountError> {
        let name = name.trim();
        if name.is_empty() || email.trim().is_empty() || password.expose_secret().is_empty() {
            return Err(AccountError::MissingFields);
        }
        let email = Email::parse(email)?;
        validate_password(password)?;

        let identity = self.identity.sign_up(&email, password).await?;

        let record = Fields::from([
            (wire::NAME.to_owned(), FieldValue::from(name)),
            (wire::EMAIL.to_owned(), FieldValue::from(email.as_str())),
            (wire::CREATED_AT.to_owned(), FieldValue::ServerTimestamp),
        ]);
        self.store
            .set_document(
                self.users_collection,
                &DocumentId::new(identity.owner_id.as_str()),
                record,
            )
            .await
            .map_err(AccountError::ProfileRecord)?;

        tracing::info!(user_id = %identity.owner_id, "Account created");
        Ok(identity)
    }

    /// Sign in and remember the email on this device.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::MissingFields` or `InvalidEmail` before
    /// contacting the auth service, and `InvalidCredentials` on a bad login.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn log_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AccountError> {
        if email.trim().is_empty() || password.expose_secret().is_empty() {
            return Err(AccountError::MissingFields);
        }
        let email = Email::parse(email)?;

        let identity = self.identity.sign_in(&email, password).await?;
        self.device.set(keys::USER_EMAIL, email.as_str()).await?;

        tracing::info!(user_id = %identity.owner_id, "Logged in");
        Ok(identity)
    }

    /// The stored profile.
    pub async fn profile(&self) -> Profile {
        Profile {
            name: self.device.get(keys::USER_NAME).await,
            email: self.device.get(keys::USER_EMAIL).await,
            image_uri: self.device.get(keys::PROFILE_IMAGE).await,
        }
    }

    /// Change the display name.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::MissingFields` for a blank name, or a device
    /// storage error.
    pub async fn rename(&self, name: &str) -> Result<(), AccountError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AccountError::MissingFields);
        }
        self.device.set(keys::USER_NAME, name).await?;
        Ok(())
    }

    /// Remember a profile photo by URI.
    ///
    /// # Errors
    ///
    /// Returns a device storage error if the write fails.
    pub async fn set_profile_image(&self, uri: &str) -> Result<(), AccountError> {
        self.device.set(keys::PROFILE_IMAGE, uri).await?;
        Ok(())
    }

    /// Forget the profile and sign out.
    ///
    /// # Errors
    ///
    /// Returns a device storage error if the profile cannot be cleared; the
    /// user is signed out either way.
    #[instrument(skip(self))]
    pub async fn log_out(&self) -> Result<(), AccountError> {
        self.identity.sign_out();
        self.device.remove_many(&keys::PROFILE).await?;
        tracing::info!("Logged out");
        Ok(())
    }
}

fn validate_password(password: &SecretString) -> Result<(), AccountError> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AccountError::WeakPassword);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryDocumentStore, MemoryIdentityProvider};
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("pocket-store-account-{}.json", uuid::Uuid::new_v4()))
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[tokio::test]
    async fn test_sign_up_writes_user_record() {
        let identity = MemoryIdentityProvider::new();
        let store = MemoryDocumentStore::new();
        let device = DeviceStorage::open(temp_path()).await.unwrap();
        let accounts = AccountService::new(&identity, &store, &device, "users");

        let created = accounts
            .sign_up(" Ada ", "ada@example.com", &secret("hunter22"))
            .await
            .unwrap();

        let users = store.documents("users");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id.as_str(), created.owner_id.as_str());
        assert_eq!(users[0].string(wire::NAME), Some("Ada"));
        assert_eq!(users[0].string(wire::EMAIL), Some("ada@example.com"));
        assert!(users[0].get(wire::CREATED_AT).unwrap().as_timestamp().is_some());
    }

    #[tokio::test]
    async fn test_sign_up_validation_happens_locally() {
        let identity = MemoryIdentityProvider::new();
        let store = MemoryDocumentStore::new();
        let device = DeviceStorage::open(temp_path()).await.unwrap();
        let accounts = AccountService::new(&identity, &store, &device, "users");

        assert!(matches!(
            accounts.sign_up("", "a@b.co", &secret("hunter22")).await,
            Err(AccountError::MissingFields)
        ));
        assert!(matches!(
            accounts.sign_up("Ada", "nope", &secret("hunter22")).await,
            Err(AccountError::InvalidEmail(_))
        ));
        assert!(matches!(
            accounts.sign_up("Ada", "a@b.co", &secret("12345")).await,
            Err(AccountError::WeakPassword)
        ));
        assert!(identity.current_identity().is_none());
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let identity = MemoryIdentityProvider::new();
        let store = MemoryDocumentStore::new();
        let device = DeviceStorage::open(temp_path()).await.unwrap();
        let accounts = AccountService::new(&identity, &store, &device, "users");

        accounts
            .sign_up("Ada", "ada@example.com", &secret("hunter22"))
            .await
            .unwrap();
        let err = accounts
            .sign_up("Ada", "ada@example.com", &secret("hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::EmailTaken));
    }

    #[tokio::test]
    async fn test_login_stores_email_only_and_logout_clears_profile() {
        let path = temp_path();
        let identity = MemoryIdentityProvider::new();
        let store = MemoryDocumentStore::new();
        let device = DeviceStorage::open(&path).await.unwrap();
        let accounts = AccountService::new(&identity, &store, &device, "users");

        accounts
            .sign_up("Ada", "ada@example.com", &secret("hunter22"))
            .await
            .unwrap();
        identity.sign_out();

        let bad = accounts.log_in("ada@example.com", &secret("wrong!")).await;
        assert!(matches!(bad, Err(AccountError::InvalidCredentials)));

        accounts
            .log_in("ada@example.com", &secret("hunter22"))
            .await
            .unwrap();
        accounts.rename("Countess").await.unwrap();
        accounts.set_profile_image("file:///me.png").await.unwrap();

        let profile = accounts.profile().await;
        assert_eq!(profile.name.as_deref(), Some("Countess"));
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
        assert_eq!(profile.image_uri.as_deref(), Some("file:///me.png"));

        let on_disk = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(!on_disk.contains("hunter22"));

        accounts.log_out().await.unwrap();
        assert_eq!(accounts.profile().await, Profile::default());
        assert!(identity.current_identity().is_none());

        tokio::fs::remove_file(path).await.unwrap();
    }
}
