//! Command implementations.

pub mod account;
pub mod shop;

use pocket_store_core::Email;
use pocket_store_storefront::account::AccountService;
use pocket_store_storefront::backend::IdentityProvider;
use pocket_store_storefront::config::StorefrontConfig;
use pocket_store_storefront::device::{DeviceStorage, keys};
use pocket_store_storefront::error::{AppError, set_sentry_user};
use pocket_store_storefront::firebase::{FirebaseApp, StoredSession};

/// Everything a command needs: configuration, backend clients and the
/// device storage holding the profile and session.
pub struct Context {
    pub config: StorefrontConfig,
    pub firebase: FirebaseApp,
    pub device: DeviceStorage,
}

impl Context {
    /// Build the clients and resume the stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built, device storage is
    /// unreadable, or the stored session is malformed.
    pub async fn open(config: StorefrontConfig) -> Result<Self, AppError> {
        let firebase = FirebaseApp::new(&config.firebase)?;
        let device = DeviceStorage::open(&config.device_storage_path).await?;

        if let Some(stored) = device.get_json::<StoredSession>(keys::AUTH_SESSION).await {
            firebase.auth().restore_session(stored)?;
        }
        if let Some(identity) = firebase.auth().current_identity() {
            tracing::debug!(user_id = %identity.owner_id, "Resumed session");
            set_sentry_user(&identity.owner_id, identity.email.as_ref().map(Email::as_str));
        }

        Ok(Self {
            config,
            firebase,
            device,
        })
    }

    /// Write the current session to device storage, or clear it when
    /// nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns error if device storage cannot be written.
    pub async fn save_session(&self) -> Result<(), AppError> {
        match self.firebase.auth().export_session() {
            Some(session) => self.device.set_json(keys::AUTH_SESSION, &session).await?,
            None => self.device.remove_many(&[keys::AUTH_SESSION]).await?,
        }
        Ok(())
    }

    #[must_use]
    pub fn accounts(&self) -> AccountService<'_> {
        AccountService::new(
            self.firebase.auth(),
            self.firebase.firestore(),
            &self.device,
            &self.config.collections.users,
        )
    }
}
