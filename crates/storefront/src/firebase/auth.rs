//! Email/password accounts via the Identity Toolkit REST API.
//!
//! A successful sign-up or sign-in yields a short-lived ID token and a
//! long-lived refresh token. The ID token authorizes Firestore and Storage
//! requests; [`FirebaseAuth::id_token`] exchanges the refresh token for a new
//! one shortly before it expires. Sessions can be exported and restored so a
//! CLI invocation can pick up where the previous one left off.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use pocket_store_core::{Email, OwnerId};

use super::{endpoint, send_json};
use crate::backend::{BackendError, Identity, IdentityProvider};
use crate::config::FirebaseConfig;

/// Refresh the ID token when it has less than this long left.
const REFRESH_MARGIN_SECS: i64 = 60;

/// A signed-in user's tokens.
struct AuthSession {
    identity: Identity,
    id_token: SecretString,
    refresh_token: SecretString,
    expires_at: DateTime<Utc>,
}

impl AuthSession {
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now < Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

/// What [`FirebaseAuth::id_token`] found in the current session.
enum TokenState {
    SignedOut,
    Fresh(SecretString),
    /// Carries the refresh token.
    Stale(SecretString),
}

impl TokenState {
    fn into_fresh(self) -> Option<SecretString> {
        match self {
            Self::Fresh(token) => Some(token),
            Self::SignedOut | Self::Stale(_) => None,
        }
    }
}

/// Serializable form of a session for device storage.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub user_id: String,
    pub email: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("id_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

/// Identity Toolkit client holding the current session.
#[derive(Clone)]
pub struct FirebaseAuth {
    inner: Arc<FirebaseAuthInner>,
}

struct FirebaseAuthInner {
    client: reqwest::Client,
    api_key: SecretString,
    auth_base_url: String,
    token_base_url: String,
    session: RwLock<Option<AuthSession>>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl FirebaseAuth {
    /// Create a client with nobody signed in.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &FirebaseConfig) -> Self {
        Self {
            inner: Arc::new(FirebaseAuthInner {
                client,
                api_key: config.api_key.clone(),
                auth_base_url: config.auth_base_url.clone(),
                token_base_url: config.token_base_url.clone(),
                session: RwLock::new(None),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The current session in storable form.
    #[must_use]
    pub fn export_session(&self) -> Option<StoredSession> {
        let guard = self.inner.session.read().ok()?;
        guard.as_ref().map(|s| StoredSession {
            user_id: s.identity.owner_id.to_string(),
            email: s.identity.email.as_ref().map(ToString::to_string),
            id_token: s.id_token.expose_secret().to_owned(),
            refresh_token: s.refresh_token.expose_secret().to_owned(),
            expires_at: s.expires_at,
        })
    }

    /// Resume a previously exported session.
    ///
    /// An expired ID token is fine; it is refreshed on first use.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Parse` if the stored email is malformed.
    pub fn restore_session(&self, stored: StoredSession) -> Result<(), BackendError> {
        let email = stored
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| BackendError::Parse(format!("stored session email: {e}")))?;

        self.store_session(AuthSession {
            identity: Identity {
                owner_id: OwnerId::new(stored.user_id),
                email,
            },
            id_token: SecretString::from(stored.id_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
        })
    }

    /// ID token for authorizing requests, refreshed if close to expiry.
    ///
    /// Returns `None` when nobody is signed in.
    ///
    /// # Errors
    ///
    /// Returns error if the refresh request fails. A rejected refresh token
    /// signs the user out and yields `BackendError::Unauthenticated`.
    pub async fn id_token(&self) -> Result<Option<SecretString>, BackendError> {
        match self.token_state()? {
            TokenState::Stale(_) => {}
            state => return Ok(state.into_fresh()),
        }

        // One refresh at a time; callers queued behind it reuse the new token.
        let _refreshing = self.inner.refresh_lock.lock().await;
        let refresh_token = match self.token_state()? {
            TokenState::Stale(refresh_token) => refresh_token,
            state => return Ok(state.into_fresh()),
        };

        match self.refresh(&refresh_token).await {
            Ok(token) => Ok(Some(token)),
            Err(BackendError::Unauthenticated) => {
                self.sign_out();
                Err(BackendError::Unauthenticated)
            }
            Err(e) => Err(e),
        }
    }

    fn token_state(&self) -> Result<TokenState, BackendError> {
        let guard = self
            .inner
            .session
            .read()
            .map_err(|_| BackendError::Unavailable("session lock poisoned".to_owned()))?;
        Ok(match guard.as_ref() {
            None => TokenState::SignedOut,
            Some(s) if !s.needs_refresh(Utc::now()) => TokenState::Fresh(s.id_token.clone()),
            Some(s) => TokenState::Stale(s.refresh_token.clone()),
        })
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &SecretString) -> Result<SecretString, BackendError> {
        let mut url = endpoint(&self.inner.token_base_url, &["token"])?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());

        let response: RefreshResponse = send_json(self.inner.client.post(url).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret()),
        ]))
        .await
        .map_err(map_auth_error)?;

        let email = self
            .current_identity()
            .filter(|i| i.owner_id.as_str() == response.user_id)
            .and_then(|i| i.email);
        let id_token = SecretString::from(response.id_token);

        self.store_session(AuthSession {
            identity: Identity {
                owner_id: OwnerId::new(response.user_id),
                email,
            },
            id_token: id_token.clone(),
            refresh_token: SecretString::from(response.refresh_token),
            expires_at: expiry(&response.expires_in),
        })?;
        tracing::debug!("Refreshed ID token");

        Ok(id_token)
    }

    async fn password_request(
        &self,
        operation: &str,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, BackendError> {
        let mut url = endpoint(&self.inner.auth_base_url, &[operation])?;
        url.query_pairs_mut()
            .append_pair("key", self.inner.api_key.expose_secret());

        let body = PasswordRequest {
            email: email.as_str(),
            password: password.expose_secret(),
            return_secure_token: true,
        };
        let response: PasswordResponse = send_json(self.inner.client.post(url).json(&body))
            .await
            .map_err(map_auth_error)?;

        let identity = Identity {
            owner_id: OwnerId::new(response.local_id),
            email: Some(email.clone()),
        };
        self.store_session(AuthSession {
            identity: identity.clone(),
            id_token: SecretString::from(response.id_token),
            refresh_token: SecretString::from(response.refresh_token),
            expires_at: expiry(&response.expires_in),
        })?;

        Ok(identity)
    }

    fn store_session(&self, session: AuthSession) -> Result<(), BackendError> {
        *self
            .inner
            .session
            .write()
            .map_err(|_| BackendError::Unavailable("session lock poisoned".to_owned()))? =
            Some(session);
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    fn current_identity(&self) -> Option<Identity> {
        let guard = self.inner.session.read().ok()?;
        guard.as_ref().map(|s| s.identity.clone())
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, BackendError> {
        self.password_request("accounts:signUp", email, password)
            .await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<Identity, BackendError> {
        self.password_request("accounts:signInWithPassword", email, password)
            .await
    }

    fn sign_out(&self) {
        if let Ok(mut guard) = self.inner.session.write() {
            *guard = None;
        }
    }
}

/// Expiry instant from an `expires_in` seconds string.
fn expiry(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}

/// Map Identity Toolkit error codes onto backend errors.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be
/// at least 6 characters`.
fn map_auth_error(err: BackendError) -> BackendError {
    match err {
        BackendError::Api { status, message } => {
            let code = message.split([' ', ':']).next().unwrap_or_default();
            match code {
                "EMAIL_EXISTS" => {
                    BackendError::Conflict("email address is already in use".to_owned())
                }
                "EMAIL_NOT_FOUND"
                | "INVALID_PASSWORD"
                | "INVALID_LOGIN_CREDENTIALS"
                | "USER_DISABLED" => BackendError::InvalidCredentials,
                "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND"
                | "INVALID_ID_TOKEN" => BackendError::Unauthenticated,
                _ => BackendError::Api { status, message },
            }
        }
        other => other,
    }
}
