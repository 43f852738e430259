//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIREBASE_PROJECT_ID` - Firebase project hosting the document database
//! - `FIREBASE_API_KEY` - Web API key (placeholder and entropy checked)
//! - `FIREBASE_STORAGE_BUCKET` - Storage bucket for product images
//!
//! ## Optional
//! - `POCKET_STORE_DEVICE_STORAGE` - Local profile/session file (default: .pocket-store.json)
//! - `POCKET_STORE_PRODUCTS_COLLECTION` - Catalog collection (default: products)
//! - `POCKET_STORE_ORDERS_COLLECTION` - Order collection (default: addresses)
//! - `POCKET_STORE_USERS_COLLECTION` - User record collection (default: users)
//! - `FIRESTORE_BASE_URL` - Firestore REST base (default: production endpoint)
//! - `FIREBASE_AUTH_BASE_URL` - Identity Toolkit REST base
//! - `FIREBASE_TOKEN_BASE_URL` - Secure Token REST base
//! - `FIREBASE_STORAGE_BASE_URL` - Storage REST base
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! Overriding any of the `*_BASE_URL` variables switches to emulator mode, in
//! which the API key is not checked for strength (the emulators accept any key).

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_AUTH_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_TOKEN_BASE_URL: &str = "https://securetoken.googleapis.com/v1";
const DEFAULT_STORAGE_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Firebase project and endpoints
    pub firebase: FirebaseConfig,
    /// Collection names in the document database
    pub collections: CollectionNames,
    /// Local file holding the profile and auth session
    pub device_storage_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
}

/// Firebase project configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirebaseConfig {
    /// Firebase project ID
    pub project_id: String,
    /// Web API key
    pub api_key: SecretString,
    /// Storage bucket (e.g. my-project.appspot.com)
    pub storage_bucket: String,
    /// Firestore REST base URL
    pub firestore_base_url: String,
    /// Identity Toolkit REST base URL
    pub auth_base_url: String,
    /// Secure Token REST base URL
    pub token_base_url: String,
    /// Storage REST base URL
    pub storage_base_url: String,
}

impl std::fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &"[REDACTED]")
            .field("storage_bucket", &self.storage_bucket)
            .field("firestore_base_url", &self.firestore_base_url)
            .field("auth_base_url", &self.auth_base_url)
            .field("token_base_url", &self.token_base_url)
            .field("storage_base_url", &self.storage_base_url)
            .finish()
    }
}

impl FirebaseConfig {
    /// Configuration pointing at the production endpoints.
    #[must_use]
    pub fn new(project_id: &str, api_key: SecretString, storage_bucket: &str) -> Self {
        Self {
            project_id: project_id.to_owned(),
            api_key,
            storage_bucket: storage_bucket.to_owned(),
            firestore_base_url: DEFAULT_FIRESTORE_BASE_URL.to_owned(),
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_owned(),
            token_base_url: DEFAULT_TOKEN_BASE_URL.to_owned(),
            storage_base_url: DEFAULT_STORAGE_BASE_URL.to_owned(),
        }
    }
}

/// Names of the collections the storefront reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    /// Product catalog
    pub products: String,
    /// One document per purchased line item
    pub orders: String,
    /// Profile record written at sign-up
    pub users: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            products: "products".to_owned(),
            orders: "addresses".to_owned(),
            users: "users".to_owned(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let project_id = get_required_env("FIREBASE_PROJECT_ID")?;
        let storage_bucket = get_required_env("FIREBASE_STORAGE_BUCKET")?;

        let firestore_base_url = get_optional_env("FIRESTORE_BASE_URL");
        let auth_base_url = get_optional_env("FIREBASE_AUTH_BASE_URL");
        let token_base_url = get_optional_env("FIREBASE_TOKEN_BASE_URL");
        let storage_base_url = get_optional_env("FIREBASE_STORAGE_BASE_URL");
        let emulator_mode = firestore_base_url.is_some()
            || auth_base_url.is_some()
            || token_base_url.is_some()
            || storage_base_url.is_some();

        let api_key = if emulator_mode {
            get_required_secret("FIREBASE_API_KEY")?
        } else {
            get_validated_secret("FIREBASE_API_KEY")?
        };

        let firebase = FirebaseConfig {
            firestore_base_url: validated_url(
                "FIRESTORE_BASE_URL",
                firestore_base_url,
                DEFAULT_FIRESTORE_BASE_URL,
            )?,
            auth_base_url: validated_url(
                "FIREBASE_AUTH_BASE_URL",
                auth_base_url,
                DEFAULT_AUTH_BASE_URL,
            )?,
            token_base_url: validated_url(
                "FIREBASE_TOKEN_BASE_URL",
                token_base_url,
                DEFAULT_TOKEN_BASE_URL,
            )?,
            storage_base_url: validated_url(
                "FIREBASE_STORAGE_BASE_URL",
                storage_base_url,
                DEFAULT_STORAGE_BASE_URL,
            )?,
            ..FirebaseConfig::new(&project_id, api_key, &storage_bucket)
        };

        let defaults = CollectionNames::default();
        let collections = CollectionNames {
            products: get_env_or_default("POCKET_STORE_PRODUCTS_COLLECTION", &defaults.products),
            orders: get_env_or_default("POCKET_STORE_ORDERS_COLLECTION", &defaults.orders),
            users: get_env_or_default("POCKET_STORE_USERS_COLLECTION", &defaults.users),
        };

        let device_storage_path = PathBuf::from(get_env_or_default(
            "POCKET_STORE_DEVICE_STORAGE",
            ".pocket-store.json",
        ));

        Ok(Self {
            firebase,
            collections,
            device_storage_path,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Check that an endpoint override parses as an absolute URL.
fn validated_url(key: &str, value: Option<String>, default: &str) -> Result<String, ConfigError> {
    let Some(value) = value else {
        return Ok(default.to_owned());
    };
    url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(value.trim_end_matches('/').to_owned())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    let lower = value.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the Firebase console."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let secret = get_required_secret(key)?;
    validate_secret_strength(&secret, key)?;
    Ok(secret)
}
