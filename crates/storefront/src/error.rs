//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for callers that drive several flows
//! (the CLI does). [`AppError::user_message`] is the text for the blocking
//! error dialog; [`AppError::report`] captures the failures worth a Sentry
//! event before the message is shown.

use thiserror::Error;

use crate::account::AccountError;
use crate::backend::BackendError;
use crate::catalog::CatalogError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::device::DeviceStorageError;
use crate::orders::OrderHistoryError;
use crate::products::PublishError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A backend call failed outside any specific flow.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Order history error: {0}")]
    OrderHistory(#[from] OrderHistoryError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Product error: {0}")]
    Publish(#[from] PublishError),

    #[error("Device storage error: {0}")]
    Device(#[from] DeviceStorageError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad input from the user.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether this error should be captured to Sentry.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        match self {
            Self::Backend(_) | Self::Device(_) | Self::Catalog(_) => true,
            Self::Checkout(err) => matches!(err, CheckoutError::WriteFailure(_)),
            Self::OrderHistory(err) => matches!(err, OrderHistoryError::ReadFailure(_)),
            Self::Account(err) => matches!(
                err,
                AccountError::Backend(_) | AccountError::ProfileRecord(_) | AccountError::Device(_)
            ),
            Self::Publish(err) => matches!(err, PublishError::Upload(_) | PublishError::Write(_)),
            Self::Config(_) | Self::NotFound(_) | Self::BadRequest(_) => false,
        }
    }

    /// Capture to Sentry and log, if reportable.
    pub fn report(&self) {
        if self.is_reportable() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
        } else {
            tracing::debug!(error = %self, "Operation rejected");
        }
    }

    /// Message for the user. Backend details are never included.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.to_string(),
            Self::Backend(_) => "External service error".to_string(),
            Self::Checkout(err) => err.user_message(),
            Self::Catalog(err) => err.user_message(),
            Self::OrderHistory(err) => err.user_message(),
            Self::Account(err) => err.user_message(),
            Self::Publish(err) => err.user_message(),
            Self::Device(_) => "Could not access storage on this device".to_string(),
            Self::NotFound(what) => format!("Not found: {what}"),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "abc123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{SubmissionReport, ValidationError};

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_backend_details_hidden() {
        let err = AppError::from(BackendError::Api {
            status: 500,
            message: "stack trace here".to_string(),
        });
        assert_eq!(err.user_message(), "External service error");
        assert!(err.is_reportable());
    }

    #[test]
    fn test_checkout_reporting() {
        let rejected = AppError::from(CheckoutError::from(ValidationError::NotSignedIn));
        assert!(!rejected.is_reportable());
        assert_eq!(rejected.user_message(), "please sign in to place an order");

        let failed = AppError::from(CheckoutError::WriteFailure(SubmissionReport::default()));
        assert!(failed.is_reportable());
        assert_eq!(failed.user_message(), "Failed to submit data");
    }
}
