//! Shipping address captured at checkout.

use core::fmt;

use serde::{Deserialize, Serialize};

/// One of the six required address fields, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    RecipientName,
    Phone,
    Street,
    City,
    State,
    PostalCode,
}

impl AddressField {
    /// All fields in the order the checkout form presents them.
    pub const ALL: [Self; 6] = [
        Self::RecipientName,
        Self::Phone,
        Self::Street,
        Self::City,
        Self::State,
        Self::PostalCode,
    ];

    /// Human-readable label used in validation messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RecipientName => "Full Name",
            Self::Phone => "Phone Number",
            Self::Street => "Street Address",
            Self::City => "City",
            Self::State => "State",
            Self::PostalCode => "Postal Code",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors produced by [`Address::validate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// One or more fields are blank after trimming, listed in form order.
    #[error("please fill out all fields (missing: {})", join_labels(.0))]
    MissingFields(Vec<AddressField>),
}

fn join_labels(fields: &[AddressField]) -> String {
    fields
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A shipping address.
///
/// Construction is unchecked so a form can hold partial input; call
/// [`Address::validate`] (or [`Address::trimmed`]) before using it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Address {
    /// Value of a single field.
    #[must_use]
    pub fn field(&self, field: AddressField) -> &str {
        match field {
            AddressField::RecipientName => &self.recipient_name,
            AddressField::Phone => &self.phone,
            AddressField::Street => &self.street,
            AddressField::City => &self.city,
            AddressField::State => &self.state,
            AddressField::PostalCode => &self.postal_code,
        }
    }

    /// Fields that are blank after trimming, in form order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<AddressField> {
        AddressField::ALL
            .into_iter()
            .filter(|&f| self.field(f).trim().is_empty())
            .collect()
    }

    /// Check that every field is non-empty after trimming.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::MissingFields`] listing every blank field.
    pub fn validate(&self) -> Result<(), AddressError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AddressError::MissingFields(missing))
        }
    }

    /// Validate and return a copy with surrounding whitespace removed.
    ///
    /// # Errors
    ///
    /// Same as [`Address::validate`].
    pub fn trimmed(&self) -> Result<Self, AddressError> {
        self.validate()?;
        Ok(Self {
            recipient_name: self.recipient_name.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            street: self.street.trim().to_owned(),
            city: self.city.trim().to_owned(),
            state: self.state.trim().to_owned(),
            postal_code: self.postal_code.trim().to_owned(),
        })
    }
}
