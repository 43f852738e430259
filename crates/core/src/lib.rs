//! Pocket Store Core - Shared domain types.
//!
//! This crate provides the types used across all Pocket Store components:
//! - `storefront` - Cart, checkout, catalog, accounts and backend clients
//! - `cli` - Command-line shell driving the storefront flows
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no network
//! clients, no async runtime. This keeps it lightweight and usable anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails and shipping addresses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
