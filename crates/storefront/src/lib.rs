//! Pocket Store storefront library.
//!
//! The shopping flows of the Pocket Store mobile app as a library: catalog
//! browsing, the cart, checkout, order history, product publishing and
//! accounts. Flows talk to the outside world only through the traits in
//! [`backend`], implemented over Firebase REST in [`firebase`] and in memory
//! in [`backend::memory`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod account;
pub mod backend;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod device;
pub mod error;
pub mod firebase;
pub mod orders;
pub mod products;
