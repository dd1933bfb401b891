//! Emporium Core - Shared domain types.
//!
//! This crate provides the types shared by every Emporium component:
//! - `storefront` - Client-side commerce state and query layer
//! - `cli` - Command-line front end driving the storefront layer
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! Wire-format quirks of the remote API (field naming, numeric IDs sent as
//! strings) are normalized away in the storefront crate before values of these
//! types are constructed.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, statuses, and catalog/account models

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
