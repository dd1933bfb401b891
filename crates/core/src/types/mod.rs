//! Core types for Emporium.
//!
//! This module provides type-safe wrappers and the normalized internal shapes
//! for catalog, account, and order data.

pub mod account;
pub mod catalog;
pub mod email;
pub mod id;
pub mod message;
pub mod order;
pub mod page;
pub mod price;
pub mod status;

pub use account::{Address, PaymentMethod, UserSummary};
pub use catalog::{Category, Product};
pub use email::{Email, EmailError};
pub use id::*;
pub use message::ContactMessage;
pub use order::{DashboardStats, Order, OrderItem};
pub use page::{Page, Pagination};
pub use price::{format_price, line_total};
pub use status::*;
