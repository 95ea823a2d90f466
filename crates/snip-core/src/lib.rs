//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the record model, identifiers, the error taxonomy and
//! the storage contract shared by every backend and by the shortener service.

pub mod error;
pub mod record;
pub mod shortcode;
pub mod store;
pub mod user;

pub use error::{CoreError, StorageError};
pub use record::{UrlRecord, UserUrl};
pub use shortcode::ShortCode;
pub use store::{ReadStore, Store};
pub use user::UserId;
