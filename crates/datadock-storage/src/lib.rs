//! Datadock Storage Library
//!
//! Durable object storage for original uploads.
//!
//! # Storage key format
//!
//! Keys are owner-scoped: `user_{owner_id}/{filename}`. Keys must not contain
//! `..` or a leading `/`. Key generation is centralized in the `keys` module.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::owner_key;
pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
