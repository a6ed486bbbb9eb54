//! Inkpost Storage Library
//!
//! Storage abstraction for uploaded media plus the local filesystem backend.
//!
//! # Storage key format
//!
//! Keys are `/`-separated paths relative to the media root, laid out as
//! `{yyyy}/{mm}/{sha256}.{ext}`. Keys must not contain `..` or a leading `/`.
//! Key generation lives in the `keys` module so every caller stays consistent.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

pub use factory::create_storage;
pub use keys::media_key;
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
