//! Inkpost Core Library
//!
//! This crate provides the domain models, error types, configuration and the
//! cursor pagination engine shared across all Inkpost components.

pub mod config;
pub mod error;
pub mod models;
pub mod pagination;
pub mod patch;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, BlogConfig, Config, QueueBackend};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use pagination::{CursorData, Page, PagePlan, SeekPredicate, SortField, SortOrder, SortValue};
pub use patch::Patch;
