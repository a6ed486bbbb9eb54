//! Inkpost API Library
//!
//! This crate provides the HTTP API handlers, middleware, and application setup.

pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
mod middleware;
pub mod setup;
pub mod state;
mod utils;

pub use error::{HttpAppError, ValidatedJson};
pub use inkpost_infra::ErrorResponse;
