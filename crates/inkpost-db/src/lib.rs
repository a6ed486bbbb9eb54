//! Inkpost data access layer: sqlx/Postgres repositories.

pub mod db;

pub use db::*;
