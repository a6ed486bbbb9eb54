//! Data models for the application
//!
//! Each sub-module holds the row type for one table plus its request and
//! response DTOs.

mod category;
mod comment;
mod delete_task;
mod media;
mod post;
mod setting;
mod tag;
mod user;

pub use category::*;
pub use comment::*;
pub use delete_task::*;
pub use media::*;
pub use post::*;
pub use setting::*;
pub use tag::*;
pub use user::*;
