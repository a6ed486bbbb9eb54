pub mod auth;
pub mod categories;
pub mod comments;
pub mod media;
pub mod posts;
pub mod settings;
pub mod tags;
pub mod users;
