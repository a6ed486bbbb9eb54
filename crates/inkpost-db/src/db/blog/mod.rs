pub mod category;
pub mod comment;
pub mod post;
pub mod setting;
pub mod tag;
pub mod user;

pub use category::CategoryRepository;
pub use comment::CommentRepository;
pub use post::PostRepository;
pub use setting::SettingRepository;
pub use tag::TagRepository;
pub use user::UserRepository;
