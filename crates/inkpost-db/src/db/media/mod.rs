#[allow(clippy::module_inception)]
pub mod media;

pub use media::MediaRepository;
