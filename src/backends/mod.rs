pub mod jellyfin;
pub mod traits;

pub use jellyfin::JellyfinCatalog;
pub use traits::MediaCatalog;
