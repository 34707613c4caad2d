mod api;


pub use api::JellyfinCatalog;
