//! Playback decision and resilience core for a Jellyfin media client.
//!
//! The rendering surface, the concrete playback engine, the OS connectivity
//! service and the download manager are supplied by the embedding
//! application through the traits in `player`, `services` and `backends`.

pub mod backends;
pub mod config;
pub mod models;
pub mod player;
pub mod resilience;
pub mod services;

#[cfg(test)]
mod test_utils;
