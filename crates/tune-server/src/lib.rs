//! Personal music catalog server: song records, audio, cover art and
//! playback markers over a small REST API.

pub mod api;
pub mod error;
pub mod import;
pub mod library;
pub mod store;

pub use api::{router, AppState};
