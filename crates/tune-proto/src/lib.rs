//! Types shared by the catalog server and the player.

pub mod config;
pub mod platform;
pub mod protocol;

pub use protocol::{MarkerEdit, SongId, SongRecord};
