//! Data models shared across platforms.
//!
//! Every platform adapter maps its own responses onto these types, so the
//! aggregator, matcher and downloader never see platform-specific shapes.

pub mod playlist;
pub mod track;

// Re-exports for convenience
pub use playlist::Playlist;
pub use track::{format_size, sanitize_filename, Track};
