//! # music-dl
//!
//! Multi-platform music search, cross-platform track matching and download
//! orchestration.
//!
//! Platform adapters plug in through the [`api`] capability traits and are
//! collected in a [`Registry`]. Everything else works against that registry:
//!
//! - [`aggregator`] - concurrent search across platforms
//! - [`downloader`] - audio plus cover and lyric sidecars
//! - [`matcher`] - find the same recording on another platform
//! - [`session`] - interactive search → select → download state machine
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use music_dl::api::{platform, CapabilityRecord, DirectLink};
//! use music_dl::{Cookies, MatchQuery, MusicDl, Registry, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let direct = Arc::new(DirectLink);
//!     let registry = Registry::builder()
//!         .register(
//!             platform::DIRECT,
//!             CapabilityRecord::new()
//!                 .with_parse_link(direct.clone())
//!                 .with_resolve_url(direct),
//!         )
//!         .build();
//!     let client = MusicDl::new(registry, Settings::default(), Cookies::new())?;
//!
//!     // Search the default platform set
//!     for track in client.search("晴天").await? {
//!         println!("{} - {} [{}]", track.title, track.artist, track.platform);
//!     }
//!
//!     // Find a playable copy elsewhere
//!     let query = MatchQuery::new("晴天", "周杰伦").excluding("qq").with_duration(269);
//!     let found = client.switch_platform(&query).await?;
//!     println!("{} ({:.2})", found.track.platform, found.score);
//!
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod api;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod matcher;
pub mod models;
pub mod session;
pub mod similarity;
pub mod tagging;

#[cfg(test)]
pub(crate) mod testing;

// Main interface (recommended)
pub use client::{BatchDownloadResult, MusicDl};
pub use downloader::DownloadResult;
pub use matcher::{Inspection, Match, MatchQuery};

pub use api::Registry;
pub use config::{Cookies, Settings};
pub use error::MusicError;
pub use models::{Playlist, Track};
