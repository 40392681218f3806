//! Playlist model.

use serde::{Deserialize, Serialize};

/// A playlist summary as returned by a platform's playlist search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Playlist {
    /// Platform-local playlist identifier.
    pub id: String,

    /// Platform identifier, set by the aggregator.
    #[serde(default)]
    pub platform: String,

    /// Playlist name.
    pub name: String,

    /// Cover image URL.
    #[serde(default)]
    pub cover: String,

    /// Number of tracks, 0 when unknown.
    #[serde(default)]
    pub track_count: u32,

    /// Creator display name.
    #[serde(default)]
    pub creator: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Canonical link on the platform's website.
    #[serde(default)]
    pub link: String,
}
