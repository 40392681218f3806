//! Track model shared by every platform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default audio extension when a platform does not report one.
const DEFAULT_EXTENSION: &str = "mp3";

/// A playable track as returned by a platform.
///
/// `platform` is filled in by whichever component resolved the track
/// (the aggregator for search results, the matcher for its candidates).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Track {
    /// Platform-local identifier.
    pub id: String,

    /// Platform identifier, e.g. `"netease"`.
    #[serde(default)]
    pub platform: String,

    /// Track title.
    pub title: String,

    /// Artist name(s) as a single display string.
    #[serde(default)]
    pub artist: String,

    /// Album title.
    #[serde(default)]
    pub album: String,

    /// Duration in seconds, 0 when unknown.
    #[serde(default)]
    pub duration: u32,

    /// Bitrate in kbps, 0 when unknown.
    #[serde(default)]
    pub bitrate: u32,

    /// File size in bytes, 0 when unknown.
    #[serde(default)]
    pub size: u64,

    /// Cover image URL.
    #[serde(default)]
    pub cover: String,

    /// Canonical link on the platform's website.
    #[serde(default)]
    pub link: String,

    /// Audio file extension without the dot.
    #[serde(default)]
    pub extension: Option<String>,

    /// Adapter-private values (hashes, album ids, ...).
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl Track {
    /// Create a track with the fields every platform provides.
    pub fn new<S1, S2, S3>(id: S1, title: S2, artist: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    /// Audio extension, falling back to `mp3`.
    pub fn extension(&self) -> &str {
        self.extension
            .as_deref()
            .filter(|ext| !ext.is_empty())
            .unwrap_or(DEFAULT_EXTENSION)
    }

    /// File name without extension, shared by audio, cover and lyrics.
    pub fn base_name(&self) -> String {
        format!(
            "{} - {}",
            sanitize_filename(&self.title),
            sanitize_filename(&self.artist)
        )
    }

    /// Audio file name: `<title> - <artist>.<ext>`.
    pub fn filename(&self) -> String {
        format!("{}.{}", self.base_name(), self.extension())
    }

    /// Get duration formatted as MM:SS.
    pub fn duration_formatted(&self) -> String {
        let minutes = self.duration / 60;
        let seconds = self.duration % 60;
        format!("{:02}:{:02}", minutes, seconds)
    }

    /// Get size formatted in megabytes, `-` when unknown.
    pub fn size_formatted(&self) -> String {
        format_size(self.size)
    }
}

/// Format a byte count as megabytes with one decimal.
pub fn format_size(size: u64) -> String {
    if size == 0 {
        return "-".to_string();
    }
    format!("{:.1} MB", size as f64 / 1024.0 / 1024.0)
}

/// Sanitize a string for use as a filename.
pub fn sanitize_filename(name: &str) -> String {
    name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_")
        .trim()
        .to_string()
}
