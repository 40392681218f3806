//! Audio metadata tagging utilities.
//!
//! Embeds title, artist, album and cover art into downloaded audio files.
//! Tagging is best-effort: an unreadable or unsupported file is logged and
//! left untouched.

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::tag::{Accessor, Tag, TagExt};
use std::path::Path;
use tracing::{debug, warn};

use crate::models::Track;

/// Metadata to embed in audio files.
#[derive(Debug, Clone, Default)]
pub struct AudioMetadata {
    /// Track title.
    pub title: Option<String>,
    /// Track artist(s).
    pub artist: Option<String>,
    /// Album title.
    pub album: Option<String>,
    /// Cover art bytes (JPEG or PNG).
    pub cover_art: Option<Vec<u8>>,
}

impl AudioMetadata {
    /// Create new empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata taken from a track's non-empty fields.
    pub fn from_track(track: &Track) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            title: non_empty(&track.title),
            artist: non_empty(&track.artist),
            album: non_empty(&track.album),
            cover_art: None,
        }
    }

    /// Set cover art from image bytes.
    pub fn with_cover_art(mut self, cover: Vec<u8>) -> Self {
        self.cover_art = Some(cover);
        self
    }

    /// True when there is nothing to write.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.cover_art.is_none()
    }
}

/// Detect the picture MIME type from magic bytes.
fn cover_mime(data: &[u8]) -> MimeType {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        MimeType::Png
    } else {
        MimeType::Jpeg
    }
}

/// Write metadata to an audio file.
///
/// Returns `true` when tags were saved. Failures are logged, never raised.
pub fn write_metadata<P: AsRef<Path>>(path: P, metadata: &AudioMetadata) -> bool {
    let path = path.as_ref();
    if metadata.is_empty() {
        return false;
    }
    debug!("Writing metadata to: {}", path.display());

    let mut tagged_file = match lofty::read_from_path(path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Could not read file for tagging: {}", e);
            return false;
        }
    };

    if tagged_file.primary_tag().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let Some(tag) = tagged_file.primary_tag_mut() else {
        warn!("No writable tag for {}", path.display());
        return false;
    };

    if let Some(title) = &metadata.title {
        tag.set_title(title.clone());
    }
    if let Some(artist) = &metadata.artist {
        tag.set_artist(artist.clone());
    }
    if let Some(album) = &metadata.album {
        tag.set_album(album.clone());
    }
    if let Some(cover_data) = &metadata.cover_art {
        let picture = Picture::new_unchecked(
            PictureType::CoverFront,
            Some(cover_mime(cover_data)),
            None,
            cover_data.clone(),
        );
        tag.push_picture(picture);
    }

    match tag.save_to_path(path, WriteOptions::default()) {
        Ok(()) => {
            debug!("Successfully wrote metadata to {}", path.display());
            true
        }
        Err(e) => {
            warn!("Failed to save tags to {}: {}", path.display(), e);
            false
        }
    }
}
