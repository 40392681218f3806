//! Built-in platform for plain audio file URLs.

use async_trait::async_trait;
use reqwest::Url;

use super::capability::{ParseLink, ResolveUrl};
use super::platform::{audio_extension, DIRECT};
use crate::error::{MusicError, Result};
use crate::models::Track;

/// Treats an `http(s)` URL ending in an audio extension as a track.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectLink;

#[async_trait]
impl ParseLink for DirectLink {
    async fn parse_link(&self, link: &str) -> Result<Track> {
        let url = Url::parse(link)
            .map_err(|e| MusicError::InvalidLink(format!("{}: {}", link, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MusicError::InvalidLink(link.to_string()));
        }
        let ext = audio_extension(link)
            .ok_or_else(|| MusicError::InvalidLink(format!("not an audio file: {}", link)))?;

        let file = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let file = urlencoding::decode(file)
            .map_err(|e| MusicError::InvalidLink(format!("{}: {}", link, e)))?;
        let stem = file
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&*file);

        // "Artist - Title.mp3" is common enough to split on.
        let (artist, title) = match stem.split_once(" - ") {
            Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
            None => (String::new(), stem.trim().to_string()),
        };

        Ok(Track {
            id: link.to_string(),
            platform: DIRECT.to_string(),
            title,
            artist,
            link: link.to_string(),
            extension: Some(ext.to_string()),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ResolveUrl for DirectLink {
    async fn download_url(&self, track: &Track) -> Result<String> {
        if track.link.is_empty() {
            Ok(track.id.clone())
        } else {
            Ok(track.link.clone())
        }
    }
}
