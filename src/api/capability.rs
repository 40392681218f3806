//! Capability contracts a platform adapter may implement.
//!
//! Each capability is its own trait so an adapter implements only what its
//! platform supports. A [`CapabilityRecord`] holds one optional trait object
//! per capability; a `None` slot means "unsupported" and is never an error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Playlist, Track};

/// The operations a platform can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Search,
    ResolveUrl,
    FetchLyrics,
    ParseLink,
    SearchPlaylists,
    PlaylistTracks,
    ProtectedAudio,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Search => write!(f, "search"),
            Self::ResolveUrl => write!(f, "download url resolution"),
            Self::FetchLyrics => write!(f, "lyrics"),
            Self::ParseLink => write!(f, "link parsing"),
            Self::SearchPlaylists => write!(f, "playlist search"),
            Self::PlaylistTracks => write!(f, "playlist contents"),
            Self::ProtectedAudio => write!(f, "protected audio"),
        }
    }
}

/// Keyword search for tracks.
#[async_trait]
pub trait Search: Send + Sync {
    async fn search(&self, keyword: &str) -> Result<Vec<Track>>;
}

/// Resolve a direct download URL for a track.
#[async_trait]
pub trait ResolveUrl: Send + Sync {
    async fn download_url(&self, track: &Track) -> Result<String>;
}

/// Fetch LRC lyrics for a track.
#[async_trait]
pub trait FetchLyrics: Send + Sync {
    async fn lyrics(&self, track: &Track) -> Result<String>;
}

/// Turn a share link into a track.
#[async_trait]
pub trait ParseLink: Send + Sync {
    async fn parse_link(&self, link: &str) -> Result<Track>;
}

/// Keyword search for playlists.
#[async_trait]
pub trait SearchPlaylists: Send + Sync {
    async fn search_playlists(&self, keyword: &str) -> Result<Vec<Playlist>>;
}

/// List the tracks of a playlist.
#[async_trait]
pub trait PlaylistTracks: Send + Sync {
    async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>>;
}

/// Encrypted media location plus the token needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedMedia {
    /// URL of the encrypted payload.
    pub url: String,
    /// Authorization token consumed by [`ProtectedAudio::decrypt`].
    pub play_auth: String,
}

/// Platforms whose CDN serves encrypted audio.
///
/// When a record carries this capability the downloader takes the
/// decryption path instead of [`ResolveUrl`].
#[async_trait]
pub trait ProtectedAudio: Send + Sync {
    async fn media(&self, track: &Track) -> Result<ProtectedMedia>;

    fn decrypt(&self, payload: &[u8], play_auth: &str) -> Result<Vec<u8>>;
}

/// Optional capability set for one platform.
#[derive(Clone, Default)]
pub struct CapabilityRecord {
    pub search: Option<Arc<dyn Search>>,
    pub resolve_url: Option<Arc<dyn ResolveUrl>>,
    pub lyrics: Option<Arc<dyn FetchLyrics>>,
    pub parse_link: Option<Arc<dyn ParseLink>>,
    pub search_playlists: Option<Arc<dyn SearchPlaylists>>,
    pub playlist_tracks: Option<Arc<dyn PlaylistTracks>>,
    pub protected: Option<Arc<dyn ProtectedAudio>>,
}

impl CapabilityRecord {
    /// Create an empty record (no capabilities).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, search: Arc<dyn Search>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_resolve_url(mut self, resolver: Arc<dyn ResolveUrl>) -> Self {
        self.resolve_url = Some(resolver);
        self
    }

    pub fn with_lyrics(mut self, lyrics: Arc<dyn FetchLyrics>) -> Self {
        self.lyrics = Some(lyrics);
        self
    }

    pub fn with_parse_link(mut self, parser: Arc<dyn ParseLink>) -> Self {
        self.parse_link = Some(parser);
        self
    }

    pub fn with_search_playlists(mut self, search: Arc<dyn SearchPlaylists>) -> Self {
        self.search_playlists = Some(search);
        self
    }

    pub fn with_playlist_tracks(mut self, tracks: Arc<dyn PlaylistTracks>) -> Self {
        self.playlist_tracks = Some(tracks);
        self
    }

    pub fn with_protected(mut self, protected: Arc<dyn ProtectedAudio>) -> Self {
        self.protected = Some(protected);
        self
    }

    /// Check whether the record carries `capability`.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Search => self.search.is_some(),
            Capability::ResolveUrl => self.resolve_url.is_some(),
            Capability::FetchLyrics => self.lyrics.is_some(),
            Capability::ParseLink => self.parse_link.is_some(),
            Capability::SearchPlaylists => self.search_playlists.is_some(),
            Capability::PlaylistTracks => self.playlist_tracks.is_some(),
            Capability::ProtectedAudio => self.protected.is_some(),
        }
    }
}

impl fmt::Debug for CapabilityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRecord")
            .field("search", &self.search.is_some())
            .field("resolve_url", &self.resolve_url.is_some())
            .field("lyrics", &self.lyrics.is_some())
            .field("parse_link", &self.parse_link.is_some())
            .field("search_playlists", &self.search_playlists.is_some())
            .field("playlist_tracks", &self.playlist_tracks.is_some())
            .field("protected", &self.protected.is_some())
            .finish()
    }
}
