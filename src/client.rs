//! High-level client tying the registry, search, download and matching
//! together under one set of [`Settings`].

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::api::{HttpTransport, Registry, RequestBuilder, Transport};
use crate::config::{Cookies, Settings};
use crate::downloader::{DownloadResult, Downloader};
use crate::error::{MusicError, Result};
use crate::matcher::{Inspection, Match, MatchQuery, Matcher};
use crate::models::{sanitize_filename, Playlist, Track};
use crate::session::Backend;

/// Result of downloading a whole playlist.
#[derive(Debug)]
pub struct BatchDownloadResult {
    /// Output directory.
    pub directory: PathBuf,
    /// Successfully downloaded tracks.
    pub successful: Vec<DownloadResult>,
    /// Failed track titles with error messages.
    pub failed: Vec<(String, String)>,
}

impl BatchDownloadResult {
    /// Total number of tracks attempted.
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Check if all tracks were downloaded successfully.
    pub fn all_successful(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Main music-dl interface.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use music_dl::api::{platform, CapabilityRecord, DirectLink};
/// use music_dl::{Cookies, MusicDl, Registry, Settings};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let direct = Arc::new(DirectLink);
///     let registry = Registry::builder()
///         .register(
///             platform::DIRECT,
///             CapabilityRecord::new()
///                 .with_parse_link(direct.clone())
///                 .with_resolve_url(direct),
///         )
///         .build();
///
///     let client = MusicDl::new(registry, Settings::default(), Cookies::new())?;
///     let result = client
///         .download_link("https://example.org/music/Artist - Title.mp3")
///         .await?;
///     println!("Downloaded: {}", result.path.display());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MusicDl {
    registry: Arc<Registry>,
    aggregator: Aggregator,
    downloader: Downloader,
    matcher: Matcher,
    settings: Settings,
}

impl MusicDl {
    /// Create a client talking to the network through `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns `TransportFailure` if the HTTP client cannot be built.
    pub fn new(registry: Registry, settings: Settings, cookies: Cookies) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(registry, settings, cookies, transport))
    }

    /// Create a client over an arbitrary [`Transport`].
    pub fn with_transport(
        registry: Registry,
        settings: Settings,
        cookies: Cookies,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let registry = Arc::new(registry);
        let requests = RequestBuilder::new(cookies);

        let mut downloader = Downloader::new(
            Arc::clone(&registry),
            requests.clone(),
            Arc::clone(&transport),
        );
        downloader.set_embed_tags(settings.embed_tags);

        let matcher = Matcher::new(
            Arc::clone(&registry),
            requests,
            transport,
            settings.probe_timeout,
        );

        Self {
            aggregator: Aggregator::new(Arc::clone(&registry)),
            registry,
            downloader,
            matcher,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    // ==================
    // SEARCH
    // ==================

    /// Search the configured sources, keeping the per-platform limit.
    ///
    /// # Errors
    ///
    /// Returns `NoResults` when no platform returned anything.
    pub async fn search(&self, keyword: &str) -> Result<Vec<Track>> {
        let tracks = self
            .aggregator
            .search_limited(
                keyword,
                &self.settings.sources,
                Some(self.settings.per_platform_limit),
            )
            .await;
        if tracks.is_empty() {
            return Err(MusicError::NoResults);
        }
        Ok(tracks)
    }

    /// Search playlists on the configured sources.
    pub async fn search_playlists(&self, keyword: &str) -> Vec<Playlist> {
        self.aggregator
            .search_playlists(keyword, &self.settings.sources)
            .await
    }

    // ==================
    // DOWNLOADS
    // ==================

    /// Download a track into the configured output directory.
    pub async fn download_track(&self, track: &Track) -> Result<DownloadResult> {
        self.downloader
            .download_track(
                track,
                &self.settings.output_dir,
                self.settings.with_cover,
                self.settings.with_lyrics,
            )
            .await
    }

    /// Parse a share or file link and download the track behind it.
    pub async fn download_link(&self, link: &str) -> Result<DownloadResult> {
        let track = self.aggregator.parse_link(link).await?;
        info!("Resolved link to '{}' on {}", track.title, track.platform);
        self.download_track(&track).await
    }

    /// Download every track of a playlist.
    ///
    /// Tracks go into `<output>/<platform>-<id>`. A failing track is
    /// recorded and the batch continues.
    pub async fn download_playlist(&self, platform: &str, id: &str) -> Result<BatchDownloadResult> {
        let tracks = self.aggregator.playlist_tracks(platform, id).await?;
        let directory = self
            .settings
            .output_dir
            .join(sanitize_filename(&format!("{}-{}", platform, id)));

        let mut result = BatchDownloadResult {
            directory: directory.clone(),
            successful: Vec::new(),
            failed: Vec::new(),
        };

        for track in &tracks {
            match self
                .downloader
                .download_track(
                    track,
                    &directory,
                    self.settings.with_cover,
                    self.settings.with_lyrics,
                )
                .await
            {
                Ok(download) => result.successful.push(download),
                Err(e) => {
                    warn!("Playlist track '{}' failed: {}", track.title, e);
                    result.failed.push((track.title.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Playlist {} on {}: {}/{} downloaded",
            id,
            platform,
            result.successful.len(),
            result.total()
        );
        Ok(result)
    }

    // ==================
    // MATCHING
    // ==================

    /// Find `query` on another platform. See [`Matcher::switch_platform`].
    pub async fn switch_platform(&self, query: &MatchQuery) -> Result<Match> {
        self.matcher.switch_platform(query).await
    }

    /// Probe a track's audio. See [`Matcher::inspect`].
    pub async fn inspect(&self, track: &Track) -> Inspection {
        self.matcher.inspect(track).await
    }
}

#[async_trait]
impl Backend for MusicDl {
    async fn search(&self, keyword: &str) -> Result<Vec<Track>> {
        MusicDl::search(self, keyword).await
    }

    async fn download(&self, track: &Track) -> Result<()> {
        self.download_track(track).await.map(|_| ())
    }
}
