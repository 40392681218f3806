//! Concurrent fan-out of searches across platforms.
//!
//! Every platform runs in its own task. A platform that errors, panics or
//! lacks the capability contributes nothing and never delays the others
//! beyond the final join.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::platform::{detect_platform, PLAYLIST_DEFAULT};
use crate::api::{Capability, Registry};
use crate::error::{MusicError, Result};
use crate::models::{Playlist, Track};

/// Fan-out search over a [`Registry`].
#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<Registry>,
}

impl Aggregator {
    /// Create an aggregator over `registry`.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// The registry searches are dispatched through.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Platforms to query: the caller's choice in reference order, or the
    /// default set when none was given.
    fn targets(&self, platforms: &[String]) -> Vec<String> {
        if platforms.is_empty() {
            self.registry.default_platforms()
        } else {
            self.registry.ordered(platforms)
        }
    }

    /// Search every platform in `platforms` (default set when empty).
    ///
    /// Each returned track carries the platform it came from. Per-platform
    /// failures are logged and skipped; the result may be empty.
    pub async fn search(&self, keyword: &str, platforms: &[String]) -> Vec<Track> {
        self.search_limited(keyword, platforms, None).await
    }

    /// Like [`search`](Self::search), keeping at most `per_platform` results
    /// from each platform.
    pub async fn search_limited(
        &self,
        keyword: &str,
        platforms: &[String],
        per_platform: Option<usize>,
    ) -> Vec<Track> {
        let results = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for platform in self.targets(platforms) {
            let Some(searcher) = self.registry.search(&platform) else {
                debug!("Platform {} does not support search, skipping", platform);
                continue;
            };

            let keyword = keyword.to_string();
            let results = Arc::clone(&results);
            handles.push(tokio::spawn(async move {
                let mut tracks = match searcher.search(&keyword).await {
                    Ok(tracks) => tracks,
                    Err(e) => {
                        warn!("Search on {} failed: {}", platform, e);
                        return;
                    }
                };
                if let Some(limit) = per_platform {
                    tracks.truncate(limit);
                }
                for track in &mut tracks {
                    track.platform = platform.clone();
                }
                debug!("{} returned {} tracks", platform, tracks.len());
                results.lock().await.extend(tracks);
            }));
        }

        join_tasks(handles).await;

        let tracks = std::mem::take(&mut *results.lock().await);
        info!("Search '{}' collected {} tracks", keyword, tracks.len());
        tracks
    }

    /// Search playlists on `platforms` (playlist default set when empty).
    pub async fn search_playlists(&self, keyword: &str, platforms: &[String]) -> Vec<Playlist> {
        let targets = if platforms.is_empty() {
            let defaults: Vec<String> = PLAYLIST_DEFAULT.iter().map(|p| p.to_string()).collect();
            self.registry.ordered(&defaults)
        } else {
            self.registry.ordered(platforms)
        };

        let results = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for platform in targets {
            let Some(searcher) = self.registry.search_playlists(&platform) else {
                continue;
            };

            let keyword = keyword.to_string();
            let results = Arc::clone(&results);
            handles.push(tokio::spawn(async move {
                match searcher.search_playlists(&keyword).await {
                    Ok(mut playlists) => {
                        for playlist in &mut playlists {
                            playlist.platform = platform.clone();
                        }
                        results.lock().await.extend(playlists);
                    }
                    Err(e) => warn!("Playlist search on {} failed: {}", platform, e),
                }
            }));
        }

        join_tasks(handles).await;

        let mut collected = results.lock().await;
        std::mem::take(&mut *collected)
    }

    /// Tracks of playlist `id` on `platform`.
    pub async fn playlist_tracks(&self, platform: &str, id: &str) -> Result<Vec<Track>> {
        let fetcher = self
            .registry
            .playlist_tracks(platform)
            .ok_or_else(|| MusicError::unsupported(platform, Capability::PlaylistTracks))?;

        let mut tracks = fetcher.playlist_tracks(id).await?;
        for track in &mut tracks {
            track.platform = platform.to_string();
        }
        Ok(tracks)
    }

    /// Resolve a share link into a track on the platform that owns it.
    pub async fn parse_link(&self, link: &str) -> Result<Track> {
        let platform = detect_platform(link)
            .ok_or_else(|| MusicError::InvalidLink(format!("unrecognized link: {}", link)))?;

        let parser = self
            .registry
            .parse_link(platform)
            .ok_or_else(|| MusicError::unsupported(platform, Capability::ParseLink))?;

        let mut track = parser.parse_link(link).await?;
        track.platform = platform.to_string();
        Ok(track)
    }
}

/// Wait for every task; a panicked task is logged and otherwise ignored.
pub(crate) async fn join_tasks(handles: Vec<tokio::task::JoinHandle<()>>) {
    for outcome in join_all(handles).await {
        if let Err(e) = outcome {
            warn!("Platform task aborted: {}", e);
        }
    }
}
