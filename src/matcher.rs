//! Cross-platform track matching ("switch source").
//!
//! Given a reference track, search the other platforms for the same
//! recording, rank candidates by [`similarity::score`] and return the best
//! one whose audio actually answers a range probe.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::aggregator::join_tasks;
use crate::api::platform::is_switch_excluded;
use crate::api::{Registry, RequestBuilder, Search, Transport};
use crate::error::{MusicError, Result};
use crate::models::Track;
use crate::similarity::{self, is_duration_close};

/// Only the head of each platform's result list is scored.
const CANDIDATES_PER_PLATFORM: usize = 8;

/// Reference track to find elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MatchQuery {
    pub title: String,
    /// May be empty.
    pub artist: String,
    /// Platform the reference came from; never searched. Empty for none.
    pub exclude: String,
    /// Reference duration in seconds, 0 if unknown.
    pub duration: u32,
    /// Search only this platform when set.
    pub target: Option<String>,
}

impl MatchQuery {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    pub fn excluding(mut self, platform: impl Into<String>) -> Self {
        self.exclude = platform.into();
        self
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    pub fn on(mut self, platform: impl Into<String>) -> Self {
        self.target = Some(platform.into());
        self
    }
}

/// A validated candidate and its similarity to the reference.
#[derive(Debug, Clone)]
pub struct Match {
    pub track: Track,
    pub score: f64,
}

/// Probe report for a single track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inspection {
    /// The probe answered 200 or 206.
    pub valid: bool,
    /// Resolved audio URL, empty when resolution failed.
    pub url: String,
    /// Total size in bytes, 0 when unknown.
    pub size: u64,
    /// Estimated bitrate in kbps.
    pub bitrate: Option<u64>,
}

#[derive(Debug)]
struct Candidate {
    track: Track,
    score: f64,
    duration_diff: u32,
}

/// Finds the same recording on other platforms.
#[derive(Clone)]
pub struct Matcher {
    registry: Arc<Registry>,
    requests: RequestBuilder,
    transport: Arc<dyn Transport>,
    probe_timeout: Duration,
}

impl Matcher {
    pub fn new(
        registry: Arc<Registry>,
        requests: RequestBuilder,
        transport: Arc<dyn Transport>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            requests,
            transport,
            probe_timeout,
        }
    }

    fn candidate_platforms(&self, query: &MatchQuery) -> Vec<String> {
        match &query.target {
            Some(target) => vec![target.clone()],
            None => self
                .registry
                .platforms()
                .iter()
                .filter(|p| **p != query.exclude && !is_switch_excluded(p))
                .cloned()
                .collect(),
        }
    }

    /// Find the best playable counterpart of `query` on another platform.
    ///
    /// Candidates are validated one at a time in rank order, so the result
    /// is the highest-ranked track that plays rather than the highest score.
    ///
    /// # Errors
    ///
    /// - `MalformedRequest` if the title is blank
    /// - `NoMatch` if no platform produced a candidate scoring above zero
    /// - `NoPlayableMatch` if every candidate failed validation
    pub async fn switch_platform(&self, query: &MatchQuery) -> Result<Match> {
        if query.title.trim().is_empty() {
            return Err(MusicError::MalformedRequest("title is required".to_string()));
        }

        let mut candidates = self.collect_candidates(query).await;
        if candidates.is_empty() {
            info!("No candidates for '{}' '{}'", query.title, query.artist);
            return Err(MusicError::NoMatch);
        }

        // stable: equal keys keep discovery order
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.duration_diff.cmp(&b.duration_diff))
        });

        for candidate in candidates {
            if self.validate(&candidate.track).await {
                info!(
                    "Matched '{}' on {} (score {:.2})",
                    candidate.track.title, candidate.track.platform, candidate.score
                );
                return Ok(Match {
                    track: candidate.track,
                    score: candidate.score,
                });
            }
            debug!(
                "Candidate {} on {} is not playable",
                candidate.track.id, candidate.track.platform
            );
        }

        Err(MusicError::NoPlayableMatch)
    }

    /// Search every candidate platform concurrently and keep scored tracks.
    ///
    /// Results are merged in platform order so ties rank deterministically.
    async fn collect_candidates(&self, query: &MatchQuery) -> Vec<Candidate> {
        let platforms = self.candidate_platforms(query);
        let found = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for (rank, platform) in platforms.into_iter().enumerate() {
            let Some(searcher) = self.registry.search(&platform) else {
                debug!("Platform {} cannot be searched, skipping", platform);
                continue;
            };

            let query = query.clone();
            let found = Arc::clone(&found);
            handles.push(tokio::spawn(async move {
                let tracks = search_with_fallback(searcher.as_ref(), &query, &platform).await;
                let scored: Vec<Candidate> = tracks
                    .into_iter()
                    .take(CANDIDATES_PER_PLATFORM)
                    .filter_map(|mut track| {
                        let score = similarity::score(
                            &query.title,
                            &query.artist,
                            &track.title,
                            &track.artist,
                        );
                        if score <= 0.0 || !is_duration_close(query.duration, track.duration) {
                            return None;
                        }
                        track.platform = platform.clone();
                        let duration_diff = if query.duration > 0 && track.duration > 0 {
                            query.duration.abs_diff(track.duration)
                        } else {
                            0
                        };
                        Some(Candidate {
                            track,
                            score,
                            duration_diff,
                        })
                    })
                    .collect();
                found.lock().await.push((rank, scored));
            }));
        }

        join_tasks(handles).await;

        let mut per_platform = std::mem::take(&mut *found.lock().await);
        per_platform.sort_by_key(|(rank, _)| *rank);
        per_platform
            .into_iter()
            .flat_map(|(_, candidates)| candidates)
            .collect()
    }

    /// Check that `track` resolves to audio answering a two-byte range probe.
    ///
    /// Fails closed: any missing capability, lookup error or bad status is
    /// `false`.
    pub async fn validate(&self, track: &Track) -> bool {
        if is_switch_excluded(&track.platform) || track.id.is_empty() || track.platform.is_empty()
        {
            return false;
        }
        let Some(resolver) = self.registry.resolve_url(&track.platform) else {
            return false;
        };
        let url = match resolver.download_url(track).await {
            Ok(url) if !url.is_empty() => url,
            Ok(_) => return false,
            Err(e) => {
                debug!("Resolve failed for {} on {}: {}", track.id, track.platform, e);
                return false;
            }
        };
        self.probe(&url, &track.platform)
            .await
            .map(|(playable, _)| playable)
            .unwrap_or(false)
    }

    /// Probe `track` and report URL, size and estimated bitrate.
    ///
    /// Unlike [`validate`](Self::validate) this also covers platforms that
    /// serve protected audio.
    pub async fn inspect(&self, track: &Track) -> Inspection {
        let url = match self.inspect_url(track).await {
            Some(url) => url,
            None => return Inspection::default(),
        };

        let (valid, size) = match self.probe(&url, &track.platform).await {
            Some((true, size)) => (true, size.unwrap_or(0)),
            _ => (false, 0),
        };
        let bitrate = (valid && size > 0 && track.duration > 0)
            .then(|| size * 8 / u64::from(track.duration) / 1000);

        Inspection {
            valid,
            url,
            size,
            bitrate,
        }
    }

    async fn inspect_url(&self, track: &Track) -> Option<String> {
        if let Some(protected) = self.registry.protected(&track.platform) {
            return match protected.media(track).await {
                Ok(media) => Some(media.url),
                Err(e) => {
                    debug!("No protected media for {}: {}", track.id, e);
                    None
                }
            };
        }
        let resolver = self.registry.resolve_url(&track.platform)?;
        match resolver.download_url(track).await {
            Ok(url) if !url.is_empty() => Some(url),
            _ => None,
        }
    }

    /// `(playable, total size)`, or `None` when the request never completed.
    async fn probe(&self, url: &str, platform: &str) -> Option<(bool, Option<u64>)> {
        let request = match self.requests.probe(url, platform, self.probe_timeout) {
            Ok(r) => r,
            Err(e) => {
                warn!("Cannot probe {}: {}", url, e);
                return None;
            }
        };
        match self.transport.execute(request).await {
            Ok(fetched) => Some((fetched.is_playable(), fetched.total_size())),
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                None
            }
        }
    }
}

/// Search "title artist", falling back to the title alone when that finds
/// nothing and an artist was given.
async fn search_with_fallback(searcher: &dyn Search, query: &MatchQuery, platform: &str) -> Vec<Track> {
    let has_artist = !query.artist.trim().is_empty();
    let keyword = if has_artist {
        format!("{} {}", query.title, query.artist)
    } else {
        query.title.clone()
    };

    let first = match searcher.search(&keyword).await {
        Ok(tracks) => tracks,
        Err(e) => {
            warn!("Match search on {} failed: {}", platform, e);
            Vec::new()
        }
    };
    if !first.is_empty() || !has_artist {
        return first;
    }

    debug!("Retrying {} with title only", platform);
    searcher.search(&query.title).await.unwrap_or_else(|e| {
        warn!("Title-only search on {} failed: {}", platform, e);
        Vec::new()
    })
}
