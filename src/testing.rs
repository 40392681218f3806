//! Fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Request;

use crate::api::{Fetched, FetchLyrics, ResolveUrl, Search, Transport};
use crate::error::{MusicError, Result};
use crate::models::Track;

/// Transport answering from a URL → response table.
///
/// Unknown URLs and URLs registered with [`fail`](Self::fail) produce a
/// `TransportFailure`.
#[derive(Default)]
pub struct FakeTransport {
    routes: HashMap<String, Option<Fetched>>,
    seen: Mutex<Vec<(String, HeaderMap)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, status: u16, body: &'static [u8]) -> Self {
        self.routes.insert(
            url.to_string(),
            Some(Fetched {
                status,
                content_length: Some(body.len() as u64),
                content_range: None,
                body: Bytes::from_static(body),
            }),
        );
        self
    }

    pub fn respond_with(mut self, url: &str, fetched: Fetched) -> Self {
        self.routes.insert(url.to_string(), Some(fetched));
        self
    }

    pub fn fail(mut self, url: &str) -> Self {
        self.routes.insert(url.to_string(), None);
        self
    }

    /// URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    /// Header value of the `n`-th request.
    pub fn header(&self, n: usize, name: &str) -> Option<String> {
        self.seen.lock().unwrap()[n]
            .1
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: Request) -> Result<Fetched> {
        let url = request.url().to_string();
        self.seen
            .lock()
            .unwrap()
            .push((url.clone(), request.headers().clone()));
        match self.routes.get(&url) {
            Some(Some(fetched)) => Ok(fetched.clone()),
            _ => Err(MusicError::TransportFailure(format!("connection refused: {}", url))),
        }
    }
}

/// Search returning a fixed list, optionally only for one keyword.
pub struct FixedSearch {
    pub keyword: Option<String>,
    pub tracks: Vec<Track>,
}

impl FixedSearch {
    pub fn any(tracks: Vec<Track>) -> Self {
        Self {
            keyword: None,
            tracks,
        }
    }

    pub fn only(keyword: &str, tracks: Vec<Track>) -> Self {
        Self {
            keyword: Some(keyword.to_string()),
            tracks,
        }
    }
}

#[async_trait]
impl Search for FixedSearch {
    async fn search(&self, keyword: &str) -> Result<Vec<Track>> {
        match &self.keyword {
            Some(expected) if expected != keyword => Ok(Vec::new()),
            _ => Ok(self.tracks.clone()),
        }
    }
}

/// Resolver mapping track id → URL; unknown ids fail.
#[derive(Default)]
pub struct UrlTable(pub HashMap<String, String>);

impl UrlTable {
    pub fn with(mut self, id: &str, url: &str) -> Self {
        self.0.insert(id.to_string(), url.to_string());
        self
    }
}

#[async_trait]
impl ResolveUrl for UrlTable {
    async fn download_url(&self, track: &Track) -> Result<String> {
        self.0
            .get(&track.id)
            .cloned()
            .ok_or_else(|| MusicError::ApiError(format!("no url for {}", track.id)))
    }
}

/// Lyrics returning fixed text.
pub struct FixedLyrics(pub &'static str);

#[async_trait]
impl FetchLyrics for FixedLyrics {
    async fn lyrics(&self, _track: &Track) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Build a track already tagged with `platform`.
pub fn track_on(platform: &str, id: &str, title: &str, artist: &str, duration: u32) -> Track {
    Track {
        platform: platform.to_string(),
        duration,
        ..Track::new(id, title, artist)
    }
}
