//! Download orchestration: audio plus optional cover and lyric sidecars.
//!
//! Only the audio step can fail a download. Cover, lyrics and tag embedding
//! are best-effort and logged when they go wrong.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::api::{Capability, Registry, RequestBuilder, Transport};
use crate::error::{MusicError, Result};
use crate::models::Track;
use crate::tagging::{self, AudioMetadata};

/// Result of a single track download.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Path to the audio file.
    pub path: PathBuf,
    /// Path to the cover sidecar, if one was written.
    pub cover_path: Option<PathBuf>,
    /// Path to the lyrics sidecar, if one was written.
    pub lyrics_path: Option<PathBuf>,
    /// Audio size in bytes.
    pub size: u64,
    /// Track title.
    pub title: String,
    /// Artist name.
    pub artist: String,
}

/// Writes tracks to disk using the platform's download path.
#[derive(Clone)]
pub struct Downloader {
    registry: Arc<Registry>,
    requests: RequestBuilder,
    transport: Arc<dyn Transport>,
    /// Whether to embed metadata tags in downloaded files.
    embed_tags: bool,
}

impl Downloader {
    /// Create a downloader.
    pub fn new(
        registry: Arc<Registry>,
        requests: RequestBuilder,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry,
            requests,
            transport,
            embed_tags: false,
        }
    }

    /// Enable or disable embedding title/artist/album/cover tags.
    pub fn set_embed_tags(&mut self, embed: bool) {
        self.embed_tags = embed;
    }

    /// Check if metadata tagging is enabled.
    pub fn embed_tags(&self) -> bool {
        self.embed_tags
    }

    /// Download `track` into `output_dir`.
    ///
    /// Writes `<base>.<ext>`, and when requested `<base>.jpg` and
    /// `<base>.lrc`, where `<base>` is [`Track::base_name`].
    ///
    /// # Errors
    ///
    /// - `UnsupportedCapability` if the platform cannot resolve download URLs
    /// - `ResolutionFailure` if the URL lookup fails or comes back empty
    /// - `TransportFailure` if fetching the audio fails
    /// - `DecryptionFailure` if a protected payload cannot be decrypted
    pub async fn download_track<P: AsRef<Path>>(
        &self,
        track: &Track,
        output_dir: P,
        want_cover: bool,
        want_lyrics: bool,
    ) -> Result<DownloadResult> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir).await?;

        let output_path = output_dir.join(track.filename());
        let base = track.base_name();

        let audio = if self.registry.requires_decryption(&track.platform) {
            self.fetch_protected(track).await?
        } else {
            self.fetch_plain(track).await?
        };
        fs::write(&output_path, &audio).await?;
        info!(
            "Saved {} ({} bytes) from {}",
            output_path.display(),
            audio.len(),
            track.platform
        );

        let cover = if (want_cover || self.embed_tags) && !track.cover.is_empty() {
            self.fetch_cover(track).await
        } else {
            None
        };

        let mut cover_path = None;
        if want_cover {
            if let Some(bytes) = &cover {
                let path = output_dir.join(format!("{}.jpg", base));
                match fs::write(&path, bytes).await {
                    Ok(()) => cover_path = Some(path),
                    Err(e) => warn!("Could not write cover {}: {}", path.display(), e),
                }
            }
        }

        let lyrics_path = if want_lyrics {
            self.save_lyrics(track, &output_dir.join(format!("{}.lrc", base)))
                .await
        } else {
            None
        };

        if self.embed_tags {
            let mut metadata = AudioMetadata::from_track(track);
            if let Some(bytes) = cover {
                metadata = metadata.with_cover_art(bytes.to_vec());
            }
            tagging::write_metadata(&output_path, &metadata);
        }

        Ok(DownloadResult {
            path: output_path,
            cover_path,
            lyrics_path,
            size: audio.len() as u64,
            title: track.title.clone(),
            artist: track.artist.clone(),
        })
    }

    /// Encrypted payload + play-auth token → decrypted audio.
    async fn fetch_protected(&self, track: &Track) -> Result<Vec<u8>> {
        let protected = self
            .registry
            .protected(&track.platform)
            .ok_or_else(|| MusicError::unsupported(&track.platform, Capability::ProtectedAudio))?;

        let media = protected.media(track).await.map_err(|e| {
            MusicError::ResolutionFailure(format!("failed to get protected media: {}", e))
        })?;
        debug!("Fetching encrypted payload for {}", track.id);

        let request = self.requests.get(&media.url, &track.platform)?;
        let payload = self
            .transport
            .execute(request)
            .await?
            .into_body("encrypted payload")?;

        protected
            .decrypt(&payload, &media.play_auth)
            .map_err(|e| match e {
                MusicError::DecryptionFailure(_) => e,
                other => MusicError::DecryptionFailure(other.to_string()),
            })
    }

    /// Resolve the download URL and fetch the raw bytes.
    async fn fetch_plain(&self, track: &Track) -> Result<Vec<u8>> {
        let resolver = self
            .registry
            .resolve_url(&track.platform)
            .ok_or_else(|| MusicError::unsupported(&track.platform, Capability::ResolveUrl))?;

        let url = resolver.download_url(track).await.map_err(|e| {
            MusicError::ResolutionFailure(format!("failed to get download url: {}", e))
        })?;
        if url.is_empty() {
            return Err(MusicError::ResolutionFailure(format!(
                "track {} has no download url",
                track.id
            )));
        }

        let request = self.requests.get(&url, &track.platform)?;
        let body = self.transport.execute(request).await?.into_body("audio")?;
        Ok(body.to_vec())
    }

    async fn fetch_cover(&self, track: &Track) -> Option<Bytes> {
        let request = match self.requests.get(&track.cover, "") {
            Ok(r) => r,
            Err(e) => {
                warn!("Bad cover url for {}: {}", track.id, e);
                return None;
            }
        };
        match self.transport.execute(request).await {
            Ok(fetched) => match fetched.into_body("cover") {
                Ok(bytes) if !bytes.is_empty() => Some(bytes),
                Ok(_) => None,
                Err(e) => {
                    warn!("Cover download failed for {}: {}", track.id, e);
                    None
                }
            },
            Err(e) => {
                warn!("Cover download failed for {}: {}", track.id, e);
                None
            }
        }
    }

    async fn save_lyrics(&self, track: &Track, path: &Path) -> Option<PathBuf> {
        let fetcher = self.registry.lyrics(&track.platform)?;
        let lyrics = match fetcher.lyrics(track).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => return None,
            Err(e) => {
                debug!("No lyrics for {}: {}", track.id, e);
                return None;
            }
        };
        match fs::write(path, lyrics).await {
            Ok(()) => Some(path.to_path_buf()),
            Err(e) => {
                warn!("Could not write lyrics {}: {}", path.display(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CapabilityRecord, ProtectedAudio, ProtectedMedia};
    use crate::testing::{track_on, FakeTransport, FixedLyrics, UrlTable};
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    const AUDIO_URL: &str = "https://cdn.example.org/audio/1.mp3";
    const COVER_URL: &str = "https://img.example.org/cover/1.jpg";

    struct XorProtected;

    #[async_trait]
    impl ProtectedAudio for XorProtected {
        async fn media(&self, _track: &Track) -> Result<ProtectedMedia> {
            Ok(ProtectedMedia {
                url: "https://cdn.example.org/enc/1".to_string(),
                play_auth: "k".to_string(),
            })
        }

        fn decrypt(&self, payload: &[u8], play_auth: &str) -> Result<Vec<u8>> {
            if play_auth != "k" {
                return Err(MusicError::DecryptionFailure("bad token".to_string()));
            }
            Ok(payload.iter().map(|b| b ^ 0x01).collect())
        }
    }

    struct BrokenProtected;

    #[async_trait]
    impl ProtectedAudio for BrokenProtected {
        async fn media(&self, _track: &Track) -> Result<ProtectedMedia> {
            Ok(ProtectedMedia {
                url: "https://cdn.example.org/enc/1".to_string(),
                play_auth: "zzz".to_string(),
            })
        }

        fn decrypt(&self, _payload: &[u8], _play_auth: &str) -> Result<Vec<u8>> {
            Err(MusicError::ApiError("unknown box layout".to_string()))
        }
    }

    fn downloader(registry: Registry, transport: FakeTransport) -> Downloader {
        Downloader::new(
            Arc::new(registry),
            RequestBuilder::default(),
            Arc::new(transport),
        )
    }

    fn plain_registry() -> Registry {
        Registry::builder()
            .register(
                "netease",
                CapabilityRecord::new()
                    .with_resolve_url(Arc::new(UrlTable::default().with("1", AUDIO_URL)))
                    .with_lyrics(Arc::new(FixedLyrics("[00:00.00] 晴天"))),
            )
            .build()
    }

    fn sample_track() -> Track {
        Track {
            cover: COVER_URL.to_string(),
            ..track_on("netease", "1", "晴天", "周杰伦", 269)
        }
    }

    #[tokio::test]
    async fn test_cover_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new()
            .respond(AUDIO_URL, 200, b"ID3audio")
            .fail(COVER_URL);
        let dl = downloader(plain_registry(), transport);

        let result = assert_ok!(
            dl.download_track(&sample_track(), dir.path(), true, true)
                .await
        );

        assert_eq!(result.path, dir.path().join("晴天 - 周杰伦.mp3"));
        assert_eq!(result.size, 8);
        assert!(result.cover_path.is_none());
        assert_eq!(result.lyrics_path, Some(dir.path().join("晴天 - 周杰伦.lrc")));
        assert!(dir.path().join("晴天 - 周杰伦.mp3").exists());
        assert!(dir.path().join("晴天 - 周杰伦.lrc").exists());
        assert!(!dir.path().join("晴天 - 周杰伦.jpg").exists());
    }

    #[tokio::test]
    async fn test_all_sidecars_share_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new()
            .respond(AUDIO_URL, 200, b"audio")
            .respond(COVER_URL, 200, b"\xFF\xD8\xFFjpeg");
        let dl = downloader(plain_registry(), transport);

        let result = dl
            .download_track(&sample_track(), dir.path().join("nested"), true, true)
            .await
            .unwrap();

        let cover = result.cover_path.unwrap();
        assert_eq!(cover.file_stem(), result.path.file_stem());
        assert_eq!(cover.extension().unwrap(), "jpg");
        let lyrics = std::fs::read_to_string(result.lyrics_path.unwrap()).unwrap();
        assert_eq!(lyrics, "[00:00.00] 晴天");
    }

    #[tokio::test]
    async fn test_sidecars_skipped_when_not_requested() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new()
            .respond(AUDIO_URL, 200, b"audio")
            .respond(COVER_URL, 200, b"jpeg");
        let dl = downloader(plain_registry(), transport);

        let result = dl
            .download_track(&sample_track(), dir.path(), false, false)
            .await
            .unwrap();
        assert!(result.cover_path.is_none());
        assert!(result.lyrics_path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_platform_fails() {
        let dir = tempfile::tempdir().unwrap();
        let dl = downloader(plain_registry(), FakeTransport::new());
        let track = track_on("joox", "1", "晴天", "周杰伦", 0);

        let err = dl
            .download_track(&track, dir.path(), false, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MusicError::UnsupportedCapability {
                capability: Capability::ResolveUrl,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_url_is_resolution_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::builder()
            .register(
                "kuwo",
                CapabilityRecord::new().with_resolve_url(Arc::new(UrlTable::default().with("1", ""))),
            )
            .build();
        let dl = downloader(registry, FakeTransport::new());

        let err = dl
            .download_track(&track_on("kuwo", "1", "a", "b", 0), dir.path(), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, MusicError::ResolutionFailure(_)));
    }

    #[tokio::test]
    async fn test_audio_http_error_is_transport_failure() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FakeTransport::new().respond(AUDIO_URL, 403, b"forbidden");
        let dl = downloader(plain_registry(), transport);

        let err = assert_err!(
            dl.download_track(&sample_track(), dir.path(), false, false)
                .await
        );
        assert!(matches!(err, MusicError::TransportFailure(_)));
        assert!(!dir.path().join("晴天 - 周杰伦.mp3").exists());
    }

    #[tokio::test]
    async fn test_protected_platform_decrypts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::builder()
            .register(
                "soda",
                CapabilityRecord::new().with_protected(Arc::new(XorProtected)),
            )
            .build();
        let transport = FakeTransport::new().respond("https://cdn.example.org/enc/1", 200, b"\x00\x01");
        let dl = downloader(registry, transport);

        let result = dl
            .download_track(&track_on("soda", "1", "t", "a", 0), dir.path(), false, false)
            .await
            .unwrap();
        assert_eq!(std::fs::read(result.path).unwrap(), vec![0x01, 0x00]);
    }

    #[tokio::test]
    async fn test_decryption_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::builder()
            .register(
                "soda",
                CapabilityRecord::new().with_protected(Arc::new(BrokenProtected)),
            )
            .build();
        let transport = FakeTransport::new().respond("https://cdn.example.org/enc/1", 200, b"xx");
        let dl = downloader(registry, transport);

        let err = dl
            .download_track(&track_on("soda", "1", "t", "a", 0), dir.path(), false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, MusicError::DecryptionFailure(_)));
    }
}
