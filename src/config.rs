//! Runtime settings and per-platform cookies.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

/// Default cookie file name.
pub const COOKIE_FILE: &str = "cookies.json";

/// Download and search settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory downloads are written to.
    pub output_dir: PathBuf,
    /// Platforms to search; empty means the default set.
    pub sources: Vec<String>,
    /// Write a `.jpg` cover next to each download.
    pub with_cover: bool,
    /// Write a `.lrc` lyrics file next to each download.
    pub with_lyrics: bool,
    /// Embed title/artist/album/cover tags into the audio file.
    pub embed_tags: bool,
    /// Results kept per platform in interactive searches.
    pub per_platform_limit: usize,
    /// Timeout of the two-byte playability probe.
    pub probe_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            sources: Vec::new(),
            with_cover: true,
            with_lyrics: true,
            embed_tags: false,
            per_platform_limit: 5,
            probe_timeout: Duration::from_secs(5),
        }
    }
}

impl Settings {
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_cover(mut self, enabled: bool) -> Self {
        self.with_cover = enabled;
        self
    }

    pub fn with_lyrics(mut self, enabled: bool) -> Self {
        self.with_lyrics = enabled;
        self
    }

    pub fn with_embed_tags(mut self, enabled: bool) -> Self {
        self.embed_tags = enabled;
        self
    }

    pub fn with_per_platform_limit(mut self, limit: usize) -> Self {
        self.per_platform_limit = limit;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

/// Per-platform session cookies.
///
/// Cheap to clone; clones share the same map so a cookie set after startup
/// is seen by every request builder holding a handle.
#[derive(Debug, Clone, Default)]
pub struct Cookies {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl Cookies {
    /// Create an empty cookie store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load cookies from a JSON object file. A missing file yields an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No cookie file at {}", path.display());
            return Ok(Self::new());
        }
        let data = fs::read_to_string(path)?;
        let map: HashMap<String, String> = serde_json::from_str(&data)?;
        debug!("Loaded {} cookies from {}", map.len(), path.display());
        Ok(Self {
            inner: Arc::new(RwLock::new(map)),
        })
    }

    /// Write the cookies to `path` as pretty JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Cookie for `platform`, if one is configured.
    pub fn get(&self, platform: &str) -> Option<String> {
        match self.inner.read() {
            Ok(map) => map.get(platform).filter(|c| !c.is_empty()).cloned(),
            Err(e) => {
                warn!("Cookie store poisoned: {}", e);
                None
            }
        }
    }

    /// Merge `cookies` into the store, skipping empty values.
    pub fn set_all(&self, cookies: HashMap<String, String>) {
        if let Ok(mut map) = self.inner.write() {
            for (platform, cookie) in cookies {
                if !cookie.is_empty() {
                    map.insert(platform, cookie);
                }
            }
        }
    }

    fn snapshot(&self) -> HashMap<String, String> {
        self.inner.read().map(|m| m.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_builder() {
        let settings = Settings::default()
            .with_output_dir("music")
            .with_cover(false)
            .with_per_platform_limit(3);
        assert_eq!(settings.output_dir, PathBuf::from("music"));
        assert!(!settings.with_cover);
        assert!(settings.with_lyrics);
        assert_eq!(settings.per_platform_limit, 3);
        assert_eq!(settings.probe_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_cookies_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cookies = Cookies::load(dir.path().join("absent.json")).unwrap();
        assert!(cookies.get("qq").is_none());
    }

    #[test]
    fn test_cookies_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COOKIE_FILE);

        let cookies = Cookies::new();
        let mut update = HashMap::new();
        update.insert("qq".to_string(), "uin=1".to_string());
        update.insert("netease".to_string(), String::new());
        cookies.set_all(update);
        cookies.save(&path).unwrap();

        let loaded = Cookies::load(&path).unwrap();
        assert_eq!(loaded.get("qq").as_deref(), Some("uin=1"));
        assert!(loaded.get("netease").is_none());
    }

    #[test]
    fn test_cookie_clones_share_state() {
        let cookies = Cookies::new();
        let handle = cookies.clone();
        cookies.set_all(HashMap::from([("migu".to_string(), "a=b".to_string())]));
        assert_eq!(handle.get("migu").as_deref(), Some("a=b"));
    }
}
