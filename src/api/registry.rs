//! Capability registry: platform id → optional capability set.

use std::collections::HashMap;
use std::sync::Arc;

use super::capability::{
    Capability, CapabilityRecord, FetchLyrics, ParseLink, PlaylistTracks, ProtectedAudio,
    ResolveUrl, Search, SearchPlaylists,
};
use super::platform::{DEFAULT_EXCLUDED, REFERENCE_ORDER};

/// Registry of per-platform capability records.
///
/// Lookups never fail: an unknown platform and an unimplemented capability
/// both come back as `None`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use music_dl::api::{platform, CapabilityRecord, DirectLink, Registry};
///
/// let direct = Arc::new(DirectLink);
/// let registry = Registry::builder()
///     .register(
///         platform::DIRECT,
///         CapabilityRecord::new()
///             .with_parse_link(direct.clone())
///             .with_resolve_url(direct),
///     )
///     .build();
///
/// assert!(registry.search(platform::DIRECT).is_none());
/// assert!(registry.resolve_url("unknown").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: HashMap<String, CapabilityRecord>,
    order: Vec<String>,
}

/// Builder collecting platform records before the registry is frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    records: HashMap<String, CapabilityRecord>,
    registration: Vec<String>,
}

impl RegistryBuilder {
    /// Register (or replace) the record for `platform`.
    pub fn register<S: Into<String>>(mut self, platform: S, record: CapabilityRecord) -> Self {
        let platform = platform.into();
        if !self.records.contains_key(&platform) {
            self.registration.push(platform.clone());
        }
        self.records.insert(platform, record);
        self
    }

    /// Freeze the registry.
    ///
    /// Known platforms are ordered by the reference ordering, anything else
    /// follows in registration order.
    pub fn build(self) -> Registry {
        let mut order: Vec<String> = REFERENCE_ORDER
            .iter()
            .filter(|p| self.records.contains_key(**p))
            .map(|p| p.to_string())
            .collect();
        for platform in self.registration {
            if !REFERENCE_ORDER.contains(&platform.as_str()) {
                order.push(platform);
            }
        }

        Registry {
            records: self.records,
            order,
        }
    }
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Get the full record for a platform.
    pub fn record(&self, platform: &str) -> Option<&CapabilityRecord> {
        self.records.get(platform)
    }

    /// Check whether `platform` implements `capability`.
    pub fn supports(&self, platform: &str, capability: Capability) -> bool {
        self.record(platform)
            .map(|r| r.has(capability))
            .unwrap_or(false)
    }

    pub fn search(&self, platform: &str) -> Option<Arc<dyn Search>> {
        self.record(platform)?.search.clone()
    }

    pub fn resolve_url(&self, platform: &str) -> Option<Arc<dyn ResolveUrl>> {
        self.record(platform)?.resolve_url.clone()
    }

    pub fn lyrics(&self, platform: &str) -> Option<Arc<dyn FetchLyrics>> {
        self.record(platform)?.lyrics.clone()
    }

    pub fn parse_link(&self, platform: &str) -> Option<Arc<dyn ParseLink>> {
        self.record(platform)?.parse_link.clone()
    }

    pub fn search_playlists(&self, platform: &str) -> Option<Arc<dyn SearchPlaylists>> {
        self.record(platform)?.search_playlists.clone()
    }

    pub fn playlist_tracks(&self, platform: &str) -> Option<Arc<dyn PlaylistTracks>> {
        self.record(platform)?.playlist_tracks.clone()
    }

    pub fn protected(&self, platform: &str) -> Option<Arc<dyn ProtectedAudio>> {
        self.record(platform)?.protected.clone()
    }

    /// Whether downloads from `platform` go through decryption.
    pub fn requires_decryption(&self, platform: &str) -> bool {
        self.supports(platform, Capability::ProtectedAudio)
    }

    /// All registered platforms in reference order.
    pub fn platforms(&self) -> &[String] {
        &self.order
    }

    /// Registered platforms minus the ones excluded by default.
    pub fn default_platforms(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|p| !DEFAULT_EXCLUDED.contains(&p.as_str()))
            .cloned()
            .collect()
    }

    /// Put caller-chosen platforms into reference order, dropping duplicates.
    ///
    /// Unregistered names are kept (after the known ones) so the caller's
    /// fan-out still logs them as unsupported.
    pub fn ordered(&self, requested: &[String]) -> Vec<String> {
        let mut out: Vec<String> = self
            .order
            .iter()
            .filter(|p| requested.contains(p))
            .cloned()
            .collect();
        for platform in requested {
            if !out.contains(platform) {
                out.push(platform.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::platform::{BILIBILI, DIRECT, NETEASE, QQ};
    use crate::api::DirectLink;

    fn registry() -> Registry {
        let direct = Arc::new(DirectLink);
        Registry::builder()
            .register(DIRECT, CapabilityRecord::new().with_resolve_url(direct.clone()))
            .register(BILIBILI, CapabilityRecord::new().with_parse_link(direct.clone()))
            .register(QQ, CapabilityRecord::new().with_resolve_url(direct.clone()))
            .register(NETEASE, CapabilityRecord::new().with_resolve_url(direct))
            .build()
    }

    #[test]
    fn test_unknown_platform_is_absent() {
        let registry = registry();
        assert!(registry.search("nope").is_none());
        assert!(registry.resolve_url("nope").is_none());
        assert!(registry.lyrics("").is_none());
        assert!(registry.protected("nope").is_none());
        assert!(!registry.supports("nope", Capability::ParseLink));
    }

    #[test]
    fn test_missing_capability_is_absent() {
        let registry = registry();
        assert!(registry.search(QQ).is_none());
        assert!(registry.resolve_url(QQ).is_some());
        assert!(!registry.requires_decryption(QQ));
    }

    #[test]
    fn test_reference_ordering() {
        let registry = registry();
        assert_eq!(registry.platforms(), &["netease", "qq", "bilibili", "direct"]);
        assert_eq!(registry.default_platforms(), vec!["netease", "qq", "direct"]);
    }

    #[test]
    fn test_ordered_requested_platforms() {
        let registry = registry();
        let requested = vec!["ghost".to_string(), QQ.to_string(), NETEASE.to_string()];
        assert_eq!(registry.ordered(&requested), vec!["netease", "qq", "ghost"]);
    }
}
