//! Error types for platform lookups, downloads and matching.

use thiserror::Error;

use crate::api::Capability;

/// Main error type for all music-dl operations.
#[derive(Debug, Error)]
pub enum MusicError {
    /// The platform does not implement the requested capability.
    #[error("Platform {platform} does not support {capability}")]
    UnsupportedCapability {
        platform: String,
        capability: Capability,
    },

    /// A URL or lyric lookup returned an error or an empty result.
    #[error("Resolution failed: {0}")]
    ResolutionFailure(String),

    /// Network or timeout failure talking to a platform or CDN.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// Platform-specific payload transform failed.
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// No candidate on any platform scored above zero.
    #[error("no match")]
    NoMatch,

    /// Candidates were found but none passed the playability probe.
    #[error("no playable match")]
    NoPlayableMatch,

    /// Request builder input was invalid.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// A search finished without a single result.
    #[error("No results found")]
    NoResults,

    /// Link could not be attributed to any platform.
    #[error("Invalid link: {0}")]
    InvalidLink(String),

    /// Error reported by a platform adapter.
    #[error("API error: {0}")]
    ApiError(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for MusicError {
    fn from(err: reqwest::Error) -> Self {
        MusicError::TransportFailure(err.to_string())
    }
}

impl MusicError {
    pub(crate) fn unsupported(platform: &str, capability: Capability) -> Self {
        MusicError::UnsupportedCapability {
            platform: platform.to_string(),
            capability,
        }
    }
}

/// Result type alias for music-dl operations.
pub type Result<T> = std::result::Result<T, MusicError>;
