//! Platform-facing plumbing.
//!
//! - [`capability`]: the optional per-platform capability contracts
//! - [`registry`]: platform id → capability record
//! - [`platform`]: reference data about known platforms
//! - [`request`]: request builder and HTTP transport
//! - [`direct`]: built-in platform for plain audio file links

pub mod capability;
pub mod direct;
pub mod platform;
pub mod registry;
pub mod request;

pub use capability::{
    Capability, CapabilityRecord, FetchLyrics, ParseLink, PlaylistTracks, ProtectedAudio,
    ProtectedMedia, ResolveUrl, Search, SearchPlaylists,
};
pub use direct::DirectLink;
pub use registry::{Registry, RegistryBuilder};
pub use request::{Fetched, HttpTransport, RequestBuilder, Transport};
