//! Source managers
//!
//! A source manager turns an identifier (a URL or a prefixed search query)
//! into track metadata for one provider. Managers are registered once at
//! startup and dispatched by [`SourceRegistry`].

pub mod http;
pub mod registry;

pub use http::HttpSourceManager;
pub use registry::SourceRegistry;

use async_trait::async_trait;

use crate::codec;
use crate::error::{DecodeError, EncodeError, SourceError};
use crate::protocol::{TrackInfo, TrackRecord};

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A single, directly addressed track
    Track(TrackInfo),
    /// Ordered search results; may be empty
    Search(Vec<TrackInfo>),
}

/// Capability implemented by every track provider
#[async_trait]
pub trait SourceManager: Send + Sync {
    /// Unique provider name, also written into `TrackInfo::source_name`
    fn name(&self) -> &str;

    /// Whether this manager claims the identifier
    fn can_handle(&self, identifier: &str) -> bool;

    /// Resolve an identifier. May perform network I/O.
    async fn resolve(&self, identifier: &str) -> Result<Resolution, SourceError>;

    /// Encode a resolved track into its opaque client form
    fn encode(&self, info: &TrackInfo) -> Result<String, EncodeError> {
        codec::encode_track(info, &[])
    }

    /// Decode an opaque track produced by [`SourceManager::encode`]
    fn decode(&self, encoded: &str) -> Result<TrackRecord, DecodeError> {
        codec::decode_track(encoded)
    }
}
