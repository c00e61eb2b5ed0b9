//! Direct HTTP(S) URL source
//!
//! Probes the URL with a HEAD request and turns the response headers into a
//! single track. Probe results are remembered in the credential cache for a
//! short while so repeated loads of the same URL stay cheap.

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Url;
use std::time::Duration;

use crate::cache::CredentialCache;
use crate::error::SourceError;
use crate::protocol::TrackInfo;
use crate::sources::{Resolution, SourceManager};

const NAME: &str = "http";
const USER_AGENT: &str = concat!("lavanode/", env!("CARGO_PKG_VERSION"));

/// Duration reported for live streams
pub const DURATION_UNKNOWN: i64 = i64::MAX;

/// How long a successful probe is reused
const PROBE_TTL: Duration = Duration::from_secs(10 * 60);

/// Source manager for plain http/https media URLs
pub struct HttpSourceManager {
    client: reqwest::Client,
    cache: CredentialCache,
}

impl HttpSourceManager {
    pub fn new(cache: CredentialCache) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, cache })
    }

    fn probe_key(identifier: &str) -> String {
        format!("{}:probe:{}", NAME, identifier)
    }

    async fn probe(&self, url: Url) -> Result<TrackInfo, SourceError> {
        let identifier = url.to_string();
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| SourceError::fault(format!("Failed to reach {}: {}", identifier, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::common(format!(
                "Server responded with status {}",
                status
            )));
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        if let Some(content_type) = &content_type {
            if !is_playable_content_type(content_type) {
                return Err(SourceError::common(format!(
                    "Unsupported content type: {}",
                    content_type
                )));
            }
        }

        let has_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            // Live endpoints often answer HEAD with a zero length
            .map_or(false, |len| len > 0);
        let is_playlist = content_type
            .as_deref()
            .map(|ct| ct.contains("mpegurl"))
            .unwrap_or(false);
        let is_stream = !has_length || is_playlist;

        Ok(TrackInfo {
            identifier: identifier.clone(),
            is_seekable: !is_stream,
            author: "Unknown artist".to_string(),
            length_ms: if is_stream { DURATION_UNKNOWN } else { 0 },
            is_stream,
            position_ms: 0,
            title: title_from_url(&url),
            uri: Some(identifier),
            artwork_url: None,
            isrc: None,
            source_name: NAME.to_string(),
        })
    }
}

#[async_trait]
impl SourceManager for HttpSourceManager {
    fn name(&self) -> &str {
        NAME
    }

    fn can_handle(&self, identifier: &str) -> bool {
        Url::parse(identifier)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false)
    }

    async fn resolve(&self, identifier: &str) -> Result<Resolution, SourceError> {
        let key = Self::probe_key(identifier);
        if let Some(info) = self.cache.get::<TrackInfo>(&key) {
            tracing::debug!("Using cached probe for {}", identifier);
            return Ok(Resolution::Track(info));
        }

        let url = Url::parse(identifier)
            .map_err(|e| SourceError::common(format!("Invalid URL: {}", e)))?;
        let info = self.probe(url).await?;

        if let Err(e) = self.cache.set_with_ttl(&key, &info, PROBE_TTL) {
            tracing::warn!("Failed to cache probe for {}: {}", identifier, e);
        }
        Ok(Resolution::Track(info))
    }
}

fn is_playable_content_type(content_type: &str) -> bool {
    content_type.starts_with("audio/")
        || content_type.starts_with("video/")
        || content_type.starts_with("application/ogg")
        || content_type.starts_with("application/octet-stream")
        || content_type.contains("mpegurl")
}

fn title_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .or_else(|| url.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "Unknown title".to_string())
}
