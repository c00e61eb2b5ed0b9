//! Wire types shared by the REST API, the WebSocket gateway and the codec.
//!
//! All JSON is camelCase to stay compatible with existing v4 clients.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Track metadata as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    pub is_seekable: bool,
    pub author: String,
    /// Duration in milliseconds
    #[serde(rename = "length")]
    pub length_ms: i64,
    pub is_stream: bool,
    /// Start position in milliseconds
    #[serde(rename = "position")]
    pub position_ms: i64,
    pub title: String,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
}

impl TrackInfo {
    /// Seekability implied by the stream flag when no override is present
    pub fn default_seekable(&self) -> bool {
        !self.is_stream
    }
}

/// Fully decoded track handle
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub encoded: String,
    pub info: TrackInfo,
    pub details: Vec<Option<String>>,
    pub plugin_info: Map<String, Value>,
    pub user_data: Map<String, Value>,
}

/// A resolved track as returned by `/v4/loadtracks`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub encoded: String,
    pub info: TrackInfo,
    pub plugin_info: Map<String, Value>,
    pub user_data: Map<String, Value>,
}

impl Track {
    pub fn new(encoded: String, info: TrackInfo) -> Self {
        Self {
            encoded,
            info,
            plugin_info: Map::new(),
            user_data: Map::new(),
        }
    }
}

/// How bad a failed load is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected and specific to the identifier (not found, unavailable)
    Common,
    /// Unexpected failure inside the node or a provider
    Fault,
}

/// Error payload of a `loadType: "error"` result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exception {
    pub message: String,
    pub severity: Severity,
    pub cause: String,
}

impl Exception {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
            cause: "Unknown".to_string(),
        }
    }
}

/// Empty JSON object payload
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Empty {}

/// Response body of `/v4/loadtracks`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
pub enum LoadResult {
    Track(Track),
    Search(Vec<Track>),
    Empty(Empty),
    Error(Exception),
}

impl LoadResult {
    pub fn error(message: impl Into<String>, severity: Severity) -> Self {
        LoadResult::Error(Exception::new(message, severity))
    }
}

/// Body accepted by `/v4/encodetrack`
///
/// Mirrors [`TrackInfo`] but lets clients omit fields with an obvious default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeTrackRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub length: i64,
    pub identifier: String,
    #[serde(default)]
    pub is_stream: bool,
    pub is_seekable: Option<bool>,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
    pub isrc: Option<String>,
    pub source_name: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub details: Vec<Option<String>>,
}

impl EncodeTrackRequest {
    /// Split into the track info and the caller supplied details
    pub fn into_parts(self) -> (TrackInfo, Vec<Option<String>>) {
        let info = TrackInfo {
            identifier: self.identifier,
            is_seekable: self.is_seekable.unwrap_or(!self.is_stream),
            author: self.author,
            length_ms: self.length,
            is_stream: self.is_stream,
            position_ms: self.position,
            title: self.title,
            uri: self.uri,
            artwork_url: self.artwork_url,
            isrc: self.isrc,
            source_name: self.source_name,
        };
        (info, self.details)
    }
}

/// Frames sent by the node over the WebSocket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Ready { resumed: bool, session_id: String },
}

/// Frames accepted from clients over the WebSocket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Enable resuming; `timeout` is in seconds
    ConfigureResuming { timeout: Option<f64> },
}

/// Node version broken into its semver parts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub semver: String,
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: Option<String>,
    pub build: Option<String>,
}

impl VersionInfo {
    /// Parse a `MAJOR.MINOR.PATCH[-PRE][+BUILD]` string
    pub fn parse(semver: &str) -> Option<Self> {
        let (rest, build) = match semver.split_once('+') {
            Some((rest, build)) => (rest, Some(build.to_string())),
            None => (semver, None),
        };
        let (core, pre_release) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (rest, None),
        };

        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            semver: semver.to_string(),
            major,
            minor,
            patch,
            pre_release,
            build,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub branch: String,
    pub commit: String,
    pub commit_time: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
}

/// Response body of `/v4/info`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub version: VersionInfo,
    pub build_time: i64,
    pub git: GitInfo,
    pub runtime: String,
    pub source_managers: Vec<String>,
    pub filters: Vec<String>,
    pub plugins: Vec<PluginInfo>,
}
