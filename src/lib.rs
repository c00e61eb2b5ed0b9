//! # lavanode
//!
//! Control plane of an audio node: clients open a WebSocket session, ask the
//! node to resolve identifiers into tracks, and pass tracks around as opaque
//! base64 handles.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                                 CLIENTS                                  │
//! │      WebSocket control connection            REST /v4/* requests         │
//! └───────────────┬────────────────────────────────────────┬─────────────────┘
//!                 │ GET /v4/websocket                      │
//!                 ▼                                        ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                    api (axum router + auth middleware)                   │
//! │  ┌────────────────────────┐   ┌─────────────────────────────────────┐    │
//! │  │  websocket gateway     │   │  handlers                           │    │
//! │  │  ready / configure-    │   │  loadtracks  decodetrack(s)         │    │
//! │  │  Resuming frames       │   │  encodetrack info sessions          │    │
//! │  └───────────┬────────────┘   └─────────┬──────────────────┬────────┘    │
//! └──────────────┼──────────────────────────┼──────────────────┼─────────────┘
//!                ▼                          ▼                  ▼
//! ┌──────────────────────────┐  ┌─────────────────────┐  ┌──────────────────┐
//! │ sessions::SessionStore   │  │ sources::Registry   │  │ codec            │
//! │ ACTIVE ⇄ SUSPENDED       │  │ first match wins    │  │ TrackDecoder     │
//! │ sweeper task             │  │  └─ HttpSource ─────┼─▶│ TrackEncoder     │
//! └──────────────────────────┘  └──────────┬──────────┘  └──────────────────┘
//!                                          ▼
//!                               ┌─────────────────────┐
//!                               │ cache::Credential-  │
//!                               │ Cache (TTL, file)   │
//!                               └─────────────────────┘
//! ```

pub mod api;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sessions;
pub mod sources;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default HTTP and WebSocket port
    pub const DEFAULT_PORT: u16 = 2333;

    /// Default shared secret
    pub const DEFAULT_PASSWORD: &str = "youshallnotpass";

    /// Resume timeout used when a client enables resuming without one
    pub const DEFAULT_RESUME_TIMEOUT_SECS: u64 = 60;

    /// How often expired suspended sessions are removed
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5;

    /// Default credential cache entry lifetime (6 hours)
    pub const DEFAULT_CACHE_TTL_SECS: u64 = 6 * 60 * 60;

    /// Delay between a cache mutation and its write to disk
    pub const DEFAULT_CACHE_FLUSH_DEBOUNCE_MS: u64 = 1000;
}
