//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, Response},
};
use std::sync::Arc;

use lavanode::api::AppState;
use lavanode::config::AppConfig;
use lavanode::error::SourceError;
use lavanode::protocol::TrackInfo;
use lavanode::sources::{Resolution, SourceManager, SourceRegistry};

pub const PASSWORD: &str = "youshallnotpass";

/// Search provider answering every `scsearch:` query with two tracks
pub struct StubSearch;

pub fn stub_track(identifier: &str, title: &str, is_stream: bool) -> TrackInfo {
    TrackInfo {
        identifier: identifier.to_string(),
        is_seekable: !is_stream,
        author: "stub artist".to_string(),
        length_ms: if is_stream { i64::MAX } else { 212_000 },
        is_stream,
        position_ms: 0,
        title: title.to_string(),
        uri: Some(format!("https://stub.example/{}", identifier)),
        artwork_url: None,
        isrc: Some("USXYZ0000001".to_string()),
        source_name: "stub".to_string(),
    }
}

#[async_trait]
impl SourceManager for StubSearch {
    fn name(&self) -> &str {
        "stub"
    }

    fn can_handle(&self, identifier: &str) -> bool {
        identifier.starts_with("scsearch:")
    }

    async fn resolve(&self, identifier: &str) -> Result<Resolution, SourceError> {
        let query = identifier.trim_start_matches("scsearch:");
        if query == "fail" {
            return Err(SourceError::fault("stub backend unavailable"));
        }
        if query == "none" {
            return Ok(Resolution::Search(Vec::new()));
        }
        Ok(Resolution::Search(vec![
            stub_track("first", &format!("{} one", query), false),
            stub_track("second", &format!("{} two", query), true),
        ]))
    }
}

pub fn state_with(config: AppConfig) -> AppState {
    let sources = Arc::new(SourceRegistry::new());
    sources.register(Arc::new(StubSearch));
    AppState::new(config, sources)
}

pub fn test_state() -> AppState {
    state_with(AppConfig::default())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", PASSWORD)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Build a request path with a form-encoded query string
pub fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    let mut url = reqwest::Url::parse("http://localhost").unwrap().join(path).unwrap();
    url.query_pairs_mut().extend_pairs(pairs);
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}
