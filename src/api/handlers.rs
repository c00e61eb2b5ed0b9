//! REST API handlers

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, Uri},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::info;
use crate::api::server::AppState;
use crate::codec;
use crate::error::ApiError;
use crate::protocol::{EncodeTrackRequest, LoadResult, TrackRecord};
use crate::sessions::SessionSummary;

#[derive(Debug, Deserialize)]
pub struct LoadTracksQuery {
    pub identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeTrackQuery {
    pub encoded: Option<String>,
    pub encoded_track: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EncodeTrackQuery {
    pub track: Option<String>,
}

/// Treat a missing or blank query value the same way
fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::Validation(format!("Missing '{}' query parameter", name)))
}

/// Query strings decode `+` as a space; base64 never contains spaces.
fn normalize_encoded(encoded: &str) -> String {
    encoded.trim().replace(' ', "+")
}

/// Resolve an identifier into tracks
pub async fn load_tracks(
    State(state): State<AppState>,
    Query(query): Query<LoadTracksQuery>,
) -> Result<Json<LoadResult>, ApiError> {
    let identifier = required(query.identifier, "identifier")?;
    tracing::debug!("Loading tracks for '{}'", identifier);
    Ok(Json(state.sources.load(&identifier).await))
}

/// Decode a single encoded track
pub async fn decode_track(
    State(state): State<AppState>,
    Query(query): Query<DecodeTrackQuery>,
) -> Result<Json<TrackRecord>, ApiError> {
    let encoded = required(query.encoded.or(query.encoded_track), "encoded")?;
    let record = state.sources.decode(&normalize_encoded(&encoded))?;
    Ok(Json(record))
}

/// Decode a JSON array of encoded tracks
pub async fn decode_tracks(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<TrackRecord>>, ApiError> {
    if body.is_empty() {
        return Err(ApiError::Validation("Missing request body".to_string()));
    }
    let encoded: Vec<String> = serde_json::from_slice(&body).map_err(|e| {
        ApiError::Validation(format!("Body must be an array of encoded tracks: {}", e))
    })?;

    let records = encoded
        .iter()
        .map(|e| state.sources.decode(&normalize_encoded(e)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(records))
}

/// Encode a JSON track description into its base64 form
pub async fn encode_track(
    Query(query): Query<EncodeTrackQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let raw = required(query.track, "track")?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| ApiError::Validation(format!("Track is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(ApiError::Validation("Track must be a JSON object".to_string()));
    }
    let request: EncodeTrackRequest = serde_json::from_value(value)
        .map_err(|e| ApiError::Validation(format!("Invalid track: {}", e)))?;

    let (info, details) = request.into_parts();
    let encoded = codec::encode_track(&info, &details)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], encoded))
}

/// Node runtime and capability metadata
pub async fn get_info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let node = info::build_node_info(&state.runtime, &state.sources);
    Ok(Json(info::validated_info(&node)?))
}

/// All known sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.sessions.list())
}

pub async fn version(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.runtime.version.clone(),
    )
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
