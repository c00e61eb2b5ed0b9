//! REST endpoint tests driven through the router

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use lavanode::api::create_router;
use lavanode::codec;
use lavanode::protocol::TrackInfo;

#[tokio::test]
async fn test_search_end_to_end_round_trips() {
    let app = create_router(test_state());
    let response = app
        .oneshot(get("/v4/loadtracks?identifier=scsearch:test"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["loadType"], "search");
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);

    for entry in data {
        let info: TrackInfo = serde_json::from_value(entry["info"].clone()).unwrap();
        let decoded = codec::decode_track(entry["encoded"].as_str().unwrap()).unwrap();
        assert_eq!(decoded.info, info);
        assert_eq!(entry["pluginInfo"], json!({}));
    }
    assert_eq!(data[0]["info"]["title"], "test one");
    assert_eq!(data[1]["info"]["isStream"], true);
}

#[tokio::test]
async fn test_unmatched_identifier_reports_no_source() {
    let app = create_router(test_state());
    let response = app
        .oneshot(get("/v4/loadtracks?identifier=ytsearch:nothing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["loadType"], "error");
    assert_eq!(body["data"]["severity"], "common");
    assert_eq!(body["data"]["cause"], "Unknown");
    assert!(body["data"]["message"]
        .as_str()
        .unwrap()
        .contains("ytsearch:nothing"));
}

#[tokio::test]
async fn test_empty_and_failing_searches() {
    let app = create_router(test_state());

    let response = app
        .clone()
        .oneshot(get("/v4/loadtracks?identifier=scsearch:none"))
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!({"loadType": "empty", "data": {}})
    );

    let response = app
        .oneshot(get("/v4/loadtracks?identifier=scsearch:fail"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["loadType"], "error");
    assert_eq!(body["data"]["severity"], "fault");
}

#[tokio::test]
async fn test_loadtracks_requires_identifier() {
    let app = create_router(test_state());
    let response = app.oneshot(get("/v4/loadtracks")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"], "Bad Request");
    assert!(body["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_rest_requires_password() {
    let app = create_router(test_state());

    for uri in ["/v4/loadtracks?identifier=scsearch:a", "/v4/info", "/v4/sessions"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let request = Request::builder()
        .uri("/v4/info")
        .header("Authorization", "wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_decodetrack_accepts_both_parameter_names() {
    let info = stub_track("abc", "decoded", false);
    let encoded = codec::encode_track(&info, &[]).unwrap();
    let app = create_router(test_state());

    for param in ["encoded", "encodedTrack"] {
        let uri = with_query("/v4/decodetrack", &[(param, encoded.as_str())]);
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["encoded"], encoded.as_str());
        assert_eq!(body["info"]["title"], "decoded");
        assert_eq!(body["info"]["sourceName"], "stub");
    }
}

#[tokio::test]
async fn test_decodetrack_errors() {
    let app = create_router(test_state());

    let response = app.clone().oneshot(get("/v4/decodetrack")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get("/v4/decodetrack?encoded=QUFBQQ%3D%3D"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["status"], 500);
}

#[tokio::test]
async fn test_decodetracks_batch() {
    let first = codec::encode_track(&stub_track("one", "first", false), &[]).unwrap();
    let second = codec::encode_track(&stub_track("two", "second", true), &[]).unwrap();
    let app = create_router(test_state());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v4/decodetracks")
        .header("Authorization", PASSWORD)
        .header("Content-Type", "application/json")
        .body(Body::from(json!([first, second]).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["info"]["title"], "first");
    assert_eq!(body[1]["info"]["isStream"], true);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v4/decodetracks")
        .header("Authorization", PASSWORD)
        .body(Body::from("not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_encodetrack_returns_plain_base64() {
    let track = json!({
        "title": "Encoded",
        "author": "someone",
        "length": 1000,
        "identifier": "enc",
        "isStream": false,
        "isSeekable": false,
        "uri": null,
        "sourceName": "stub",
        "position": 250
    });
    let uri = with_query("/v4/encodetrack", &[("track", track.to_string().as_str())]);
    let app = create_router(test_state());
    let response = app.oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let encoded = String::from_utf8(body_bytes(response).await).unwrap();
    let record = codec::decode_track(&encoded).unwrap();
    assert_eq!(record.info.title, "Encoded");
    assert_eq!(record.info.position_ms, 250);
    assert!(!record.info.is_seekable);
}

#[tokio::test]
async fn test_encodetrack_rejects_bad_input() {
    let app = create_router(test_state());
    let cases = [
        "/v4/encodetrack".to_string(),
        with_query("/v4/encodetrack", &[("track", "{broken")]),
        with_query("/v4/encodetrack", &[("track", "[1,2,3]")]),
        with_query("/v4/encodetrack", &[("track", "{\"title\":\"no id\"}")]),
    ];
    for uri in cases {
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn test_info_lists_sources() {
    let app = create_router(test_state());
    let response = app.oneshot(get("/v4/info")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = body_json(response).await;
    assert_eq!(body["sourceManagers"], json!(["stub"]));
    assert_eq!(body["version"]["semver"], env!("CARGO_PKG_VERSION"));
    assert!(body["filters"].is_array());
    assert!(body["plugins"].is_array());
    assert!(body["git"]["commit"].is_string());
}

#[tokio::test]
async fn test_sessions_listing() {
    let state = test_state();
    let auth = state.sessions.authenticate("42", "tester/1.0", None);

    let response = create_router(state)
        .oneshot(get("/v4/sessions"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["sessionId"], auth.session_id.as_str());
    assert_eq!(body[0]["userId"], "42");
    assert_eq!(body[0]["state"], "active");
    assert_eq!(body[0]["resuming"], false);
    assert!(body[0]["createdAt"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let response = create_router(test_state())
        .oneshot(get("/v3/loadtracks"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["status"], 404);
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/v4/loadtracks?identifier=scsearch:a")
        .header("Authorization", PASSWORD)
        .body(Body::empty())
        .unwrap();
    let response = create_router(test_state()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
