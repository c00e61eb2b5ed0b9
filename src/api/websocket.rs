//! WebSocket gateway
//!
//! One control connection per session. The upgrade request authenticates the
//! client and creates or resumes its session; the socket task then attaches
//! to that session, sends the `ready` frame and forwards control frames until
//! the socket closes, at which point the session is suspended or removed.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::server::AppState;
use crate::error::ApiError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::sessions::{ConnectionHandle, Detached};

pub const USER_ID_HEADER: &str = "user-id";
pub const CLIENT_NAME_HEADER: &str = "client-name";
pub const SESSION_ID_HEADER: &str = "session-id";
pub const SESSION_RESUMED_HEADER: &str = "session-resumed";

/// Everything known about a connection once its upgrade is accepted
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub remote_address: Option<SocketAddr>,
    pub user_id: String,
    pub client_name: String,
    pub session_id: String,
    pub resumed: bool,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `GET /v4/websocket`
pub async fn websocket_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let user_id = header_value(&headers, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Validation("Missing User-Id header".to_string()))?;
    let client_name = header_value(&headers, CLIENT_NAME_HEADER)
        .ok_or_else(|| ApiError::Validation("Missing Client-Name header".to_string()))?;

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            tracing::debug!("Rejected websocket request: {}", rejection);
            return Ok(rejection.into_response());
        }
    };

    let requested = header_value(&headers, SESSION_ID_HEADER);
    let auth = state
        .sessions
        .authenticate(&user_id, &client_name, requested.as_deref());

    let connection = Connection {
        id: Uuid::new_v4(),
        remote_address: connect_info.map(|ConnectInfo(addr)| addr),
        user_id,
        client_name,
        session_id: auth.session_id,
        resumed: auth.resumed,
    };
    tracing::info!(
        connection_id = %connection.id,
        remote = ?connection.remote_address,
        user_id = %connection.user_id,
        client = %connection.client_name,
        session_id = %connection.session_id,
        resumed = connection.resumed,
        "Accepted websocket connection"
    );

    let resumed = HeaderValue::from_static(if connection.resumed { "true" } else { "false" });
    let failed_sessions = state.sessions.clone();
    let failed_session_id = connection.session_id.clone();

    let mut response = upgrade
        .on_failed_upgrade(move |e| {
            tracing::warn!(session_id = %failed_session_id, "Websocket upgrade failed: {}", e);
            failed_sessions.detach(&failed_session_id, None);
        })
        .on_upgrade(move |socket| handle_socket(socket, state, connection));
    response
        .headers_mut()
        .insert(SESSION_RESUMED_HEADER, resumed);

    Ok(response)
}

async fn handle_socket(socket: WebSocket, state: AppState, connection: Connection) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let handle = ConnectionHandle::new(connection.id, connection.remote_address, tx);
    if !state.sessions.attach(&connection.session_id, handle) {
        tracing::warn!(
            session_id = %connection.session_id,
            "Session is no longer available, closing connection"
        );
        let _ = sink.send(Message::Close(None)).await;
        return;
    }

    // Queued before anything else can reach the session
    state.sessions.send(
        &connection.session_id,
        ServerMessage::Ready {
            resumed: connection.resumed,
            session_id: connection.session_id.clone(),
        },
    );

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_frame(&state, &connection, &text),
            Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => handle_frame(&state, &connection, text),
                Err(_) => tracing::debug!("Dropped non UTF-8 binary frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %connection.id, "Websocket error: {}", e);
                break;
            }
        }
    }

    match state.sessions.detach(&connection.session_id, Some(connection.id)) {
        Detached::Suspended { .. } | Detached::Removed => {}
        Detached::Stale | Detached::Missing => tracing::debug!(
            connection_id = %connection.id,
            "Closed connection no longer owned its session"
        ),
    }
    writer.abort();

    tracing::info!(
        connection_id = %connection.id,
        session_id = %connection.session_id,
        "Websocket connection closed"
    );
}

/// Apply one inbound control frame; anything unrecognized is dropped
fn handle_frame(state: &AppState, connection: &Connection, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::ConfigureResuming { timeout }) => {
            state
                .sessions
                .configure_resuming(&connection.session_id, timeout);
        }
        Err(e) => {
            tracing::debug!(
                connection_id = %connection.id,
                "Dropped unrecognized frame: {}",
                e
            );
        }
    }
}
