//! A single client session

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::ServerMessage;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Owned by a live (or upgrading) connection
    Active,
    /// Detached and waiting to be resumed before its deadline
    Suspended,
}

/// Outbound side of the connection attached to a session
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: Uuid,
    pub remote_address: Option<SocketAddr>,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    pub fn new(
        id: Uuid,
        remote_address: Option<SocketAddr>,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            remote_address,
            sender,
        }
    }

    /// Queue a frame for the connection; false if it has gone away
    pub fn send(&self, message: ServerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Server-side record binding a user and client across connections
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub client_name: String,
    pub state: SessionState,
    pub resume_enabled: bool,
    pub resume_timeout: Duration,
    /// Only set while suspended. `None` while suspended means no expiry.
    pub resume_deadline: Option<Instant>,
    pub connection: Option<ConnectionHandle>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, user_id: &str, client_name: &str, resume_timeout: Duration) -> Self {
        Self {
            id,
            user_id: user_id.to_string(),
            client_name: client_name.to_string(),
            state: SessionState::Active,
            resume_enabled: false,
            resume_timeout,
            resume_deadline: None,
            connection: None,
            created_at: Utc::now(),
        }
    }

    /// Suspended with a deadline that is not strictly in the future
    pub fn is_expired(&self, now: Instant) -> bool {
        self.state == SessionState::Suspended
            && self.resume_deadline.map_or(false, |deadline| deadline <= now)
    }

    /// Whether `user_id` may take this session over at `now`
    pub fn can_resume(&self, user_id: &str, now: Instant) -> bool {
        self.state == SessionState::Suspended && self.user_id == user_id && !self.is_expired(now)
    }
}

/// Read-only view of a session for diagnostics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub user_id: String,
    pub client_name: String,
    pub state: SessionState,
    pub resuming: bool,
    /// Resume timeout in seconds
    pub timeout: u64,
    pub connected: bool,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            client_name: session.client_name.clone(),
            state: session.state,
            resuming: session.resume_enabled,
            timeout: session.resume_timeout.as_secs(),
            connected: session.connection.is_some(),
            created_at: session.created_at.timestamp_millis(),
        }
    }
}
