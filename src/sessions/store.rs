//! Session store
//!
//! Owns every [`Session`] and drives its state machine:
//!
//! ```text
//!            authenticate            close (resume off)
//!   (new) ───────────────► ACTIVE ─────────────────────► removed
//!                           ▲  │
//!        resume (same user, │  │ close (resume on)
//!        deadline > now)    │  ▼
//!                         SUSPENDED ───────────────────► removed
//!                                   deadline <= now
//! ```
//!
//! All transitions happen under one lock acquisition, so an expiry check and
//! a concurrent resume can never interleave.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::protocol::ServerMessage;
use crate::sessions::session::{ConnectionHandle, Session, SessionState, SessionSummary};

/// Result of authenticating a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated {
    pub session_id: String,
    pub resumed: bool,
}

/// What happened to a session when its connection went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// Kept for resuming; `None` means it never expires
    Suspended { deadline: Option<Instant> },
    /// Resuming was off, so the session is gone
    Removed,
    /// The closing connection no longer owns the session
    Stale,
    /// No such session
    Missing,
}

/// Concurrent map of session id to session
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
    default_resume_timeout: Duration,
}

impl SessionStore {
    pub fn new(default_resume_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            default_resume_timeout,
        }
    }

    pub fn default_resume_timeout(&self) -> Duration {
        self.default_resume_timeout
    }

    /// Resume the requested session if allowed, otherwise create a new one
    pub fn authenticate(
        &self,
        user_id: &str,
        client_name: &str,
        session_id: Option<&str>,
    ) -> Authenticated {
        self.authenticate_at(user_id, client_name, session_id, Instant::now())
    }

    pub fn authenticate_at(
        &self,
        user_id: &str,
        client_name: &str,
        session_id: Option<&str>,
        now: Instant,
    ) -> Authenticated {
        let mut sessions = self.sessions.lock();

        if let Some(requested) = session_id {
            if let Some(session) = sessions.get_mut(requested) {
                if session.can_resume(user_id, now) {
                    session.state = SessionState::Active;
                    session.resume_deadline = None;
                    session.client_name = client_name.to_string();
                    tracing::info!(
                        session_id = %requested,
                        user_id = %user_id,
                        "Resumed session"
                    );
                    return Authenticated {
                        session_id: requested.to_string(),
                        resumed: true,
                    };
                }

                if session.is_expired(now) {
                    tracing::info!(session_id = %requested, "Session expired before resume");
                    sessions.remove(requested);
                } else if session.user_id != user_id {
                    tracing::warn!(
                        session_id = %requested,
                        user_id = %user_id,
                        "Refusing to resume a session owned by another user"
                    );
                } else {
                    tracing::debug!(session_id = %requested, "Session is in use, not resuming");
                }
            } else {
                tracing::debug!(session_id = %requested, "Unknown session, not resuming");
            }
        }

        let id = loop {
            let candidate = Uuid::new_v4().simple().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        sessions.insert(
            id.clone(),
            Session::new(id.clone(), user_id, client_name, self.default_resume_timeout),
        );
        tracing::info!(
            session_id = %id,
            user_id = %user_id,
            client = %client_name,
            "Created session"
        );

        Authenticated {
            session_id: id,
            resumed: false,
        }
    }

    /// Attach a live connection. Fails if the session is gone, suspended, or
    /// already has a connection.
    pub fn attach(&self, session_id: &str, handle: ConnectionHandle) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get_mut(session_id) {
            Some(session)
                if session.state == SessionState::Active && session.connection.is_none() =>
            {
                session.connection = Some(handle);
                true
            }
            _ => false,
        }
    }

    /// Enable resuming. `timeout_secs` defaults to the configured timeout and
    /// is floored at one second. No-op if the session is already gone.
    pub fn configure_resuming(&self, session_id: &str, timeout_secs: Option<f64>) -> bool {
        let timeout = match timeout_secs {
            Some(secs) => Duration::try_from_secs_f64(secs.max(1.0)).unwrap_or(Duration::MAX),
            None => self.default_resume_timeout,
        };

        let mut sessions = self.sessions.lock();
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.resume_enabled = true;
                session.resume_timeout = timeout;
                tracing::info!(
                    session_id = %session_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Resuming enabled"
                );
                true
            }
            None => false,
        }
    }

    /// Drive the close transition for `connection_id`
    ///
    /// `None` detaches a session whose connection never attached, such as a
    /// failed upgrade.
    pub fn detach(&self, session_id: &str, connection_id: Option<Uuid>) -> Detached {
        self.detach_at(session_id, connection_id, Instant::now())
    }

    pub fn detach_at(
        &self,
        session_id: &str,
        connection_id: Option<Uuid>,
        now: Instant,
    ) -> Detached {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(session_id) else {
            return Detached::Missing;
        };

        if session.state != SessionState::Active {
            return Detached::Stale;
        }
        let owner = session.connection.as_ref().map(|c| c.id);
        if owner.is_some() && owner != connection_id {
            return Detached::Stale;
        }

        session.connection = None;

        if session.resume_enabled {
            let deadline = now.checked_add(session.resume_timeout);
            session.state = SessionState::Suspended;
            session.resume_deadline = deadline;
            tracing::info!(
                session_id = %session_id,
                timeout_ms = session.resume_timeout.as_millis() as u64,
                "Session suspended"
            );
            Detached::Suspended { deadline }
        } else {
            sessions.remove(session_id);
            tracing::info!(session_id = %session_id, "Session closed");
            Detached::Removed
        }
    }

    /// Remove suspended sessions whose deadline has passed
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let expired = session.is_expired(now);
            if expired {
                tracing::info!(session_id = %id, "Session expired");
            }
            !expired
        });
        before - sessions.len()
    }

    /// Queue a frame for the session's live connection
    pub fn send(&self, session_id: &str, message: ServerMessage) -> bool {
        let sessions = self.sessions.lock();
        sessions
            .get(session_id)
            .and_then(|s| s.connection.as_ref())
            .map_or(false, |c| c.send(message))
    }

    pub fn get(&self, session_id: &str) -> Option<SessionSummary> {
        self.sessions.lock().get(session_id).map(SessionSummary::from)
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<_> = self
            .sessions
            .lock()
            .values()
            .map(SessionSummary::from)
            .collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        summaries
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Drop every session, disconnecting their writers. Used on shutdown.
    pub fn close_all(&self) -> usize {
        let mut sessions = self.sessions.lock();
        let closed = sessions.len();
        sessions.clear();
        closed
    }

    /// Periodically sweep expired sessions until the task is aborted
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    tracing::debug!("Swept {} expired sessions", removed);
                }
            }
        })
    }
}
