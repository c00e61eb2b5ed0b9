//! Client sessions and their resume lifecycle

pub mod session;
pub mod store;

pub use session::{ConnectionHandle, Session, SessionState, SessionSummary};
pub use store::{Authenticated, Detached, SessionStore};
