//! HTTP API and WebSocket gateway

pub mod auth;
pub mod handlers;
pub mod info;
pub mod server;
pub mod websocket;

pub use server::{create_router, AppState, RuntimeInfo, WebServer};
