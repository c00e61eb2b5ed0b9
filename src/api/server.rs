//! HTTP server, router and shared request context

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::{auth, handlers, websocket};
use crate::config::AppConfig;
use crate::error::Error;
use crate::sessions::SessionStore;
use crate::sources::SourceRegistry;

/// Static facts about this build and process, reported by `/v4/info`
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub version: String,
    pub build_time: i64,
    pub git_branch: String,
    pub git_commit: String,
    pub git_commit_time: i64,
    pub started_at: Instant,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: option_env!("LAVANODE_BUILD_TIME")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0),
            git_branch: option_env!("LAVANODE_GIT_BRANCH")
                .unwrap_or("unknown")
                .to_string(),
            git_commit: option_env!("LAVANODE_GIT_COMMIT")
                .unwrap_or("unknown")
                .to_string(),
            git_commit_time: option_env!("LAVANODE_GIT_COMMIT_TIME")
                .and_then(|t| t.parse().ok())
                .unwrap_or(0),
            started_at: Instant::now(),
        }
    }
}

/// Context handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sources: Arc<SourceRegistry>,
    pub sessions: Arc<SessionStore>,
    pub runtime: Arc<RuntimeInfo>,
}

impl AppState {
    pub fn new(config: AppConfig, sources: Arc<SourceRegistry>) -> Self {
        let sessions = Arc::new(SessionStore::new(
            config.sessions.default_resume_timeout(),
        ));
        Self {
            config: Arc::new(config),
            sources,
            sessions,
            runtime: Arc::new(RuntimeInfo::default()),
        }
    }
}

/// Build the full `/v4` router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v4/loadtracks", get(handlers::load_tracks))
        .route("/v4/decodetrack", get(handlers::decode_track))
        .route("/v4/decodetracks", post(handlers::decode_tracks))
        .route("/v4/encodetrack", get(handlers::encode_track))
        .route("/v4/info", get(handlers::get_info))
        .route("/v4/sessions", get(handlers::list_sessions))
        .route("/v4/websocket", get(websocket::websocket_handler))
        .route("/version", get(handlers::version))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_authorization,
        ))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// The node's HTTP and WebSocket listener
pub struct WebServer {
    state: AppState,
}

impl WebServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config.server.socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(
        self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> Result<(), Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Listening on {}", listener.local_addr()?);

        let sweeper = self
            .state
            .sessions
            .clone()
            .spawn_sweeper(self.state.config.sessions.sweep_interval());

        let app = create_router(self.state);
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        sweeper.abort();
        result.map_err(Error::from)
    }

    /// Spawn the server on the current runtime
    pub fn start_background(
        self,
        listener: tokio::net::TcpListener,
    ) -> tokio::task::JoinHandle<Result<(), Error>> {
        tokio::spawn(self.serve(listener, std::future::pending()))
    }
}
