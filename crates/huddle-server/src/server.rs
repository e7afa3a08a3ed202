//! `HuddleServer`: Axum HTTP + server-sent events server.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, Json};
use axum::routing::{get, post};
use futures::{Stream, StreamExt};
use huddle_core::Action;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::errors::ApiError;
use crate::fanout::Fanout;
use crate::health::{self, HealthResponse};
use crate::hub::PollHub;
use crate::shell;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session and subscribers.
    pub hub: Arc<PollHub>,
    /// When the server started.
    pub start_time: Instant,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

/// Body of a successful `POST /api`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiAck {
    /// Always `true`.
    pub success: bool,
}

/// The Huddle server.
pub struct HuddleServer {
    config: Arc<ServerConfig>,
    hub: Arc<PollHub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl HuddleServer {
    /// Create a new server with a fresh session.
    pub fn new(config: ServerConfig) -> Self {
        let fanout = Arc::new(Fanout::new(
            config.send_queue_capacity,
            config.max_connections,
        ));
        Self {
            config: Arc::new(config),
            hub: Arc::new(PollHub::new(fanout)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            start_time: self.start_time,
            config: self.config.clone(),
        };

        Router::new()
            .route("/", get(index_handler))
            .route("/event", get(event_handler))
            .route("/api", post(api_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr()).await
    }

    /// Serve on `listener` until shutdown is requested.
    ///
    /// On shutdown every event stream is closed so in-flight connections
    /// can drain.
    pub async fn run(&self, listener: TcpListener) -> std::io::Result<()> {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Huddle server started");

        let token = self.shutdown.token();
        let hub = self.hub.clone();
        let signal = async move {
            token.cancelled().await;
            info!("shutdown requested, closing event streams");
            hub.close().await;
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;
        info!("Huddle server stopped");
        Ok(())
    }

    /// The session hub.
    pub fn hub(&self) -> &Arc<PollHub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /
async fn index_handler() -> Html<&'static str> {
    Html(shell::INDEX_HTML)
}

/// GET /event: snapshot stream, current state first.
async fn event_handler(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = state.hub.subscribe().await.inspect_err(|e| {
        warn!(error = %e, "event stream refused");
    })?;
    let stream = subscription.map(|frame| Ok::<_, Infallible>(Event::default().data(&*frame)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.config.keep_alive())))
}

/// POST /api: apply one action and broadcast.
///
/// The body is read as raw bytes so clients need not send a JSON
/// content type.
async fn api_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiAck>, ApiError> {
    let action = Action::from_slice(&body).inspect_err(|e| {
        warn!(error = %e, "rejected action payload");
    })?;
    let _ = state.hub.dispatch(action).await;
    Ok(Json(ApiAck { success: true }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.fanout().connection_count();
    let phase = state.hub.phase().await;
    Json(health::health_check(state.start_time, connections, phase))
}
