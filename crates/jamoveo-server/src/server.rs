//! `JamServer`: Axum HTTP + `WebSocket` server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use jamoveo_auth::{AuthError, Authenticator};
use jamoveo_catalog::SongCatalog;
use jamoveo_core::{Identity, SongId, SongRef, SongSummary};
use jamoveo_session::SessionHandle;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::credentials::{self, TokenQuery};
use crate::errors::{ApiError, ServerError};
use crate::health::{self, HealthResponse};
use crate::metrics::{CATALOG_REQUESTS_TOTAL, WS_UPGRADES_REJECTED_TOTAL};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::{HeartbeatPolicy, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Front door to the session service.
    pub session: SessionHandle,
    /// Verifies bearer credentials.
    pub authenticator: Arc<dyn Authenticator>,
    /// Song lookup.
    pub catalog: Arc<dyn SongCatalog>,
    /// Prometheus renderer.
    pub metrics: PrometheusHandle,
    /// Transport limits.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// The rehearsal server.
pub struct JamServer {
    config: Arc<ServerConfig>,
    session: SessionHandle,
    authenticator: Arc<dyn Authenticator>,
    catalog: Arc<dyn SongCatalog>,
    metrics: PrometheusHandle,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl JamServer {
    /// Server over a running session service.
    pub fn new(
        config: ServerConfig,
        session: SessionHandle,
        authenticator: Arc<dyn Authenticator>,
        catalog: Arc<dyn SongCatalog>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session,
            authenticator,
            catalog,
            metrics,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Share a coordinator with the rest of the process.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            session: self.session.clone(),
            authenticator: Arc::clone(&self.authenticator),
            catalog: Arc::clone(&self.catalog),
            metrics: self.metrics.clone(),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/search/songs", get(search_handler))
            .route("/songs/{id}", get(song_handler))
            .route("/validate_token", get(validate_token_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind and serve in the background until the shutdown token fires.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let local = listener.local_addr()?;
        let router = self.router();
        let stop = self.shutdown.token();

        info!(%local, "jamoveo server listening");
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                warn!(error = %e, "http listener failed");
            }
            info!("http listener stopped");
        });
        Ok((local, handle))
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Session service handle.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    query: &TokenQuery,
) -> Result<Identity, AuthError> {
    let credential = credentials::extract(headers, query).ok_or(AuthError::MissingToken)?;
    state.authenticator.authenticate(&credential).await
}

/// GET /ws
///
/// Credentials are checked before the upgrade so a refused client gets a
/// plain 401.
async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let identity = match authenticate(&state, &headers, &query).await {
        Ok(identity) => identity,
        Err(e) => {
            counter!(WS_UPGRADES_REJECTED_TOTAL, "reason" => e.error_kind()).increment(1);
            warn!(error = %e, "websocket credential refused");
            return ApiError::from(e).into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let registry = state.session.registry();
    if registry.len() >= registry.capacity() {
        counter!(WS_UPGRADES_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        return ApiError::Unavailable(format!(
            "connection limit reached ({})",
            registry.capacity()
        ))
        .into_response();
    }

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| serve_socket(socket, identity, state))
}

async fn serve_socket(mut socket: WebSocket, identity: Identity, state: AppState) {
    let policy = HeartbeatPolicy::from(state.config.as_ref());
    match state.session.admit(identity).await {
        Ok(admission) => run_ws_session(socket, admission, state.session, policy).await,
        Err(e) => {
            counter!(WS_UPGRADES_REJECTED_TOTAL, "reason" => "capacity").increment(1);
            let close = CloseFrame {
                code: close_code::AGAIN,
                reason: e.to_string().into(),
            };
            let _ = socket.send(Message::Close(Some(close))).await;
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.session.connection_count(),
        &state.session.commit_info(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(&state.metrics),
    )
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    query: String,
}

/// Body of `GET /search/songs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matching songs, ordered by title.
    pub songs: Vec<SongSummary>,
}

/// GET /search/songs?query=
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let result = state.catalog.search(&params.query).await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    counter!(CATALOG_REQUESTS_TOTAL, "route" => "search", "outcome" => outcome).increment(1);
    Ok(Json(SearchResponse { songs: result? }))
}

/// GET /songs/{id}
async fn song_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SongRef>, ApiError> {
    let id = SongId::from_raw(id);
    let result = state.catalog.get(&id).await;
    let outcome = match &result {
        Ok(Some(_)) => "ok",
        Ok(None) => "not_found",
        Err(_) => "error",
    };
    counter!(CATALOG_REQUESTS_TOTAL, "route" => "song", "outcome" => outcome).increment(1);
    result?.map(Json).ok_or(ApiError::SongNotFound(id))
}

/// GET /validate_token
async fn validate_token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
) -> Result<Json<Identity>, ApiError> {
    Ok(Json(authenticate(&state, &headers, &query).await?))
}
