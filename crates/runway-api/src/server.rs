//! API server implementation.
//!
//! Provides health, API, and WebSocket feed endpoints for the Runway
//! run-tracking service.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use runway_core::Result;
use runway_flow::dispatch::{DelegationGateway, HttpWorkerClient, WorkerClient};
use runway_flow::ingest::{Ingestor, RunLocks};
use runway_flow::store::memory::InMemoryStore;
use runway_flow::store::Store;

use crate::config::{Config, CorsConfig};

// ============================================================================
// Health and Ready Responses
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ReadyResponse {
    /// Service readiness status.
    pub ready: bool,
    /// Optional message about readiness state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Record-of-truth store handle.
    store: Arc<dyn Store>,
    /// Worker-facing ingestion boundary.
    ingestor: Arc<Ingestor>,
    /// Delegation gateway; absent when no worker is configured.
    gateway: Option<Arc<DelegationGateway>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &"<Store>")
            .field("ingestor", &"<Ingestor>")
            .field("gateway", &self.gateway.is_some())
            .finish()
    }
}

impl AppState {
    /// Creates application state over the given store, wiring the worker
    /// client from configuration (if any).
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        let worker = config.worker.base_url.as_ref().map(|url| {
            let client: Arc<dyn WorkerClient> = Arc::new(HttpWorkerClient::with_timeout(
                url.clone(),
                config.worker.request_timeout(),
            ));
            client
        });
        Self::with_worker_client(config, store, worker)
    }

    /// Creates application state with an explicit worker client.
    #[must_use]
    pub fn with_worker_client(
        config: Config,
        store: Arc<dyn Store>,
        worker: Option<Arc<dyn WorkerClient>>,
    ) -> Self {
        let locks = Arc::new(RunLocks::new());
        let ingestor = Arc::new(Ingestor::new(Arc::clone(&store), Arc::clone(&locks)));
        let gateway = worker.map(|worker| {
            Arc::new(DelegationGateway::new(
                Arc::clone(&store),
                worker,
                Arc::clone(&locks),
            ))
        });
        Self {
            config,
            store,
            ingestor,
            gateway,
        }
    }

    /// Creates application state with an in-memory store (for testing).
    #[must_use]
    pub fn with_memory_store(config: Config) -> Self {
        Self::new(config, Arc::new(InMemoryStore::new()))
    }

    /// Returns the store handle.
    #[must_use]
    pub fn store(&self) -> Arc<dyn Store> {
        Arc::clone(&self.store)
    }

    /// Returns the ingestion boundary.
    #[must_use]
    pub fn ingestor(&self) -> Arc<Ingestor> {
        Arc::clone(&self.ingestor)
    }

    /// Returns the delegation gateway if a worker is configured.
    #[must_use]
    pub fn gateway(&self) -> Option<Arc<DelegationGateway>> {
        self.gateway.clone()
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint handler.
///
/// Returns 200 OK if the service is alive. This is a shallow check
/// that doesn't verify dependencies.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness check endpoint handler.
///
/// Returns 200 OK if the service is ready to accept requests; probes the
/// store with a cheap aggregate read.
async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store().stats().await {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadyResponse {
                ready: true,
                message: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                ready: false,
                message: Some(format!("store check failed: {e}")),
            }),
        ),
    }
}

// ============================================================================
// Server
// ============================================================================

/// The Runway API server.
pub struct Server {
    config: Config,
    store: Arc<dyn Store>,
    worker: Option<Arc<dyn WorkerClient>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("store", &"<Store>")
            .field("worker", &self.worker.is_some())
            .finish()
    }
}

impl Server {
    /// Creates a new server with the given configuration.
    ///
    /// Defaults to in-memory storage and the worker client derived from
    /// configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: Arc::new(InMemoryStore::new()),
            worker: None,
        }
    }

    /// Sets an explicit store handle.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = store;
        self
    }

    /// Sets an explicit worker client, overriding the configured URL.
    #[must_use]
    pub fn with_worker_client(mut self, worker: Arc<dyn WorkerClient>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates the router with all routes and middleware.
    fn create_router(&self) -> Router {
        let state = match &self.worker {
            Some(worker) => Arc::new(AppState::with_worker_client(
                self.config.clone(),
                Arc::clone(&self.store),
                Some(Arc::clone(worker)),
            )),
            None => Arc::new(AppState::new(self.config.clone(), Arc::clone(&self.store))),
        };

        let cors = self.build_cors_layer();

        Router::new()
            // Health and ready endpoints
            .route("/health", get(health))
            .route("/ready", get(ready))
            // REST under /api
            .nest("/api", crate::routes::api_routes())
            // WebSocket feed outside /api, one connection per run
            .route("/ws/runs/:run_id", get(crate::ws::ws_run_events))
            // Middleware (order matters): trace outermost, then CORS.
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(state)
    }

    /// Builds the CORS layer from configuration.
    fn build_cors_layer(&self) -> CorsLayer {
        let cors_config = &self.config.cors;
        let cors = Self::build_cors_base(cors_config);
        Self::apply_cors_allowed_origins(cors, cors_config)
    }

    fn build_cors_base(cors_config: &CorsConfig) -> CorsLayer {
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
            .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
            .max_age(Duration::from_secs(cors_config.max_age_seconds))
    }

    fn cors_allows_any_origin(cors_config: &CorsConfig) -> bool {
        cors_config.allowed_origins.len() == 1
            && cors_config
                .allowed_origins
                .first()
                .is_some_and(|origin| origin == "*")
    }

    fn parse_cors_origins(cors_config: &CorsConfig) -> Vec<HeaderValue> {
        let mut allowed = Vec::new();
        for origin in &cors_config.allowed_origins {
            match HeaderValue::from_str(origin) {
                Ok(value) => allowed.push(value),
                Err(_) => {
                    tracing::error!(
                        origin = %origin,
                        "Invalid CORS origin; expected a valid HeaderValue"
                    );
                }
            }
        }
        allowed
    }

    fn apply_cors_allowed_origins(cors: CorsLayer, cors_config: &CorsConfig) -> CorsLayer {
        if cors_config.allowed_origins.is_empty() {
            return cors;
        }

        if Self::cors_allows_any_origin(cors_config) {
            return cors.allow_origin(Any);
        }

        if cors_config
            .allowed_origins
            .iter()
            .any(|origin| origin == "*")
        {
            tracing::error!(
                origins = ?cors_config.allowed_origins,
                "Invalid CORS config: '*' must be the only allowed origin"
            );
            return cors;
        }

        let allowed = Self::parse_cors_origins(cors_config);

        if allowed.is_empty() {
            tracing::warn!("All configured CORS origins were invalid; disabling CORS");
            cors
        } else {
            tracing::info!(origins = ?cors_config.allowed_origins, "CORS configured");
            cors.allow_origin(AllowOrigin::list(allowed))
        }
    }

    /// Starts the server and blocks until shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the server
    /// cannot bind to the port.
    pub async fn serve(&self) -> Result<()> {
        self.validate_config()?;

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.create_router();

        tracing::info!(
            http_port = self.config.http_port,
            worker = self.config.worker.base_url.as_deref().unwrap_or("<none>"),
            "Starting Runway API server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            runway_core::Error::Internal {
                message: format!("failed to bind to {addr}: {e}"),
            }
        })?;

        axum::serve(listener, router)
            .await
            .map_err(|e| runway_core::Error::Internal {
                message: format!("server error: {e}"),
            })?;

        Ok(())
    }

    /// Creates a test router for the server.
    ///
    /// This is useful for integration tests where you want to test
    /// the routes without actually binding to a port.
    #[doc(hidden)]
    pub fn test_router(&self) -> Router {
        self.create_router()
    }

    fn validate_config(&self) -> Result<()> {
        // Enforce "no wildcard in production" for CORS.
        if !self.config.debug
            && self
                .config
                .cors
                .allowed_origins
                .iter()
                .any(|origin| origin == "*")
        {
            return Err(runway_core::Error::InvalidInput(
                "cors.allowed_origins cannot include '*' when debug=false".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint() -> Result<()> {
        let server = Server::new(Config::default());
        let router = server.test_router();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let health: HealthResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert_eq!(health.status, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn test_ready_endpoint() -> Result<()> {
        let server = Server::new(Config::default());
        let router = server.test_router();

        let request = Request::builder()
            .uri("/ready")
            .body(Body::empty())
            .context("build request")?;

        let response = router.oneshot(request).await.map_err(|err| -> anyhow::Error { match err {} })?;

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .context("read response body")?;
        let ready: ReadyResponse = serde_json::from_slice(&body).context("parse JSON body")?;
        assert!(ready.ready);
        Ok(())
    }

    #[tokio::test]
    async fn test_serve_rejects_wildcard_cors_outside_debug() {
        let mut config = Config::default();
        config.debug = false;
        config.cors.allowed_origins = vec!["*".to_string()];

        let server = Server::new(config);
        let result = server.validate_config();
        assert!(result.is_err());
    }
}
