//! Health and metrics endpoint server using Axum

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

use crate::core::lifecycle::LifecycleState;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub service: &'static str,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub lifecycle: Option<watch::Receiver<LifecycleState>>,
}

impl AppState {
    pub fn new(service: &'static str, metrics: Arc<Metrics>) -> Self {
        Self {
            service,
            metrics,
            start_time: Arc::new(Instant::now()),
            lifecycle: None,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: watch::Receiver<LifecycleState>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let uptime_seconds = state.start_time.elapsed().as_secs();
    let lifecycle = state.lifecycle.as_ref().map(|rx| *rx.borrow());
    let status = match lifecycle {
        None | Some(LifecycleState::Running) => "healthy",
        Some(_) => "unavailable",
    };
    Ok(Json(json!({
        "status": status,
        "state": lifecycle,
        "uptime_seconds": uptime_seconds,
        "service": state.service
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.export().map_err(|e| {
        error!(error = %e, "Failed to export metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                    .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
            ),
        )
        .with_state(state)
}

/// Serve until `shutdown` fires
pub async fn start_server(
    port: u16,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let service = state.service;
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, service = service, "Metrics endpoint available at http://0.0.0.0:{}/metrics", port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
