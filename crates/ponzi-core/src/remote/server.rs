use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BINARY_CONTENT_TYPE, ERROR_HEADER};
use crate::client::{ChartRequest, QuoteRequest, StockClient};
use crate::codec::{decode, encode, WireMessage};
use crate::metrics::MetricsRegistry;
use crate::StockError;

/// Shared state for the transport handlers.
#[derive(Clone)]
pub struct ServerState {
    client: Arc<dyn StockClient>,
    metrics: Option<MetricsRegistry>,
}

impl ServerState {
    pub fn new(client: Arc<dyn StockClient>) -> Self {
        Self {
            client,
            metrics: None,
        }
    }

    /// Expose `metrics` at `GET /metrics`.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/quote", get(quote_handler).post(quote_handler))
        .route("/chart", get(chart_handler).post(chart_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Bind `0.0.0.0:<port>`.
pub async fn bind(port: u16) -> Result<TcpListener, std::io::Error> {
    TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await
}

/// Serve until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "remote transport listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn quote_handler(State(state): State<ServerState>, body: Bytes) -> Response {
    let request: QuoteRequest = match decode(&body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    debug!(symbols = request.symbols.len(), "remote quote request");

    // Cancelled if the connection goes away and this future is dropped.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    match state.client.get_quotes(&cancel, request).await {
        Ok(batch) => binary_response(&batch),
        Err(error) => error_response(&error),
    }
}

async fn chart_handler(State(state): State<ServerState>, body: Bytes) -> Response {
    let request: ChartRequest = match decode(&body) {
        Ok(request) => request,
        Err(error) => return error_response(&error),
    };
    debug!(
        symbols = request.symbols.len(),
        range = %request.range,
        "remote chart request"
    );

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    match state.client.get_charts(&cancel, request).await {
        Ok(batch) => binary_response(&batch),
        Err(error) => error_response(&error),
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn metrics_handler(State(state): State<ServerState>) -> Response {
    match &state.metrics {
        Some(metrics) => Json(metrics.snapshot()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are not exported").into_response(),
    }
}

fn binary_response<T: WireMessage>(value: &T) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(BINARY_CONTENT_TYPE),
        )],
        encode(value),
    )
        .into_response()
}

/// Every client-visible failure is a 400 whose header carries the error kind.
fn error_response(error: &StockError) -> Response {
    warn!(code = error.code(), message = error.message(), "remote request failed");
    (
        StatusCode::BAD_REQUEST,
        [(ERROR_HEADER, HeaderValue::from_static(error.code()))],
        error.message().to_owned(),
    )
        .into_response()
}
