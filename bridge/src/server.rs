// Ingestion HTTP server
//
// POST /osc turns a {from, to, message} payload into one whisper on the local bus.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use whisper_core::WhisperBus;

use crate::command::{RelayCommand, WhisperPayload};
use crate::queue::DispatchQueue;
use crate::Result;

#[derive(Clone)]
struct IngestState {
    queue: DispatchQueue,
    bus: Arc<WhisperBus>,
}

/// Routes of the ingestion server. `bus` is only read (registry, stats);
/// every publish goes through `queue`.
pub fn router(queue: DispatchQueue, bus: Arc<WhisperBus>) -> Router {
    Router::new()
        .route("/osc", post(osc_handler))
        .route("/health", get(health_handler))
        .route("/agents", get(agents_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(IngestState { queue, bus })
}

/// Serve `router` on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(target: "ingest", url = %format!("http://{}", addr), "Ingestion server ready");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

pub async fn start_server(
    addr: SocketAddr,
    queue: DispatchQueue,
    bus: Arc<WhisperBus>,
) -> Result<()> {
    info!(target: "ingest", %addr, "Starting ingestion server");
    let listener = TcpListener::bind(addr).await?;
    serve(listener, router(queue, bus), async {
        let _ = tokio::signal::ctrl_c().await;
        info!(target: "ingest", "Shutdown signal received");
    })
    .await
}

fn bad_request(reason: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": reason }))).into_response()
}

async fn osc_handler(
    State(state): State<IngestState>,
    payload: std::result::Result<Json<WhisperPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(rejection) => {
            warn!(target: "ingest", error = %rejection.body_text(), "Rejected malformed whisper payload");
            return bad_request(rejection.body_text());
        }
    };

    let cmd = match RelayCommand::try_from(payload) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(target: "ingest", error = %e, "Rejected whisper payload");
            return bad_request(e.to_string());
        }
    };

    info!(target: "ingest", from = %cmd.from, to = %cmd.to, "Whisper received over HTTP");
    match state.queue.publish(cmd.into_whisper()).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "delivered": report.delivered,
                "faulted": report.faulted,
            })),
        )
            .into_response(),
        Err(e) => {
            error!(target: "ingest", error = %e, "Dispatch queue unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<IngestState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp_ms": chrono::Utc::now().timestamp_millis(),
        "bus": state.bus.stats(),
    }))
}

async fn agents_handler(State(state): State<IngestState>) -> impl IntoResponse {
    Json(json!({ "agents": state.bus.registry().names() }))
}
