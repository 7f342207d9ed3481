use std::future::Future;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::broker::ConnectionState;
use crate::ingest::{IngestService, SubmitRequest};
use crate::utils::RelayError;

#[derive(Debug, Serialize)]
struct SubmitResponse {
    success: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    message: &'static str,
    broker: ConnectionState,
    broker_connected: bool,
}

/// Routes of the ingestion service, with CORS open to any origin.
pub fn build_router(service: IngestService) -> Router {
    Router::new()
        .route("/update", post(update))
        .route("/test", get(health))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

/// Serve the ingestion routes on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    service: IngestService,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, build_router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

/// `POST /update`
async fn update(
    State(service): State<IngestService>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| RelayError::validation(e.body_text()))?;
    service.submit(request).await?;
    Ok(Json(SubmitResponse { success: true }))
}

/// `GET /test`
async fn health(State(service): State<IngestService>) -> Json<HealthResponse> {
    let broker = service.broker_state();
    Json(HealthResponse {
        message: "Server is working!",
        broker,
        broker_connected: broker == ConnectionState::Connected,
    })
}

struct ApiError(RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::BrokerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "Message not relayed");
        }
        let body = ErrorBody {
            success: false,
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
