//! Long-lived HTTP server adapter
//!
//! Exposes the shared pipeline over two routes: a liveness endpoint for
//! load balancing and the background-removal endpoint. Errors are mapped to
//! transport status codes here; the pipeline itself knows nothing about
//! HTTP.

use crate::config::ServiceConfig;
use crate::error::{BgServeError, Result};
use crate::pipeline::{RemovalPipeline, RemovalRequest};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Build the application router around a shared pipeline
pub fn router(pipeline: Arc<RemovalPipeline>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/remove-background", post(remove_background))
        .with_state(pipeline)
}

/// Run the HTTP server until it is shut down
///
/// # Errors
/// - Failed to bind the listen address
/// - Fatal server I/O errors
pub async fn serve(config: &ServiceConfig, pipeline: Arc<RemovalPipeline>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening for requests");

    axum::serve(listener, router(pipeline)).await?;
    Ok(())
}

/// Liveness endpoint; reports healthy with no dependency checks
async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

/// Background-removal endpoint
async fn remove_background(
    State(pipeline): State<Arc<RemovalPipeline>>,
    Json(request): Json<RemovalRequest>,
) -> Response {
    match pipeline.process(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => {
            tracing::warn!(%error, "background removal failed");
            (
                status_for(&error),
                Json(json!({ "error": error.wire_message() })),
            )
                .into_response()
        },
    }
}

/// Map pipeline errors to transport status codes
fn status_for(error: &BgServeError) -> StatusCode {
    match error {
        BgServeError::InvalidRequest(_) | BgServeError::UnsupportedModel { .. } => {
            StatusCode::BAD_REQUEST
        },
        BgServeError::Download(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
