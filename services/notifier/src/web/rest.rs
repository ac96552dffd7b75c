//! services/notifier/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::scheduler::{Trigger, TriggerError};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        trigger_notifications_handler,
        health_handler,
    ),
    components(
        schemas(TriggerResponse, HealthResponse)
    ),
    tags(
        (name = "Compliance Notifier API", description = "Manual trigger and health endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

/// The response payload of a manual notification pass.
#[derive(Serialize, ToSchema)]
pub struct TriggerResponse {
    success: bool,
    summary: String,
    /// Per-table statuses and delivery counters of the pass.
    #[schema(value_type = Option<Object>)]
    report: Option<serde_json::Value>,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    pass_running: bool,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Run one notification pass now.
///
/// The call returns once the pass is over. Also served on GET.
#[utoipa::path(
    post,
    path = "/notifications/send",
    responses(
        (status = 200, description = "Pass completed", body = TriggerResponse),
        (status = 409, description = "A pass is already running", body = TriggerResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn trigger_notifications_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.runner.run_now(Trigger::Manual).await {
        Ok(report) => {
            let summary = report.summary();
            let report = serde_json::to_value(&report).map_err(|e| {
                error!("Failed to serialize the pass report: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to serialize the pass report".to_string(),
                )
            })?;
            Ok((
                StatusCode::OK,
                Json(TriggerResponse {
                    success: true,
                    summary,
                    report: Some(report),
                }),
            ))
        }
        Err(e @ TriggerError::AlreadyRunning) => Ok((
            StatusCode::CONFLICT,
            Json(TriggerResponse {
                success: false,
                summary: e.to_string(),
                report: None,
            }),
        )),
        Err(e @ TriggerError::Failed(_)) => {
            error!("Manual notification pass failed: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        pass_running: app_state.runner.is_running(),
    })
}
