mod tns;

pub use tns::*;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use super::middleware::{Caller, Permission};
use crate::db::Database;
use crate::models::*;

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
///
/// Lookups of missing records are reported as 404 with their message;
/// everything else becomes a generic 500.
fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    let msg = e.to_string();

    if msg.contains("not found") {
        tracing::warn!("Lookup failed: {}", msg);
        return (StatusCode::NOT_FOUND, msg);
    }

    tracing::error!("Internal error: {}", msg);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn target_not_found() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Target not found".to_string())
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Targets
// ============================================================

pub async fn list_targets(
    State(db): State<Database>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Target>>, (StatusCode, String)> {
    caller.require(Permission::ViewTarget)?;
    db.get_all_targets().map(Json).map_err(internal_error)
}

pub async fn create_target(
    State(db): State<Database>,
    Extension(caller): Extension<Caller>,
    Json(input): Json<CreateTargetInput>,
) -> Result<(StatusCode, Json<TargetWithNames>), (StatusCode, String)> {
    caller.require(Permission::ChangeTarget)?;
    if input.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Target name is required".to_string()));
    }
    db.create_target(input)
        .map(|t| (StatusCode::CREATED, Json(t)))
        .map_err(internal_error)
}

/// Target detail page. Shows, and clears, messages left by submissions.
pub async fn get_target(
    State(db): State<Database>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<TargetDetail>, (StatusCode, String)> {
    caller.require(Permission::ViewTarget)?;
    let target = db
        .get_target_with_names(id)
        .map_err(internal_error)?
        .ok_or_else(target_not_found)?;
    let messages = db.take_messages(id).map_err(internal_error)?;

    Ok(Json(TargetDetail { target, messages }))
}
