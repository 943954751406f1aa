use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::{db, error::AppError, models::ApiResponse, AppState};

/// GET /
pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "URL Shortener API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
///
/// Liveness probe. Also checks the database answers.
pub async fn health(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    db::ping(&state.db).await?;
    Ok(StatusCode::OK)
}

/// Fallback for every unmatched route.
pub async fn not_found() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::failure("Route not found", None)),
    )
}
