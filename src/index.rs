use axum::{debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::error;

use crate::AppState;

#[debug_handler]
pub async fn index() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Confab API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[debug_handler(state = AppState)]
pub async fn health(State(db_pool): State<SqlitePool>) -> Response {
    match sqlx::query("SELECT 1").execute(&db_pool).await {
        Ok(_) => Json(json!({ "success": true, "status": "ok", "database": "connected" })).into_response(),
        Err(err) => {
            error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "success": false, "status": "error", "database": "unreachable" })),
            )
                .into_response()
        }
    }
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Route not found" })),
    )
}
