use axum::{debug_handler, extract::State, middleware, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{auth::{authenticate, authorize, CurrentUser}, users::{self, Role}, AppResult, AppState};

const ADMIN_ONLY: &[Role] = &[Role::Admin];

pub fn router(state: AppState) -> Router<AppState> {
    // Layers run outermost first: authenticate, then authorize.
    Router::new()
        .route("/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(ADMIN_ONLY, authorize))
        .route_layer(middleware::from_fn_with_state(state, authenticate))
}

#[debug_handler(state = AppState)]
async fn list_users(
    State(db_pool): State<SqlitePool>,
    CurrentUser(_admin): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let users = users::list_users(&db_pool).await?;
    Ok(Json(json!({ "success": true, "count": users.len(), "users": users })))
}
