use std::sync::Arc;

use axum::{debug_handler, extract::State, http::header::SET_COOKIE, response::IntoResponse, Json};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::info;

use crate::{config::Config, session, users, AppResult, AppState};

use super::CurrentUser;

/// Tokens are stateless; logging out only drops the cookie.
#[debug_handler(state = AppState)]
pub(crate) async fn logout(State(config): State<Arc<Config>>) -> impl IntoResponse {
    (
        [(SET_COOKIE, session::cleared_token_cookie(config.production))],
        Json(json!({ "success": true, "message": "Logged out successfully" })),
    )
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_account(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    users::delete_user(&db_pool, user.id).await?;
    info!(user_id = %user.id, "deleted account");

    Ok((
        [(SET_COOKIE, session::cleared_token_cookie(config.production))],
        Json(json!({ "success": true, "message": "Account deleted successfully" })),
    ))
}
