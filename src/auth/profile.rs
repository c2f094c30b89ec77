use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{config::Config, token::TokenService, users, AppError, AppResult, AppState};

use super::{identity, token_response, validate, CurrentUser};

#[derive(Deserialize)]
pub(crate) struct ProfileBody {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordBody {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_profile(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Json(ProfileBody { name, email }): Json<ProfileBody>,
) -> AppResult<impl IntoResponse> {
    let name = name.as_deref().map(validate::name).transpose()?;
    let email = email.as_deref().map(validate::email).transpose()?;

    let user = users::update_profile(&db_pool, user.id, name.as_deref(), email.as_deref())
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(Json(json!({ "success": true, "user": user })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn change_password(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenService>,
    State(config): State<Arc<Config>>,
    CurrentUser(user): CurrentUser,
    Json(ChangePasswordBody { current_password, new_password }): Json<ChangePasswordBody>,
) -> AppResult<Response> {
    identity::change_password(&db_pool, &user, current_password, new_password).await?;
    token_response(&tokens, &config, StatusCode::OK, user)
}
