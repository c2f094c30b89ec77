use std::sync::Arc;

use axum::{debug_handler, extract::State, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{config::Config, token::TokenService, AppResult, AppState};

use super::{identity, token_response, CurrentUser, IdTokenVerifier};

#[derive(Deserialize)]
pub(crate) struct RegisterBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub(crate) struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
pub(crate) struct GoogleBody {
    #[serde(alias = "externalAssertion")]
    token: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn register(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenService>,
    State(config): State<Arc<Config>>,
    Json(RegisterBody { name, email, password }): Json<RegisterBody>,
) -> AppResult<Response> {
    let user = identity::register(&db_pool, &name, &email, password).await?;
    token_response(&tokens, &config, StatusCode::CREATED, user)
}

#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenService>,
    State(config): State<Arc<Config>>,
    Json(LoginBody { email, password }): Json<LoginBody>,
) -> AppResult<Response> {
    let user = identity::login(&db_pool, &email, password).await?;
    token_response(&tokens, &config, StatusCode::OK, user)
}

#[debug_handler(state = AppState)]
pub(crate) async fn google(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenService>,
    State(config): State<Arc<Config>>,
    State(verifier): State<Arc<dyn IdTokenVerifier>>,
    Json(GoogleBody { token }): Json<GoogleBody>,
) -> AppResult<Response> {
    let Some(token) = token.filter(|token| !token.is_empty()) else {
        return Err(crate::AppError::validation("Please provide a Google token"));
    };

    let profile = verifier.verify(&token).await?;
    let user = identity::google_login(&db_pool, &profile).await?;
    token_response(&tokens, &config, StatusCode::OK, user)
}

#[debug_handler]
pub(crate) async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Json(json!({ "success": true, "user": user }))
}
