mod clients;
mod google;
mod guard;
mod identity;
mod lockin;
mod login;
mod logout;
mod password;
mod profile;
mod validate;

use axum::{
    http::{header::SET_COOKIE, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;

use crate::{config::Config, session, token::TokenService, users::User, AppResult, AppState};

pub use clients::Clients;
pub use google::{GoogleProfile, IdTokenVerifier, TokenInfoVerifier};
pub use guard::{authenticate, authorize, session_token, CurrentUser};
pub use identity::{google_login, login, register};

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(login::register))
        .route("/login", post(login::login))
        .route("/google", post(login::google))
        .route("/google/login", get(lockin::google_redirect))
        .route("/google/callback", get(lockin::lockin))
        .route("/logout", post(logout::logout));

    let protected = Router::new()
        .route("/me", get(login::me))
        .route("/profile", put(profile::update_profile))
        .route("/change-password", put(profile::change_password))
        .route("/account", delete(logout::delete_account))
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    public.merge(protected)
}

#[derive(Serialize)]
struct TokenBody {
    success: bool,
    token: String,
    user: User,
}

pub(crate) fn token_response(tokens: &TokenService, config: &Config, status: StatusCode, user: User) -> AppResult<Response> {
    let token = tokens.issue(user.id)?;
    let max_age = time::Duration::seconds(tokens.ttl().num_seconds());
    let cookie = session::token_cookie(&token, max_age, config.production);

    Ok((
        status,
        [(SET_COOKIE, cookie)],
        Json(TokenBody { success: true, token, user }),
    )
        .into_response())
}
