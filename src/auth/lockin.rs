use std::sync::Arc;

use axum::{debug_handler, extract::{Query, State}, http::header::SET_COOKIE, response::{IntoResponse, Redirect, Response}};
use oauth2::{AuthorizationCode, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, Scope, TokenResponse};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tower_sessions::Session;
use tracing::warn;

use crate::{config::Config, session::{self, CSRF_STATE, PKCE_VERIFIER}, token::TokenService, users::User, AppError, AppResult, AppState, GetField};

use super::{clients::GOOGLE_USERINFO_URL, identity, Clients, GoogleProfile};

#[derive(Deserialize)]
pub struct LockinQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Starts the server-side Google flow. CSRF state and the PKCE verifier wait
/// in the session until Google redirects back.
#[debug_handler(state = AppState)]
pub(crate) async fn google_redirect(
    State(clients): State<Clients>,
    session: Session,
) -> AppResult<Redirect> {
    let client = clients.google()?;

    let (pkce_code_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = client.authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .set_pkce_challenge(pkce_code_challenge)
        .url();

    session.insert(CSRF_STATE, csrf_state.secret()).await?;
    session.insert(PKCE_VERIFIER, pkce_verifier.secret()).await?;

    Ok(Redirect::to(authorize_url.as_str()))
}

/// Google's redirect target. Lands the browser back on the client with a
/// session token, or on the login page when anything went wrong.
#[debug_handler(state = AppState)]
pub(crate) async fn lockin(
    Query(query): Query<LockinQuery>,
    State(db_pool): State<SqlitePool>,
    State(clients): State<Clients>,
    State(tokens): State<TokenService>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> Response {
    let signed_in = match complete(query, &db_pool, &clients, &session).await {
        Ok(user) => tokens.issue(user.id),
        Err(err) => Err(err),
    };

    match signed_in {
        Ok(token) => {
            let max_age = time::Duration::seconds(tokens.ttl().num_seconds());
            let cookie = session::token_cookie(&token, max_age, config.production);
            (
                [(SET_COOKIE, cookie)],
                Redirect::to(&format!("{}/auth/success?token={token}", config.client_url)),
            )
                .into_response()
        }
        Err(err) => {
            warn!(error = %err, "google sign-in failed");
            Redirect::to(&format!("{}/login?error=google_auth_failed", config.client_url)).into_response()
        }
    }
}

async fn complete(
    LockinQuery { state, code }: LockinQuery,
    db_pool: &SqlitePool,
    clients: &Clients,
    session: &Session,
) -> AppResult<User> {
    let state = CsrfToken::new(state.ok_or_else(|| AppError::validation("OAuth: without state"))?);
    let code = AuthorizationCode::new(code.ok_or_else(|| AppError::validation("OAuth: without code"))?);

    let Some(stored_state) = session.remove::<String>(CSRF_STATE).await? else {
        return Err(AppError::validation("no csrf_state"));
    };

    if state.secret().as_str() != stored_state.as_str() {
        return Err(AppError::validation("csrf tokens don't match"));
    }

    let Some(pkce_verifier) = session.remove::<String>(PKCE_VERIFIER).await? else {
        return Err(AppError::validation("no pkce_verifier"));
    };

    let token_result = clients.google()?
        .exchange_code(code)
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(clients.http())
        .await?;

    let body: Value = clients.http()
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token_result.access_token().secret())
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let profile = GoogleProfile::new(
        body.get_str_field("id")?,
        &body.get_str_field("email")?,
        body.get("name").and_then(Value::as_str).map(str::to_owned),
        body.get("picture").and_then(Value::as_str).map(str::to_owned),
        body.get("verified_email").and_then(Value::as_bool).unwrap_or(false),
    )?;

    identity::google_login(db_pool, &profile).await
}
