//! Request guards. `authenticate` resolves the caller from a session token
//! and must run before `authorize`, which only checks the resolved role.
//! Both reject before any handler logic runs.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::{AUTHORIZATION, COOKIE}, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use sqlx::SqlitePool;
use tower_sessions::cookie::Cookie;
use tracing::debug;

use crate::{session::TOKEN_COOKIE, token::TokenService, users::{self, Role, User}, AppError, AppResult};

#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Bearer header first, then the token cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
}

pub async fn authenticate(
    State(db_pool): State<SqlitePool>,
    State(tokens): State<TokenService>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let token = session_token(req.headers()).ok_or(AppError::Unauthenticated)?;
    let user_id = tokens.verify(&token)?;

    let Some(user) = users::find_user(&db_pool, user_id).await? else {
        debug!(user_id = %user_id, "token for a user that no longer exists");
        return Err(AppError::Unauthenticated);
    };

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

pub async fn authorize(
    State(allowed): State<&'static [Role]>,
    req: Request,
    next: Next,
) -> AppResult<Response> {
    let Some(CurrentUser(user)) = req.extensions().get::<CurrentUser>() else {
        return Err(AppError::Unauthenticated);
    };

    if !allowed.contains(&user.role) {
        debug!(user_id = %user.id, role = user.role.as_str(), "role not allowed");
        return Err(AppError::Forbidden);
    }

    Ok(next.run(req).await)
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(session_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn ignores_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(session_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(session_token(&headers), None);
    }
}
