use axum::{http::{header, StatusCode}, response::{IntoResponse, Response}, Json};
use serde_json::json;
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a handler can produce. The message of each variant is what
/// the client sees, except `Internal`, which is logged and replaced.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Not authorized to access this route")]
    Unauthenticated,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("This account uses Google Sign-In. Please login with Google.")]
    WrongProvider,
    #[error("User role is not authorized to access this route")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("Too many requests from this IP, please try again later.")]
    RateLimited { retry_after: u64 },
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        use AppError::*;
        match self {
            Validation(_) => StatusCode::BAD_REQUEST,
            Unauthenticated | InvalidCredentials | WrongProvider => StatusCode::UNAUTHORIZED,
            Forbidden => StatusCode::FORBIDDEN,
            NotFound(_) => StatusCode::NOT_FOUND,
            Conflict(_) => StatusCode::CONFLICT,
            RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Upstream(_) => StatusCode::BAD_GATEWAY,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Internal(err) => {
                error!(error = ?err, "request failed");
                "Server error".to_owned()
            }
            other => other.to_string(),
        };

        let mut response = (
            self.status(),
            Json(json!({ "success": false, "error": message })),
        )
            .into_response();

        if let AppError::RateLimited { retry_after } = self {
            response.headers_mut().insert(header::RETRY_AFTER, retry_after.into());
        }
        response
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(tower_sessions::session::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(tokio::task::JoinError);

impl<E: core::error::Error + Send + Sync + 'static, R: oauth2::ErrorResponse + Send + Sync + 'static> From<oauth2::RequestTokenError<E, R>> for AppError {
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}
