pub mod admin;
pub mod appresult;
pub mod auth;
pub mod chat;
pub mod config;
pub mod conversations;
pub mod db;
pub mod index;
pub mod middleware;
pub mod session;
pub mod token;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    http::{header::{AUTHORIZATION, CONTENT_TYPE}, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use tower_http::{cors::{AllowOrigin, CorsLayer}, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};

use auth::IdTokenVerifier;
use chat::CompletionClient;
use config::Config;
use middleware::RateLimit;
use token::TokenService;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub clients: auth::Clients,
    pub id_tokens: Arc<dyn IdTokenVerifier>,
    pub completions: Arc<dyn CompletionClient>,
    pub rate_limit: RateLimit,
}

impl AppState {
    pub fn new(config: Config, db_pool: SqlitePool) -> anyhow::Result<AppState> {
        let clients = auth::Clients::from_config(&config)?;
        let http = reqwest::Client::new();

        let id_tokens = Arc::new(auth::TokenInfoVerifier::new(
            http.clone(),
            config.google.as_ref().map(|google| google.client_id.clone()),
        ));
        let completions = Arc::new(chat::HttpCompletionClient::new(http, &config.llm));

        Ok(AppState::with_collaborators(config, db_pool, clients, id_tokens, completions))
    }

    pub fn with_collaborators(
        config: Config,
        db_pool: SqlitePool,
        clients: auth::Clients,
        id_tokens: Arc<dyn IdTokenVerifier>,
        completions: Arc<dyn CompletionClient>,
    ) -> AppState {
        let tokens = TokenService::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::days(config.jwt_expire_days),
        );

        AppState {
            db_pool,
            rate_limit: RateLimit::new(&config.rate_limit),
            config: Arc::new(config),
            tokens,
            clients,
            id_tokens,
            completions,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.production)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(10)));

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.config.allowed_origins.iter().cloned()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let api = Router::new()
        .nest("/auth", auth::router(state.clone()))
        .nest("/conversations", conversations::router(state.clone()))
        .nest("/chat", chat::router(state.clone()))
        .nest("/admin", admin::router(state.clone()))
        .route_layer(from_fn_with_state(state.clone(), middleware::rate_limit));

    Router::new()
        .route("/", get(index::index))
        .route("/health", get(index::health))
        .merge(api)
        .fallback(index::not_found)
        .layer(from_fn_with_state(state.clone(), middleware::security_headers))
        .with_state(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> AppResult<String>;
    fn get_obj_field(&self, field: &str) -> AppResult<&Value>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> AppResult<String> {
        Ok(
            self.get_obj_field(field)?
                .as_str()
                .ok_or_else(|| AppError::Upstream(format!("expected {field} to be a string")))?
                .to_owned()
        )
    }

    fn get_obj_field(&self, field: &str) -> AppResult<&Value> {
        self.get(field)
            .ok_or_else(|| AppError::Upstream(format!("expected {field} in response")))
    }
}
