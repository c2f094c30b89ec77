use std::time::Duration;

use anyhow::{bail, Context};
use axum::http::HeaderValue;

const DEV_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    /// Only needed for the redirect flow; ID-token sign-in works without it.
    pub client_secret: Option<String>,
    pub redirect_url: String,
}

#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// At most `max_requests` per client IP in any `window`.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub jwt_expire_days: i64,
    pub client_url: String,
    pub allowed_origins: Vec<HeaderValue>,
    pub production: bool,
    pub rate_limit: RateLimitConfig,
    pub google: Option<GoogleConfig>,
    pub llm: LlmConfig,
}

impl Config {
    /// Defaults for everything except the signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Config {
        Config {
            database_url: "sqlite://confab.db?mode=rwc".to_owned(),
            bind_addr: "0.0.0.0:8080".to_owned(),
            jwt_secret: jwt_secret.into(),
            jwt_expire_days: 7,
            client_url: DEV_ORIGINS[0].to_owned(),
            allowed_origins: DEV_ORIGINS.map(HeaderValue::from_static).to_vec(),
            production: false,
            rate_limit: RateLimitConfig {
                window: Duration::from_secs(15 * 60),
                max_requests: 100,
            },
            google: None,
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.cerebras.ai/v1".to_owned(),
            },
        }
    }

    pub fn from_env() -> anyhow::Result<Config> {
        let jwt_secret = dotenv::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let mut config = Config::with_secret(jwt_secret);

        if let Some(url) = var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(addr) = var("BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(days) = var("JWT_EXPIRE_DAYS") {
            let days: i64 = days.parse().context("JWT_EXPIRE_DAYS must be a number of days")?;
            if !(1..=30).contains(&days) {
                bail!("JWT_EXPIRE_DAYS must be between 1 and 30, got {days}");
            }
            config.jwt_expire_days = days;
        }
        if let Some(url) = var("CLIENT_URL") {
            config.client_url = url.trim_end_matches('/').to_owned();
        }
        config.allowed_origins = allowed_origins([var("CLIENT_URL"), var("FRONTEND_URL")])?;
        config.production = var("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));

        config.google = var("GOOGLE_CLIENT_ID").map(|client_id| GoogleConfig {
            client_id,
            client_secret: var("GOOGLE_CLIENT_SECRET"),
            redirect_url: var("GOOGLE_REDIRECT_URL")
                .unwrap_or_else(|| "http://localhost:8080/auth/google/callback".to_owned()),
        });

        config.llm.api_key = var("LLM_API_KEY");
        if let Some(url) = var("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_owned();
        }

        if let Some(ms) = var("RATE_LIMIT_WINDOW_MS") {
            let ms: u64 = ms.parse().context("RATE_LIMIT_WINDOW_MS must be a number of milliseconds")?;
            if ms == 0 {
                bail!("RATE_LIMIT_WINDOW_MS must be positive");
            }
            config.rate_limit.window = Duration::from_millis(ms);
        }
        if let Some(max) = var("RATE_LIMIT_MAX_REQUESTS") {
            let max: u32 = max.parse().context("RATE_LIMIT_MAX_REQUESTS must be a number")?;
            if max == 0 {
                bail!("RATE_LIMIT_MAX_REQUESTS must be positive");
            }
            config.rate_limit.max_requests = max;
        }

        Ok(config)
    }
}

/// The dev origins plus any configured front-end URLs. A URL that cannot be
/// an `Origin` header value is a startup error.
fn allowed_origins(configured: [Option<String>; 2]) -> anyhow::Result<Vec<HeaderValue>> {
    let mut origins: Vec<String> = DEV_ORIGINS.map(str::to_owned).to_vec();
    for url in configured.into_iter().flatten() {
        let url = url.trim().trim_end_matches('/').to_owned();
        if !origins.contains(&url) {
            origins.push(url);
        }
    }

    origins
        .into_iter()
        .map(|origin| {
            HeaderValue::from_str(&origin).with_context(|| format!("{origin:?} is not a valid CORS origin"))
        })
        .collect()
}


fn var(key: &str) -> Option<String> {
    dotenv::var(key).ok().filter(|value| !value.trim().is_empty())
}
