#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use confab::{
    app,
    auth::{Clients, GoogleProfile, IdTokenVerifier},
    chat::{CompletionClient, CompletionRequest, Deltas},
    config::Config,
    db, AppError, AppResult, AppState,
};
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::ServiceExt;

pub const SECRET: &str = "integration-test-secret";

/// Accepts assertions of the form `google-id|email|name`; anything else is
/// an invalid token.
pub struct FakeVerifier;

#[async_trait]
impl IdTokenVerifier for FakeVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<GoogleProfile> {
        let mut parts = id_token.split('|');
        let (Some(google_id), Some(email), name) = (parts.next(), parts.next(), parts.next()) else {
            return Err(AppError::Unauthenticated);
        };
        GoogleProfile::new(google_id.to_owned(), email, name.map(str::to_owned), None, true)
    }
}

/// Answers with canned text and remembers what it was asked.
#[derive(Default)]
pub struct FakeCompletions {
    pub requests: Mutex<Vec<CompletionRequest>>,
}

#[async_trait]
impl CompletionClient for FakeCompletions {
    async fn complete(&self, request: CompletionRequest) -> AppResult<String> {
        let reply = format!("echo: {}", request.messages.last().map(|m| m.content.as_str()).unwrap_or_default());
        self.requests.lock().unwrap().push(request);
        Ok(reply)
    }

    async fn stream(&self, request: CompletionRequest) -> AppResult<Deltas> {
        self.requests.lock().unwrap().push(request);
        let deltas = ["Hel", "lo", "!"].map(|delta| Ok(delta.to_owned()));
        Ok(stream::iter(deltas).boxed())
    }
}

pub struct TestApp {
    pub router: Router,
    pub db_pool: SqlitePool,
    pub completions: Arc<FakeCompletions>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.bytes.to_vec()).unwrap()
    }

    pub fn set_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .map(|value| value.to_str().unwrap().to_owned())
    }
}

impl TestApp {
    pub async fn new() -> TestApp {
        TestApp::with_config(Config::with_secret(SECRET)).await
    }

    pub async fn with_config(config: Config) -> TestApp {
        let db_pool = db::connect_in_memory().await.unwrap();
        let clients = Clients::from_config(&config).unwrap();
        let completions = Arc::new(FakeCompletions::default());

        let state = AppState::with_collaborators(
            config,
            db_pool.clone(),
            clients,
            Arc::new(FakeVerifier),
            completions.clone(),
        );

        TestApp { router: app(state), db_pool, completions }
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse { status, headers, bytes }
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.send(request(method, uri, token, body)).await
    }

    /// Registers a password user and returns its session token.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> String {
        let res = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(serde_json::json!({ "name": name, "email": email, "password": password })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.text());
        res.json()["token"].as_str().unwrap().to_owned()
    }

    pub async fn promote_to_admin(&self, email: &str) {
        sqlx::query("UPDATE users SET role = 'admin' WHERE email = ?")
            .bind(email)
            .execute(&self.db_pool)
            .await
            .unwrap();
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
