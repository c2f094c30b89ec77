mod completion;
mod message;
mod personality;
mod stream;

use axum::{debug_handler, middleware, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::{auth::authenticate, AppError, AppResult, AppState};

pub use completion::{ChatMessage, CompletionClient, CompletionRequest, Deltas, HttpCompletionClient};
pub use personality::{personality, Personality, PERSONALITIES};

const HISTORY_LIMIT: usize = 10;

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/personalities", get(personalities));

    let protected = Router::new()
        .route("/message", post(message::message))
        .route("/stream", post(stream::stream))
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    public.merge(protected)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChatBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    personality: Option<String>,
    #[serde(default)]
    conversation_history: Vec<ChatMessage>,
}

/// System prompt, then the tail of the history, then the new message.
/// History entries with a role other than user or assistant are dropped so a
/// client cannot smuggle in its own system prompt.
pub(crate) fn prepare(body: ChatBody) -> AppResult<(&'static Personality, CompletionRequest)> {
    let ChatBody { message, personality: requested, conversation_history } = body;
    if message.trim().is_empty() {
        return Err(AppError::validation("Please provide a message"));
    }

    let persona = personality(requested.as_deref().unwrap_or_default());

    let history: Vec<ChatMessage> = conversation_history
        .into_iter()
        .filter(|msg| matches!(msg.role.as_str(), "user" | "assistant"))
        .collect();
    let skip = history.len().saturating_sub(HISTORY_LIMIT);

    let mut messages = Vec::with_capacity(HISTORY_LIMIT + 2);
    messages.push(ChatMessage::new("system", persona.system_prompt));
    messages.extend(history.into_iter().skip(skip));
    messages.push(ChatMessage::new("user", message));

    Ok((persona, CompletionRequest { model: persona.model, messages }))
}

#[debug_handler]
async fn personalities() -> impl IntoResponse {
    Json(json!({ "success": true, "personalities": PERSONALITIES }))
}
