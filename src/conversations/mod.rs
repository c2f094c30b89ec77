mod conversation;
mod list;
mod msg;
mod share;
mod store;

use std::str::FromStr;

use axum::{middleware, routing::{get, post}, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::authenticate, AppError, AppResult, AppState};

pub use list::{group_by_recency, GroupedConversations};
pub use share::{get_shared, new_share_token, share, share_url, unshare};
pub use store::*;

pub const DEFAULT_TITLE: &str = "New Conversation";
pub const DEFAULT_PERSONALITY: &str = "general";

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/share/{token}", get(share::shared_conversation));

    let protected = Router::new()
        .route("/", get(list::conversations).post(conversation::create))
        .route("/{id}", get(conversation::fetch).put(conversation::rename).delete(conversation::remove))
        .route("/{id}/messages", post(msg::add_message))
        .route("/{id}/generate-title", post(conversation::generate_title))
        .route("/{id}/share", post(share::share_conversation).delete(share::unshare_conversation))
        .route_layer(middleware::from_fn_with_state(state, authenticate));

    public.merge(protected)
}

/// Ids that do not parse are reported like ids that do not exist.
pub(crate) fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::NotFound("Conversation"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

impl FromStr for Sender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            other => Err(anyhow::anyhow!("unknown sender {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub personality: String,
    pub messages: Vec<Message>,
    pub is_shared: bool,
    pub share_token: Option<String>,
    pub shared_at: Option<DateTime<Utc>>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub personality: String,
    pub is_shared: bool,
    pub share_token: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What an anonymous visitor of a share link sees. The owner appears only by
/// display name.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedConversation {
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub shared_by: String,
}
