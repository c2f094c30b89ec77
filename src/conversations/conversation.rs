use axum::{debug_handler, extract::{Path, State}, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::info;

use crate::{auth::CurrentUser, AppError, AppResult, AppState};

use super::{
    create_conversation, delete_conversation, find_owned, parse_id, rename_conversation, Conversation, Sender,
    DEFAULT_PERSONALITY, DEFAULT_TITLE,
};

const TITLE_LENGTH: usize = 40;

#[derive(Deserialize, Default)]
pub(crate) struct CreateBody {
    title: Option<String>,
    personality: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RenameBody {
    #[serde(default)]
    title: String,
}

/// The first 40 characters of the first user message, with an ellipsis when
/// cut short.
pub(crate) fn title_from(conversation: &Conversation) -> Option<String> {
    let first = conversation.messages.iter().find(|msg| msg.sender == Sender::User)?;

    let mut title: String = first.text.chars().take(TITLE_LENGTH).collect();
    if first.text.chars().count() > TITLE_LENGTH {
        title.push_str("...");
    }
    Some(title)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

#[debug_handler(state = AppState)]
pub(crate) async fn create(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    body: Option<Json<CreateBody>>,
) -> AppResult<impl IntoResponse> {
    let CreateBody { title, personality } = body.map(|Json(body)| body).unwrap_or_default();
    let title = non_empty(title).unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    let personality = non_empty(personality).unwrap_or_else(|| DEFAULT_PERSONALITY.to_owned());

    let conversation = create_conversation(&db_pool, user.id, &title, &personality).await?;
    info!(conversation_id = %conversation.id, user_id = %user.id, "created conversation");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "conversation": conversation })),
    ))
}

#[debug_handler(state = AppState)]
pub(crate) async fn fetch(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let conversation = find_owned(&db_pool, parse_id(&id)?, user.id)
        .await?
        .ok_or(AppError::NotFound("Conversation"))?;

    Ok(Json(json!({ "success": true, "conversation": conversation })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn rename(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(RenameBody { title }): Json<RenameBody>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::validation("Please provide a title"));
    }

    let conversation = rename_conversation(&db_pool, id, user.id, title)
        .await?
        .ok_or(AppError::NotFound("Conversation"))?;

    Ok(Json(json!({ "success": true, "conversation": conversation })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    if !delete_conversation(&db_pool, id, user.id).await? {
        return Err(AppError::NotFound("Conversation"));
    }
    info!(conversation_id = %id, user_id = %user.id, "deleted conversation");

    Ok(Json(json!({ "success": true, "message": "Conversation deleted" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn generate_title(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let conversation = find_owned(&db_pool, id, user.id)
        .await?
        .ok_or(AppError::NotFound("Conversation"))?;

    let conversation = match title_from(&conversation) {
        Some(title) => rename_conversation(&db_pool, id, user.id, &title)
            .await?
            .ok_or(AppError::NotFound("Conversation"))?,
        None => conversation,
    };

    Ok(Json(json!({ "success": true, "conversation": conversation })))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::conversations::Message;

    fn conversation(messages: &[(&str, Sender)]) -> Conversation {
        let now = Utc::now();
        Conversation {
            id: Uuid::now_v7(),
            user_id: Uuid::now_v7(),
            title: DEFAULT_TITLE.to_owned(),
            personality: DEFAULT_PERSONALITY.to_owned(),
            messages: messages
                .iter()
                .map(|(text, sender)| Message { text: (*text).to_owned(), sender: *sender, timestamp: now })
                .collect(),
            is_shared: false,
            share_token: None,
            shared_at: None,
            last_message_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn title_uses_first_user_message() {
        let c = conversation(&[("Hello there", Sender::Assistant), ("How do lifetimes work?", Sender::User)]);
        assert_eq!(title_from(&c).as_deref(), Some("How do lifetimes work?"));
    }

    #[test]
    fn long_titles_are_cut_at_forty_chars() {
        let text = "é".repeat(41);
        let c = conversation(&[(text.as_str(), Sender::User)]);
        assert_eq!(title_from(&c), Some(format!("{}...", "é".repeat(40))));

        let exact = "a".repeat(40);
        let c = conversation(&[(exact.as_str(), Sender::User)]);
        assert_eq!(title_from(&c), Some(exact));
    }

    #[test]
    fn no_user_message_no_title() {
        assert_eq!(title_from(&conversation(&[])), None);
        assert_eq!(title_from(&conversation(&[("hi", Sender::Assistant)])), None);
    }
}
