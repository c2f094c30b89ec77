use axum::{debug_handler, extract::{Path, State}, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{auth::CurrentUser, AppError, AppResult, AppState};

use super::{append_message, parse_id, Sender};

#[derive(Deserialize)]
pub(crate) struct AddMessageBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    sender: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_message(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(AddMessageBody { text, sender }): Json<AddMessageBody>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    if text.trim().is_empty() {
        return Err(AppError::validation("Please provide message text"));
    }
    let sender: Sender = sender
        .parse()
        .map_err(|_| AppError::validation("Sender must be user or assistant"))?;

    let conversation = append_message(&db_pool, id, user.id, &text, sender)
        .await?
        .ok_or(AppError::NotFound("Conversation"))?;

    Ok(Json(json!({ "success": true, "conversation": conversation })))
}
