use std::sync::Arc;

use axum::{debug_handler, extract::State, response::IntoResponse, Json};
use serde_json::json;
use tracing::info;

use crate::{auth::CurrentUser, AppResult, AppState};

use super::{prepare, ChatBody, CompletionClient};

#[debug_handler(state = AppState)]
pub(crate) async fn message(
    State(completions): State<Arc<dyn CompletionClient>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ChatBody>,
) -> AppResult<impl IntoResponse> {
    let (persona, request) = prepare(body)?;
    info!(user_id = %user.id, personality = persona.id, "chat message");

    let reply = completions.complete(request).await?;

    Ok(Json(json!({
        "success": true,
        "message": reply,
        "personality": {
            "type": persona.id,
            "name": persona.name,
            "icon": persona.icon,
        },
    })))
}
