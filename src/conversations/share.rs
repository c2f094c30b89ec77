use std::sync::Arc;

use axum::{debug_handler, extract::{Path, State}, response::IntoResponse, Json};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{auth::CurrentUser, config::Config, AppError, AppResult, AppState};

use super::{clear_share_token, find_shared, parse_id, set_share_token, SharedConversation};

const SHARE_ATTEMPTS: usize = 3;

/// 128 random bits, hex encoded.
pub fn new_share_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

pub fn share_url(client_url: &str, share_token: &str) -> String {
    format!("{}/share/{share_token}", client_url.trim_end_matches('/'))
}

/// Returns the conversation's share token, minting one if it has none.
pub async fn share(db_pool: &SqlitePool, id: Uuid, user_id: Uuid) -> AppResult<String> {
    for _ in 0..SHARE_ATTEMPTS {
        match set_share_token(db_pool, id, user_id, &new_share_token()).await {
            Ok(Some(token)) => return Ok(token),
            Ok(None) => return Err(AppError::NotFound("Conversation")),
            Err(AppError::Conflict(_)) => {
                warn!(conversation_id = %id, "share token collision, retrying");
            }
            Err(err) => return Err(err),
        }
    }

    Err(anyhow::anyhow!("could not mint a unique share token for {id}").into())
}

pub async fn unshare(db_pool: &SqlitePool, id: Uuid, user_id: Uuid) -> AppResult<()> {
    if !clear_share_token(db_pool, id, user_id).await? {
        return Err(AppError::NotFound("Conversation"));
    }
    Ok(())
}

pub async fn get_shared(db_pool: &SqlitePool, share_token: &str) -> AppResult<SharedConversation> {
    find_shared(db_pool, share_token)
        .await?
        .ok_or(AppError::NotFound("Shared conversation"))
}

#[debug_handler(state = AppState)]
pub(crate) async fn share_conversation(
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let share_token = share(&db_pool, id, user.id).await?;
    info!(conversation_id = %id, user_id = %user.id, "shared conversation");

    Ok(Json(json!({
        "success": true,
        "shareUrl": share_url(&config.client_url, &share_token),
        "shareToken": share_token,
    })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn unshare_conversation(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    unshare(&db_pool, id, user.id).await?;
    info!(conversation_id = %id, user_id = %user.id, "unshared conversation");

    Ok(Json(json!({ "success": true, "message": "Conversation unshared successfully" })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn shared_conversation(
    State(db_pool): State<SqlitePool>,
    Path(share_token): Path<String>,
) -> AppResult<impl IntoResponse> {
    let conversation = get_shared(&db_pool, &share_token).await?;
    Ok(Json(json!({ "success": true, "conversation": conversation })))
}
