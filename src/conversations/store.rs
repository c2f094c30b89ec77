use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Executor};
use uuid::Uuid;

use crate::{db::is_unique_violation, AppError, AppResult};

use super::{Conversation, ConversationSummary, Message, Sender, SharedConversation};

macro_rules! conversation_columns {
    () => {
        "id, user_id, title, personality, is_shared, share_token, shared_at, \
         last_message_at, created_at, updated_at"
    };
}

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    user_id: String,
    title: String,
    personality: String,
    is_shared: bool,
    share_token: Option<String>,
    shared_at: Option<DateTime<Utc>>,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    text: String,
    sender: String,
    timestamp: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SharedRow {
    id: String,
    title: String,
    created_at: DateTime<Utc>,
    shared_by: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = AppError;

    fn try_from(row: MessageRow) -> AppResult<Message> {
        Ok(Message {
            text: row.text,
            sender: row.sender.parse()?,
            timestamp: row.timestamp,
        })
    }
}

impl TryFrom<ConversationRow> for ConversationSummary {
    type Error = AppError;

    fn try_from(row: ConversationRow) -> AppResult<ConversationSummary> {
        Ok(ConversationSummary {
            id: parse_uuid(&row.id)?,
            title: row.title,
            personality: row.personality,
            is_shared: row.is_shared,
            share_token: row.share_token,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl ConversationRow {
    fn with_messages(self, messages: Vec<Message>) -> AppResult<Conversation> {
        Ok(Conversation {
            id: parse_uuid(&self.id)?,
            user_id: parse_uuid(&self.user_id)?,
            title: self.title,
            personality: self.personality,
            messages,
            is_shared: self.is_shared,
            share_token: self.share_token,
            shared_at: self.shared_at,
            last_message_at: self.last_message_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn parse_uuid(id: &str) -> AppResult<Uuid> {
    Ok(Uuid::parse_str(id).map_err(anyhow::Error::from)?)
}

async fn messages<'e, E>(executor: E, conversation_id: &str) -> AppResult<Vec<Message>>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, MessageRow>(
        "SELECT text, sender, timestamp FROM messages WHERE conversation_id = ? ORDER BY seq"
    )
        .bind(conversation_id)
        .fetch_all(executor)
        .await?
        .into_iter()
        .map(Message::try_from)
        .collect()
}

async fn load(db_pool: &SqlitePool, row: Option<ConversationRow>) -> AppResult<Option<Conversation>> {
    let Some(row) = row else {
        return Ok(None);
    };

    let messages = messages(db_pool, &row.id).await?;
    row.with_messages(messages).map(Some)
}

pub async fn create_conversation(
    db_pool: &SqlitePool,
    user_id: Uuid,
    title: &str,
    personality: &str,
) -> AppResult<Conversation> {
    let now = Utc::now();
    let row = sqlx::query_as::<_, ConversationRow>(concat!(
        "INSERT INTO conversations (id, user_id, title, personality, last_message_at, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING ", conversation_columns!()
    ))
        .bind(Uuid::now_v7().to_string())
        .bind(user_id.to_string())
        .bind(title)
        .bind(personality)
        .bind(now)
        .bind(now)
        .bind(now)
        .fetch_one(db_pool)
        .await?;

    row.with_messages(Vec::new())
}

pub async fn find_owned(db_pool: &SqlitePool, id: Uuid, user_id: Uuid) -> AppResult<Option<Conversation>> {
    let row = sqlx::query_as::<_, ConversationRow>(concat!(
        "SELECT ", conversation_columns!(), " FROM conversations WHERE id = ? AND user_id = ?"
    ))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?;
    load(db_pool, row).await
}

pub async fn list_recent(db_pool: &SqlitePool, user_id: Uuid, limit: u32) -> AppResult<Vec<ConversationSummary>> {
    sqlx::query_as::<_, ConversationRow>(concat!(
        "SELECT ", conversation_columns!(), " FROM conversations WHERE user_id = ? \
         ORDER BY updated_at DESC, id DESC LIMIT ?"
    ))
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(db_pool)
        .await?
        .into_iter()
        .map(ConversationSummary::try_from)
        .collect()
}

pub async fn rename_conversation(
    db_pool: &SqlitePool,
    id: Uuid,
    user_id: Uuid,
    title: &str,
) -> AppResult<Option<Conversation>> {
    let row = sqlx::query_as::<_, ConversationRow>(concat!(
        "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ? AND user_id = ? \
         RETURNING ", conversation_columns!()
    ))
        .bind(title)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await?;
    load(db_pool, row).await
}

pub async fn delete_conversation(db_pool: &SqlitePool, id: Uuid, user_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM conversations WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn append_message(
    db_pool: &SqlitePool,
    id: Uuid,
    user_id: Uuid,
    text: &str,
    sender: Sender,
) -> AppResult<Option<Conversation>> {
    let now = Utc::now();
    let mut tx = db_pool.begin().await?;

    let row = sqlx::query_as::<_, ConversationRow>(concat!(
        "UPDATE conversations SET last_message_at = ?, updated_at = ? WHERE id = ? AND user_id = ? \
         RETURNING ", conversation_columns!()
    ))
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    sqlx::query("INSERT INTO messages (conversation_id, text, sender, timestamp) VALUES (?, ?, ?, ?)")
        .bind(&row.id)
        .bind(text)
        .bind(sender.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

    let messages = messages(&mut *tx, &row.id).await?;
    tx.commit().await?;

    row.with_messages(messages).map(Some)
}

/// An existing token wins over `candidate`. A candidate that collides with
/// another conversation's token comes back as `Conflict`.
pub async fn set_share_token(
    db_pool: &SqlitePool,
    id: Uuid,
    user_id: Uuid,
    candidate: &str,
) -> AppResult<Option<String>> {
    let token: Option<(String,)> = sqlx::query_as(
        "UPDATE conversations SET share_token = COALESCE(share_token, ?), is_shared = 1, \
         shared_at = COALESCE(shared_at, ?) WHERE id = ? AND user_id = ? RETURNING share_token"
    )
        .bind(candidate)
        .bind(Utc::now())
        .bind(id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(db_pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                AppError::Conflict("Share token already taken".to_owned())
            } else {
                err.into()
            }
        })?;

    Ok(token.map(|(token,)| token))
}

pub async fn clear_share_token(db_pool: &SqlitePool, id: Uuid, user_id: Uuid) -> AppResult<bool> {
    let result = sqlx::query(
        "UPDATE conversations SET share_token = NULL, is_shared = 0, shared_at = NULL \
         WHERE id = ? AND user_id = ?"
    )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(db_pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn find_shared(db_pool: &SqlitePool, share_token: &str) -> AppResult<Option<SharedConversation>> {
    let row = sqlx::query_as::<_, SharedRow>(
        "SELECT c.id, c.title, c.created_at, u.name AS shared_by \
         FROM conversations c JOIN users u ON u.id = c.user_id \
         WHERE c.share_token = ? AND c.is_shared = 1"
    )
        .bind(share_token)
        .fetch_optional(db_pool)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(SharedConversation {
        messages: messages(db_pool, &row.id).await?,
        title: row.title,
        created_at: row.created_at,
        shared_by: row.shared_by,
    }))
}
