use axum::{debug_handler, extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Days, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{auth::CurrentUser, AppResult, AppState};

use super::{list_recent, ConversationSummary};

const LIST_LIMIT: u32 = 50;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedConversations {
    pub today: Vec<ConversationSummary>,
    pub yesterday: Vec<ConversationSummary>,
    pub last_week: Vec<ConversationSummary>,
    pub last_month: Vec<ConversationSummary>,
    pub older: Vec<ConversationSummary>,
}

/// Buckets by `updated_at` against UTC midnight of `now`. Input order is kept
/// within each bucket.
pub fn group_by_recency(conversations: Vec<ConversationSummary>, now: DateTime<Utc>) -> GroupedConversations {
    let today = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
    let days_back = |days| today.checked_sub_days(Days::new(days)).unwrap_or(DateTime::<Utc>::MIN_UTC);

    let yesterday = days_back(1);
    let last_week = days_back(7);
    let last_month = days_back(30);

    let mut grouped = GroupedConversations::default();
    for conversation in conversations {
        let at = conversation.updated_at;
        let bucket = if at >= today {
            &mut grouped.today
        } else if at >= yesterday {
            &mut grouped.yesterday
        } else if at >= last_week {
            &mut grouped.last_week
        } else if at >= last_month {
            &mut grouped.last_month
        } else {
            &mut grouped.older
        };
        bucket.push(conversation);
    }

    grouped
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversations(
    State(db_pool): State<SqlitePool>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl IntoResponse> {
    let recent = list_recent(&db_pool, user.id, LIST_LIMIT).await?;
    Ok(Json(json!({
        "success": true,
        "conversations": group_by_recency(recent, Utc::now()),
    })))
}
