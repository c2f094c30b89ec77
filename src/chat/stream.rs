use std::{convert::Infallible, sync::Arc};

use axum::{
    debug_handler,
    extract::State,
    response::{sse::{Event, KeepAlive, Sse}, IntoResponse},
    Json,
};
use futures_util::{stream::once, Stream, StreamExt};
use serde_json::json;
use tracing::{info, warn};

use crate::{auth::CurrentUser, AppResult, AppState};

use super::{prepare, ChatBody, CompletionClient, Deltas};

/// Relays completion deltas as `data: {"content": ...}` events and closes
/// with `data: [DONE]`. A provider failure after the stream has started
/// becomes one `data: {"error": ...}` event ahead of `[DONE]`.
#[debug_handler(state = AppState)]
pub(crate) async fn stream(
    State(completions): State<Arc<dyn CompletionClient>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ChatBody>,
) -> AppResult<impl IntoResponse> {
    let (persona, request) = prepare(body)?;
    info!(user_id = %user.id, personality = persona.id, "chat stream");

    let deltas = completions.stream(request).await?;
    Ok(Sse::new(events(deltas)).keep_alive(KeepAlive::default()))
}

pub(crate) fn events(deltas: Deltas) -> impl Stream<Item = Result<Event, Infallible>> {
    let mut failed = false;
    let content = deltas
        .take_while(move |delta| {
            let keep = !failed;
            failed |= delta.is_err();
            std::future::ready(keep)
        })
        .map(|delta| {
            let data = match delta {
                Ok(content) => json!({ "content": content }),
                Err(err) => {
                    warn!(error = %err, "chat stream failed");
                    json!({ "error": err.to_string() })
                }
            };
            Ok(Event::default().data(data.to_string()))
        });

    content.chain(once(async { Ok(Event::default().data("[DONE]")) }))
}
