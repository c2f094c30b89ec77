use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{config::LlmConfig, AppError, AppResult};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 1024;
const TOP_P: f32 = 0.9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(alias = "sender")]
    pub role: String,
    #[serde(alias = "text")]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> ChatMessage {
        ChatMessage { role: role.to_owned(), content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: &'static str,
    pub messages: Vec<ChatMessage>,
}

pub type Deltas = BoxStream<'static, AppResult<String>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> AppResult<String>;

    /// Content deltas in arrival order. Empty deltas are skipped.
    async fn stream(&self, request: CompletionRequest) -> AppResult<Deltas>;
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    message: Option<WireContent>,
    #[serde(default)]
    delta: Option<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    #[serde(default)]
    content: Option<String>,
}

pub struct HttpCompletionClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl HttpCompletionClient {
    pub fn new(http: reqwest::Client, config: &LlmConfig) -> HttpCompletionClient {
        HttpCompletionClient {
            http,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        }
    }

    async fn send(&self, request: &CompletionRequest, stream: bool) -> AppResult<reqwest::Response> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::Upstream("Server is not configured with an LLM API key".to_owned()));
        };

        debug!(model = request.model, messages = request.messages.len(), stream, "completion request");

        let response = self.http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&WireRequest {
                model: request.model,
                messages: &request.messages,
                temperature: TEMPERATURE,
                max_tokens: MAX_TOKENS,
                top_p: TOP_P,
                stream,
            })
            .send()
            .await
            .map_err(|err| {
                error!(error = %err, "completion provider unreachable");
                generation_failed()
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "completion provider returned an error");
            return Err(generation_failed());
        }

        Ok(response)
    }
}

fn generation_failed() -> AppError {
    AppError::Upstream("Failed to generate response. Please try again.".to_owned())
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> AppResult<String> {
        let response: WireResponse = self.send(&request, false)
            .await?
            .json()
            .await
            .map_err(|err| {
                error!(error = %err, "malformed completion response");
                generation_failed()
            })?;

        response.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(generation_failed)
    }

    async fn stream(&self, request: CompletionRequest) -> AppResult<Deltas> {
        let response = self.send(&request, true).await?;

        let deltas = async_stream::stream! {
            let mut bytes = response.bytes_stream();
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        error!(error = %err, "completion stream broke off");
                        yield Err(generation_failed());
                        return;
                    }
                };

                for data in decoder.push(&chunk) {
                    match data {
                        SseData::Done => return,
                        SseData::Json(json) => match delta_content(&json) {
                            Ok(Some(content)) => yield Ok(content),
                            Ok(None) => {}
                            Err(err) => {
                                error!(error = %err, "malformed completion chunk");
                                yield Err(generation_failed());
                                return;
                            }
                        },
                    }
                }
            }
        };

        Ok(deltas.boxed())
    }
}

fn delta_content(json: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: WireResponse = serde_json::from_str(json)?;
    Ok(chunk.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseData {
    Json(String),
    Done,
}

/// Splits a server-sent event byte stream into `data:` payloads. Bytes are
/// buffered until a full line arrives, so multi-byte characters split across
/// chunks survive.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim_start();
            if data == "[DONE]" {
                out.push(SseData::Done);
            } else if !data.is_empty() {
                out.push(SseData::Json(data.to_owned()));
            }
        }
        out
    }
}
