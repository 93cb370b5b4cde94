//! OpenAI-compatible chat completions endpoint.
//!
//! POST /v1/chat/completions
//!
//! With `user` set, the request is routed through that user's context
//! manager: the trailing user message is recorded, the prompt is rebuilt
//! from memory (summary, reflections, recent turns) and the reply is
//! recorded and saved afterwards. A request that ends without a reply leaves
//! the memory as it found it. Without `user` the request messages are
//! forwarded untouched and nothing is remembered.
//!
//! Streaming responses are SSE `chat.completion.chunk` objects: a role
//! chunk, one chunk per content delta, a finish chunk, then `[DONE]`. An
//! upstream failure ends the stream with an `{"error": {...}}` frame and
//! the partial reply is discarded.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use memochat_core::memory::completion::CompletionService;
use memochat_core::memory::registry::ManagerGuard;
use memochat_infra::filesystem::conversation::YamlConversationStore;
use memochat_infra::llm::completion::LlmCompletionService;
use memochat_types::conversation::{ChatStreamEvent, ConversationState, Turn};
use memochat_types::llm::{LlmError, MessageRole};

use crate::http::error::AppError;
use crate::state::AppState;

type Guard = ManagerGuard<LlmCompletionService, YamlConversationStore>;

/// A message as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Request body, a subset of the OpenAI schema.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    /// Enables memory for this user when present and non-empty.
    #[serde(default)]
    pub user: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: UsageBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageBody {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl UsageBody {
    /// The upstream only reports a total; it is split evenly.
    fn from_total(total: u32) -> Self {
        Self {
            prompt_tokens: total / 2,
            completion_tokens: total / 2,
            total_tokens: total,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Identity shared by every chunk of one streamed completion.
struct ChunkHeader {
    id: String,
    created: i64,
    model: String,
}

impl ChunkHeader {
    fn new(model: String) -> Self {
        Self {
            id: completion_id(),
            created: chrono::Utc::now().timestamp(),
            model,
        }
    }

    fn chunk(&self, delta: Delta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    fn event(&self, delta: Delta, finish_reason: Option<&str>) -> Event {
        let data = serde_json::to_string(&self.chunk(delta, finish_reason)).unwrap_or_default();
        Event::default().data(data)
    }
}

fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::now_v7().simple())
}

/// A locked manager holding a freshly recorded user turn while the reply is
/// outstanding.
///
/// Unless [`commit`](Self::commit) is reached, dropping it puts the memory
/// back as it was before the request. An upstream error, a stream cut short
/// or a client hanging up therefore leaves no half-finished exchange, and a
/// retry does not record the same message twice.
struct PendingExchange {
    manager: Guard,
    before: Option<ConversationState>,
}

impl PendingExchange {
    /// Record `last` when it is a user message.
    async fn begin(mut manager: Guard, last: Option<&ChatMessage>) -> Self {
        let before = manager.state().clone();
        if let Some(last) = last.filter(|m| m.role == MessageRole::User) {
            // The turn is kept even if compaction fails; the reply can still
            // be produced from the uncompacted history.
            if let Err(e) = manager.record_turn(MessageRole::User, last.content.clone()).await {
                warn!(user_id = %manager.user_id(), error = %e, "compaction failed while recording user turn");
            }
        }
        Self {
            manager,
            before: Some(before),
        }
    }

    fn prompt(&self) -> Vec<Turn> {
        self.manager.build_prompt_context()
    }

    /// Record the assistant reply and persist. Failures are logged only; the
    /// client already has (or is about to get) its answer.
    async fn commit(mut self, content: String) {
        self.before = None;
        let manager = &mut self.manager;
        if let Err(e) = manager.record_turn(MessageRole::Assistant, content).await {
            warn!(user_id = %manager.user_id(), error = %e, "compaction failed while recording reply");
        }
        if let Err(e) = manager.save().await {
            warn!(user_id = %manager.user_id(), error = %e, "failed to save memory");
        }
    }
}

impl Drop for PendingExchange {
    fn drop(&mut self) {
        if let Some(before) = self.before.take() {
            debug!(user_id = %self.manager.user_id(), "no reply recorded; restoring memory");
            self.manager.restore(before);
        }
    }
}

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    if request.messages.is_empty() {
        return Err(AppError::Validation("messages must not be empty".to_string()));
    }

    let model = request
        .model
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.model().to_string());

    let pending = match request.user.as_deref().filter(|u| !u.is_empty()) {
        Some(user) => {
            let manager = state.registry.acquire(user).await?;
            Some(PendingExchange::begin(manager, request.messages.last()).await)
        }
        None => None,
    };

    let prompt = match &pending {
        Some(exchange) => exchange.prompt(),
        None => request
            .messages
            .iter()
            .map(|m| Turn::new(m.role, m.content.clone()))
            .collect(),
    };

    debug!(
        model = %model,
        stream = request.stream,
        prompt_messages = prompt.len(),
        with_memory = pending.is_some(),
        "chat completion request"
    );

    if request.stream {
        return Ok(stream_response(state.completion.clone(), model, prompt, pending).into_response());
    }

    let reply = state.completion.chat(&prompt).await?;
    let content = reply.message.content;
    if let Some(exchange) = pending {
        exchange.commit(content.clone()).await;
    }

    let response = ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model,
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: MessageRole::Assistant,
                content,
            },
            finish_reason: "stop".to_string(),
        }],
        usage: UsageBody::from_total(reply.total_tokens),
    };
    Ok(Json(response).into_response())
}

/// Relay the upstream stream as OpenAI chunks.
///
/// The pending exchange travels with the stream so the user stays locked
/// until the reply is recorded. Recording runs on its own task once the
/// upstream finishes, so a client hanging up after `[DONE]` cannot cut it
/// short; hanging up earlier drops the exchange and undoes the user turn.
fn stream_response(
    completion: Arc<LlmCompletionService>,
    model: String,
    prompt: Vec<Turn>,
    pending: Option<PendingExchange>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let header = ChunkHeader::new(model);
    let mut upstream = completion.stream_chat(prompt);

    let sse = async_stream::stream! {
        let role = Delta { role: Some(MessageRole::Assistant), content: None };
        yield Ok::<_, Infallible>(header.event(role, None));

        let mut full_response = String::new();
        let mut outcome: Result<u32, LlmError> =
            Err(LlmError::Stream("upstream ended before completion".to_string()));

        while let Some(item) = upstream.next().await {
            match item {
                Ok(ChatStreamEvent::Delta(text)) => {
                    full_response.push_str(&text);
                    let delta = Delta { role: None, content: Some(text) };
                    yield Ok(header.event(delta, None));
                }
                Ok(ChatStreamEvent::Finished { total_tokens }) => {
                    outcome = Ok(total_tokens);
                    break;
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        match outcome {
            Ok(total_tokens) => {
                debug!(total_tokens, chars = full_response.len(), "stream finished");
                if let Some(exchange) = pending {
                    tokio::spawn(exchange.commit(full_response));
                }
                yield Ok(header.event(Delta::default(), Some("stop")));
                yield Ok(Event::default().data("[DONE]"));
            }
            Err(e) => {
                warn!(error = %e, "upstream stream failed; reply not recorded");
                drop(pending);
                yield Ok(Event::default().data(AppError::from(e).body().to_string()));
            }
        }
    };

    Sse::new(sse).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
