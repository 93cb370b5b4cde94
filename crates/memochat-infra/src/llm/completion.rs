//! LLM-backed implementation of [`CompletionService`].
//!
//! `LlmCompletionService` turns conversation turns into provider requests:
//! plain and streaming chat, the summarization prompt, and the reflection
//! prompt whose reply is parsed for an importance marker.

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::info_span;

use memochat_core::llm::box_provider::BoxLlmProvider;
use memochat_core::memory::completion::{ChatStream, CompletionService};
use memochat_core::memory::reflection::parse_reflection_response;
use memochat_types::conversation::{ChatReply, ChatStreamEvent, ReflectionDraft, Turn};
use memochat_types::llm::{CompletionRequest, LlmError, Message, MessageRole, StreamEvent};

use super::span_stream::StreamInSpan;

/// System instruction for summarization calls.
pub(crate) const SUMMARY_SYSTEM_PROMPT: &str = "请总结以下对话的关键信息，生成一个简洁的摘要。\
摘要应保留重要的背景信息、用户偏好和关键决策。";

/// Closing request appended after the turns being summarized.
pub(crate) const SUMMARY_REQUEST: &str = "请提供上述对话的摘要。";

/// System instruction for reflection calls.
pub(crate) const REFLECTION_SYSTEM_PROMPT: &str = r#"你是一个善于观察和反思的AI助手。请基于以下对话生成一段深入的反思，包括：
1. 对话中的关键主题和模式
2. 用户的隐含需求和偏好
3. 对话中的重要洞察
4. 对未来对话的建议

同时评估这段反思的重要性（1-10分）。"#;

/// Label for the running summary handed to reflection calls.
pub(crate) const REFLECTION_SUMMARY_LABEL: &str = "之前的对话摘要：";

/// Closing request asking for the importance marker on the first line.
pub(crate) const REFLECTION_REQUEST: &str =
    "请基于上述对话生成反思，并在第一行用格式 [重要性:X] 标注重要性分数（1-10）。";

/// Completion service that talks to a single LLM provider and model.
pub struct LlmCompletionService {
    provider: Arc<BoxLlmProvider>,
    model: String,
    max_tokens: u32,
}

impl LlmCompletionService {
    pub fn new(provider: BoxLlmProvider, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider: Arc::new(provider),
            model: model.into(),
            max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn request(&self, messages: Vec<Message>, stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    /// Run a non-streaming request and return the trimmed reply text.
    async fn complete_text(&self, messages: Vec<Message>) -> Result<String, LlmError> {
        let response = self.provider.complete(&self.request(messages, false)).await?;
        Ok(response.content.trim().to_string())
    }
}

fn to_messages(turns: &[Turn]) -> Vec<Message> {
    turns.iter().map(Turn::to_message).collect()
}

fn text(role: MessageRole, content: impl Into<String>) -> Message {
    Message {
        role,
        content: content.into(),
    }
}

/// Messages for a summarization call: instruction, turns, closing request.
pub(crate) fn summary_messages(turns: &[Turn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() + 2);
    messages.push(text(MessageRole::System, SUMMARY_SYSTEM_PROMPT));
    messages.extend(to_messages(turns));
    messages.push(text(MessageRole::User, SUMMARY_REQUEST));
    messages
}

/// Messages for a reflection call: instruction, optional prior summary,
/// turns, closing request.
pub(crate) fn reflection_messages(turns: &[Turn], summary: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() + 3);
    messages.push(text(MessageRole::System, REFLECTION_SYSTEM_PROMPT));
    if !summary.is_empty() {
        messages.push(text(
            MessageRole::User,
            format!("{REFLECTION_SUMMARY_LABEL}{summary}"),
        ));
    }
    messages.extend(to_messages(turns));
    messages.push(text(MessageRole::User, REFLECTION_REQUEST));
    messages
}

impl CompletionService for LlmCompletionService {
    #[tracing::instrument(
        name = "chat",
        skip(self, turns),
        fields(model = %self.model, message_count = turns.len())
    )]
    async fn chat(&self, turns: &[Turn]) -> Result<ChatReply, LlmError> {
        let response = self
            .provider
            .complete(&self.request(to_messages(turns), false))
            .await?;
        Ok(ChatReply {
            message: Turn::assistant(response.content),
            total_tokens: response.usage.total(),
        })
    }

    fn stream_chat(&self, turns: Vec<Turn>) -> ChatStream {
        let span = info_span!(
            "stream_chat",
            provider = self.provider.name(),
            model = %self.model,
            message_count = turns.len(),
        );
        let provider = self.provider.clone();
        let request = self.request(to_messages(&turns), true);

        let stream = async_stream::try_stream! {
            let mut events = provider.stream(request);
            let mut total_tokens = 0u32;
            while let Some(event) = events.next().await {
                match event? {
                    StreamEvent::TextDelta { text } => {
                        yield ChatStreamEvent::Delta(text);
                    }
                    StreamEvent::Usage(usage) => {
                        total_tokens = usage.total();
                    }
                    StreamEvent::Done => {
                        yield ChatStreamEvent::Finished { total_tokens };
                        break;
                    }
                    StreamEvent::Connected | StreamEvent::MessageDelta { .. } => {}
                }
            }
        };

        Box::pin(StreamInSpan::new(stream, span))
    }

    #[tracing::instrument(
        name = "summarize_context",
        skip(self, turns),
        fields(model = %self.model, message_count = turns.len())
    )]
    async fn summarize(&self, turns: &[Turn]) -> Result<String, LlmError> {
        let summary = self.complete_text(summary_messages(turns)).await?;
        if summary.is_empty() {
            return Err(LlmError::EmptyResponse("summary was empty".to_string()));
        }
        Ok(summary)
    }

    #[tracing::instrument(
        name = "generate_reflection",
        skip(self, turns, summary),
        fields(model = %self.model, message_count = turns.len(), has_summary = !summary.is_empty())
    )]
    async fn generate_reflection(
        &self,
        turns: &[Turn],
        summary: &str,
    ) -> Result<ReflectionDraft, LlmError> {
        let raw = self.complete_text(reflection_messages(turns, summary)).await?;
        let draft = parse_reflection_response(&raw);
        if draft.importance.is_none() {
            tracing::warn!(
                content_preview = %raw.chars().take(80).collect::<String>(),
                "reflection reply had no importance marker; using default"
            );
        }
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use futures_util::Stream;
    use memochat_core::llm::provider::LlmProvider;
    use memochat_types::llm::{CompletionResponse, StopReason, Usage};

    /// Replies with a canned string and records every request it receives.
    struct CannedProvider {
        reply: String,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
        truncate_stream: bool,
    }

    impl LlmProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        fn complete(
            &self,
            request: &CompletionRequest,
        ) -> impl Future<Output = Result<CompletionResponse, LlmError>> + Send {
            self.requests.lock().unwrap().push(request.clone());
            let reply = self.reply.clone();
            async move {
                Ok(CompletionResponse {
                    id: "resp-1".to_string(),
                    content: reply,
                    model: "canned-model".to_string(),
                    stop_reason: StopReason::EndTurn,
                    usage: Usage {
                        input_tokens: 30,
                        output_tokens: 12,
                    },
                })
            }
        }

        fn stream(
            &self,
            request: CompletionRequest,
        ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
            self.requests.lock().unwrap().push(request);
            let mut events = vec![
                Ok(StreamEvent::Connected),
                Ok(StreamEvent::TextDelta {
                    text: "Hel".to_string(),
                }),
                Ok(StreamEvent::TextDelta {
                    text: "lo".to_string(),
                }),
            ];
            if !self.truncate_stream {
                events.push(Ok(StreamEvent::MessageDelta {
                    stop_reason: StopReason::EndTurn,
                }));
                events.push(Ok(StreamEvent::Usage(Usage {
                    input_tokens: 7,
                    output_tokens: 2,
                })));
                events.push(Ok(StreamEvent::Done));
            }
            Box::pin(futures_util::stream::iter(events))
        }
    }

    fn service(
        reply: &str,
        truncate_stream: bool,
    ) -> (LlmCompletionService, Arc<Mutex<Vec<CompletionRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let provider = CannedProvider {
            reply: reply.to_string(),
            requests: requests.clone(),
            truncate_stream,
        };
        (
            LlmCompletionService::new(BoxLlmProvider::new(provider), "gpt-3.5-turbo", 4096),
            requests,
        )
    }

    fn turns() -> Vec<Turn> {
        vec![Turn::user("I love hiking"), Turn::assistant("Where do you hike?")]
    }

    #[tokio::test]
    async fn test_chat_returns_assistant_turn() {
        let (svc, requests) = service("Try the Alps.", false);
        let reply = svc.chat(&turns()).await.unwrap();
        assert_eq!(reply.message.role, MessageRole::Assistant);
        assert_eq!(reply.message.content, "Try the Alps.");
        assert_eq!(reply.total_tokens, 42);

        let sent = &requests.lock().unwrap()[0];
        assert_eq!(sent.model, "gpt-3.5-turbo");
        assert_eq!(sent.max_tokens, 4096);
        assert_eq!(sent.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_chat_deltas_then_finished() {
        let (svc, _) = service("", false);
        let events: Vec<ChatStreamEvent> = svc
            .stream_chat(turns())
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                ChatStreamEvent::Delta("Hel".to_string()),
                ChatStreamEvent::Delta("lo".to_string()),
                ChatStreamEvent::Finished { total_tokens: 9 },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_chat_truncated_has_no_finish() {
        let (svc, _) = service("", true);
        let events: Vec<ChatStreamEvent> = svc
            .stream_chat(turns())
            .map(|e| e.unwrap())
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ChatStreamEvent::Finished { .. }))
        );
    }

    #[tokio::test]
    async fn test_summarize_frames_turns() {
        let (svc, requests) = service("  The user likes hiking.  ", false);
        let summary = svc.summarize(&turns()).await.unwrap();
        assert_eq!(summary, "The user likes hiking.");

        let sent = &requests.lock().unwrap()[0];
        assert_eq!(sent.messages.len(), 4);
        assert_eq!(sent.messages[0].role, MessageRole::System);
        assert_eq!(sent.messages[0].content, SUMMARY_SYSTEM_PROMPT);
        assert_eq!(sent.messages[1].content, "I love hiking");
        assert_eq!(sent.messages[3].role, MessageRole::User);
        assert_eq!(sent.messages[3].content, SUMMARY_REQUEST);
    }

    #[tokio::test]
    async fn test_summarize_empty_reply_is_error() {
        let (svc, _) = service("   ", false);
        let err = svc.summarize(&turns()).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_reflection_with_summary_and_marker() {
        let (svc, requests) = service("[重要性:9]\nThe user is an outdoors person.", false);
        let draft = svc
            .generate_reflection(&turns(), "Earlier: talked about gear.")
            .await
            .unwrap();
        assert_eq!(draft.importance, Some(9));
        assert_eq!(draft.content, "The user is an outdoors person.");

        let sent = &requests.lock().unwrap()[0];
        assert_eq!(sent.messages.len(), 5);
        assert_eq!(
            sent.messages[1].content,
            format!("{REFLECTION_SUMMARY_LABEL}Earlier: talked about gear.")
        );
        assert_eq!(sent.messages[4].content, REFLECTION_REQUEST);
    }

    #[tokio::test]
    async fn test_reflection_without_summary_or_marker() {
        let (svc, requests) = service("Plain observation.", false);
        let draft = svc.generate_reflection(&turns(), "").await.unwrap();
        assert_eq!(draft.importance, None);
        assert_eq!(draft.content, "Plain observation.");
        assert_eq!(requests.lock().unwrap()[0].messages.len(), 4);
    }
}
