//! Scripted `CompletionService` double for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use memochat_types::conversation::{ChatReply, ChatStreamEvent, ReflectionDraft, Turn};
use memochat_types::llm::{LlmError, MessageRole};

use super::completion::{ChatStream, CompletionService};
use super::reflection::parse_reflection_response;

pub(crate) struct MockCompletion {
    pub chat_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    pub reflect_calls: AtomicUsize,
    pub fail_summarize: AtomicBool,
    pub fail_reflect: AtomicBool,
    pub hang_summarize: AtomicBool,
    /// Number of turns handed to each summarize call.
    pub summarized_batches: Mutex<Vec<usize>>,
    /// Raw reply used for reflections, parsed like a real model reply.
    pub reflection_reply: Mutex<String>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            chat_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            reflect_calls: AtomicUsize::new(0),
            fail_summarize: AtomicBool::new(false),
            fail_reflect: AtomicBool::new(false),
            hang_summarize: AtomicBool::new(false),
            summarized_batches: Mutex::new(Vec::new()),
            reflection_reply: Mutex::new("[重要性:8]\nThe user likes detail.".to_string()),
        }
    }

    pub fn with_reflection_reply(self, reply: &str) -> Self {
        *self.reflection_reply.lock().unwrap() = reply.to_string();
        self
    }

    pub fn summarize_count(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn reflect_count(&self) -> usize {
        self.reflect_calls.load(Ordering::SeqCst)
    }
}

impl CompletionService for MockCompletion {
    async fn chat(&self, turns: &[Turn]) -> Result<ChatReply, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let last = turns.last().map(|t| t.content.as_str()).unwrap_or("");
        Ok(ChatReply {
            message: Turn::new(MessageRole::Assistant, format!("echo: {last}")),
            total_tokens: 10,
        })
    }

    fn stream_chat(&self, turns: Vec<Turn>) -> ChatStream {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        let last = turns.last().map(|t| t.content.clone()).unwrap_or_default();
        Box::pin(async_stream::stream! {
            yield Ok(ChatStreamEvent::Delta("echo: ".to_string()));
            yield Ok(ChatStreamEvent::Delta(last));
            yield Ok(ChatStreamEvent::Finished { total_tokens: 10 });
        })
    }

    async fn summarize(&self, turns: &[Turn]) -> Result<String, LlmError> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_summarize.load(Ordering::SeqCst) {
            futures_util::future::pending::<()>().await;
        }
        if self.fail_summarize.load(Ordering::SeqCst) {
            return Err(LlmError::Provider {
                message: "summarize unavailable".to_string(),
            });
        }
        self.summarized_batches.lock().unwrap().push(turns.len());
        Ok(format!("summary of {} turns", turns.len()))
    }

    async fn generate_reflection(
        &self,
        _turns: &[Turn],
        _summary: &str,
    ) -> Result<ReflectionDraft, LlmError> {
        self.reflect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reflect.load(Ordering::SeqCst) {
            return Err(LlmError::Stream("reflection cut off".to_string()));
        }
        let reply = self.reflection_reply.lock().unwrap().clone();
        Ok(parse_reflection_response(&reply))
    }
}
