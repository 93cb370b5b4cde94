//! Application error type mapping to HTTP status codes and the OpenAI error
//! envelope (`{"error": {"message", "type", "code"}}`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use memochat_types::error::{MemoryError, StoreError};
use memochat_types::llm::LlmError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Upstream model failure.
    Llm(LlmError),
    /// Memory load/save or compaction failure.
    Memory(MemoryError),
    /// Malformed request.
    Validation(String),
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::Llm(e)
    }
}

impl From<MemoryError> for AppError {
    fn from(e: MemoryError) -> Self {
        AppError::Memory(e)
    }
}

impl AppError {
    /// Status, OpenAI error `type`, machine-readable `code`, and message.
    fn parts(&self) -> (StatusCode, &'static str, &'static str, String) {
        match self {
            AppError::Llm(e) => llm_parts(e),
            AppError::Memory(MemoryError::Summarize(e)) | AppError::Memory(MemoryError::Reflect(e)) => {
                let (status, kind, code, _) = llm_parts(e);
                (status, kind, code, self.to_string())
            }
            AppError::Memory(MemoryError::Store(StoreError::Malformed(_))) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "memory_corrupt",
                self.to_string(),
            ),
            AppError::Memory(MemoryError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "memory_store_error",
                self.to_string(),
            ),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_request",
                msg.clone(),
            ),
        }
    }

    /// The `{"error": {...}}` body, also used for SSE error frames.
    pub fn body(&self) -> Value {
        let (_, kind, code, message) = self.parts();
        error_body(&message, kind, code)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Llm(e) => write!(f, "{e}"),
            AppError::Memory(e) => write!(f, "{e}"),
            AppError::Validation(msg) => write!(f, "{msg}"),
        }
    }
}

fn llm_parts(e: &LlmError) -> (StatusCode, &'static str, &'static str, String) {
    let (status, kind, code) = match e {
        LlmError::AuthenticationFailed => (
            StatusCode::BAD_GATEWAY,
            "upstream_error",
            "upstream_auth_failed",
        ),
        LlmError::RateLimited { .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limit_error",
            "rate_limited",
        ),
        LlmError::Overloaded(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "upstream_error",
            "upstream_overloaded",
        ),
        LlmError::ContextLengthExceeded => (
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "context_length_exceeded",
        ),
        LlmError::InvalidRequest(_) => (
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            "invalid_request",
        ),
        _ => (StatusCode::BAD_GATEWAY, "upstream_error", "upstream_error"),
    };
    (status, kind, code, e.to_string())
}

/// OpenAI-style error envelope.
pub fn error_body(message: &str, kind: &str, code: &str) -> Value {
    json!({
        "error": {
            "message": message,
            "type": kind,
            "code": code,
        }
    })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, _, code, message) = self.parts();
        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        } else {
            tracing::debug!(code, error = %message, "request rejected");
        }

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            self.body().to_string(),
        )
            .into_response()
    }
}
