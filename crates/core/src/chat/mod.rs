mod huggingface;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use huggingface::HfChatClient;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// An ordered conversation plus sampling parameters.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(thiserror::Error, Debug)]
pub enum ChatError {
    #[error("chat request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("http error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("chat service returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Free-form text completion; callers parse the reply themselves.
pub trait ChatService: Send + Sync {
    fn complete(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ChatError>>;
}

impl<T: ChatService + ?Sized> ChatService for Arc<T> {
    fn complete(&self, request: ChatRequest) -> BoxFuture<'_, Result<String, ChatError>> {
        (**self).complete(request)
    }
}
