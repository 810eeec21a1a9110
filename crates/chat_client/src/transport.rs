use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{ChatMessage, Citation, Role};
use chat_stream::StreamResponse;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A prior turn sent along with the new message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<WireMessage>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: None,
            history: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_history(mut self, history: Vec<WireMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Body of a non-streaming answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default, alias = "answer")]
    pub content: String,
    #[serde(default, alias = "sideData", alias = "side_data")]
    pub citations: Vec<Citation>,
}

/// Network side of a chat exchange.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Open the streaming endpoint. The status is checked by the reader,
    /// not here.
    async fn open_stream(&self, request: &ChatRequest) -> Result<StreamResponse>;
}

pub type SharedTransport = Arc<dyn ChatTransport>;
