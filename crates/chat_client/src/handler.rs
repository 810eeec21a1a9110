use async_trait::async_trait;
use chat_core::Citation;
use chat_stream::{StreamError, StreamHandler};
use uuid::Uuid;

use crate::coordinator::ChatCoordinator;

/// Feeds the frames of one streamed answer into the coordinator.
pub(crate) struct ExchangeHandler<'a> {
    coordinator: &'a ChatCoordinator,
    placeholder: Uuid,
    completed: bool,
}

impl<'a> ExchangeHandler<'a> {
    pub(crate) fn new(coordinator: &'a ChatCoordinator, placeholder: Uuid) -> Self {
        Self {
            coordinator,
            placeholder,
            completed: false,
        }
    }

    pub(crate) fn completed(&self) -> bool {
        self.completed
    }
}

#[async_trait]
impl<'a> StreamHandler<Citation> for ExchangeHandler<'a> {
    async fn on_content(&mut self, content: String) -> chat_stream::Result<()> {
        self.coordinator
            .update_message(self.placeholder, |message| message.content.push_str(&content));
        self.coordinator.emit_content(&content);
        self.coordinator
            .machine()
            .stream_chunk()
            .await
            .map_err(StreamError::handler)?;
        Ok(())
    }

    async fn on_side_data(&mut self, items: Vec<Citation>) -> chat_stream::Result<()> {
        log::debug!("Received {} citations", items.len());
        self.coordinator
            .update_message(self.placeholder, |message| message.citations.extend(items));
        Ok(())
    }

    async fn on_complete(&mut self) -> chat_stream::Result<()> {
        self.completed = true;
        self.coordinator
            .complete()
            .await
            .map_err(StreamError::handler)
    }

    async fn on_error(&mut self, message: String) -> chat_stream::Result<()> {
        Err(StreamError::Remote(message))
    }
}
