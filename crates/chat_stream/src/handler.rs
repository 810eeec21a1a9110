use async_trait::async_trait;

use crate::error::Result;

/// Callbacks for the events of one response stream.
///
/// Every method defaults to a no-op. Returning an error stops the read;
/// the error is handed back from [`read_stream`](crate::read_stream).
#[async_trait]
pub trait StreamHandler<T: Send + 'static>: Send {
    async fn on_content(&mut self, _content: String) -> Result<()> {
        Ok(())
    }

    async fn on_side_data(&mut self, _items: Vec<T>) -> Result<()> {
        Ok(())
    }

    async fn on_complete(&mut self) -> Result<()> {
        Ok(())
    }

    async fn on_error(&mut self, _message: String) -> Result<()> {
        Ok(())
    }
}
