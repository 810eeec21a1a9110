//! Response handed to the reader: status line plus an optional byte stream.

use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;

use crate::error::{Result, StreamError};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

pub struct StreamResponse {
    pub status: StatusCode,
    pub reason: String,
    pub body: Option<ByteStream>,
}

impl StreamResponse {
    pub fn new(status: StatusCode, body: Option<ByteStream>) -> Self {
        Self {
            status,
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            body,
        }
    }

    /// Wrap a reqwest response without reading it.
    pub fn from_reqwest(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(StreamError::from));
        Self::new(status, Some(Box::pin(body)))
    }

    /// A 200 response whose body yields `chunks` in order.
    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        let chunks: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
        Self::new(StatusCode::OK, Some(Box::pin(futures::stream::iter(chunks))))
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Check the status and hand out the body.
    pub fn into_body(self) -> Result<ByteStream> {
        if !self.status.is_success() {
            return Err(StreamError::Http {
                status: self.status.as_u16(),
                reason: self.reason,
            });
        }
        self.body.ok_or(StreamError::MissingBody)
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}
