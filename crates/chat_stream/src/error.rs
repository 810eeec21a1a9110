use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreamError>;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    #[error("Response has no body")]
    MissingBody,

    #[error("Stream line exceeds {limit} bytes without a newline")]
    LineTooLong { limit: usize },

    #[error("Transport error: {0}")]
    Transport(String),

    /// The server reported a failure through an `error` frame.
    #[error("{0}")]
    Remote(String),

    #[error("Handler error: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Stream cancelled")]
    Cancelled,
}

impl StreamError {
    pub fn handler(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Handler(Box::new(err))
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}
