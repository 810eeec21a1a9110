use chat_state::FsmError;
use chat_stream::StreamError;
use thiserror::Error;

use crate::registry::RegistryError;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("State machine error: {0}")]
    State(#[from] FsmError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
