//! chat_client - Transports and the exchange coordinator
//!
//! [`ChatCoordinator`] runs one chat exchange at a time: it moves the chat
//! state machine, calls a [`ChatTransport`] and feeds the streamed frames
//! back into both the state machine and the message list.

pub mod coordinator;
pub mod error;
mod handler;
pub mod http;
pub mod registry;
pub mod transport;

pub use coordinator::{ChatCoordinator, ContentListener, CoordinatorOptions, ExchangeOutcome};
pub use error::{ClientError, Result};
pub use http::HttpTransport;
pub use registry::{RegistryError, TransportRegistry};
pub use transport::{ChatRequest, ChatResponse, ChatTransport, SharedTransport, WireMessage};
