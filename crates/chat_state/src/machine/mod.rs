//! Chat state machine module
//!
//! Contains the FSM governing the lifecycle of a single chat exchange.

mod chat;
mod context;
mod events;
mod states;
mod transitions;

pub use chat::ChatStateMachine;
pub use context::{ChatStateContext, RetryContext};
pub use events::ChatEvent;
pub use states::ChatState;
