//! chat_state - State machine engine and chat exchange FSM
//!
//! `engine` is a generic async state machine with guarded transitions,
//! entry/exit hooks, bounded history and change subscriptions.
//! `machine` builds the fixed chat vocabulary on top of it.

pub mod engine;
pub mod machine;

// Re-export commonly used types
pub use engine::{
    FsmError, HookPhase, StateChangeEvent, StateConfig, StateMachine, Transition, TransitionCause,
    Unsubscribe,
};
pub use machine::{ChatEvent, ChatState, ChatStateContext, ChatStateMachine, RetryContext};
