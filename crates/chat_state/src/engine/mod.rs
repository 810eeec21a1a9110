//! Generic state machine engine
//!
//! Knows nothing about chat semantics. States and events are caller-defined
//! enums; behaviour is attached through [`StateConfig`] hooks and guarded
//! [`Transition`]s.

mod config;
mod error;
mod history;
mod machine;

pub use config::{Guard, Hook, HookFuture, StateConfig, Transition};
pub use error::{FsmError, HookPhase};
pub use history::{StateChangeEvent, TransitionCause};
pub use machine::{StateMachine, StateMachineBuilder, Unsubscribe, DEFAULT_MAX_HISTORY};

/// Bounds shared by state and event types.
pub trait Tag: Copy + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static {}

impl<T> Tag for T where T: Copy + Eq + std::hash::Hash + std::fmt::Debug + Send + Sync + 'static {}
