//! State transitions - the chat transition table
//!
//! Entry hooks keep the cancellation token in step with the state: states
//! that issue a request get a fresh token, returning to idle revokes it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::{FsmError, StateConfig, StateMachine, Transition};

use super::context::ChatStateContext;
use super::events::ChatEvent;
use super::states::ChatState;

pub(crate) type SharedContext = Arc<Mutex<ChatStateContext>>;
pub(crate) type PendingError = Arc<Mutex<Option<String>>>;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn issue_token_on_enter(
    context: &SharedContext,
    clear_error: bool,
) -> StateConfig<ChatState, ChatEvent> {
    let context = Arc::clone(context);
    StateConfig::new().on_enter(move || {
        let context = Arc::clone(&context);
        async move {
            let mut context = lock(&context);
            if clear_error {
                context.error = None;
            }
            context.issue_token();
            Ok(())
        }
    })
}

pub(crate) fn build_chat_machine(
    context: &SharedContext,
    pending_error: &PendingError,
    max_history: usize,
) -> Result<StateMachine<ChatState, ChatEvent>, FsmError> {
    let idle_context = Arc::clone(context);
    let idle = StateConfig::new()
        .on_enter(move || {
            let context = Arc::clone(&idle_context);
            async move {
                lock(&context).revoke_token();
                Ok(())
            }
        })
        .on(ChatEvent::Send, Transition::to(ChatState::Sending));

    let sending = issue_token_on_enter(context, true)
        .on(ChatEvent::ReceiveStart, Transition::to(ChatState::Receiving))
        .on(ChatEvent::Error, Transition::to(ChatState::Error))
        .on(ChatEvent::Cancel, Transition::to(ChatState::Idle));

    let receiving = StateConfig::new()
        .on(ChatEvent::StreamChunk, Transition::to(ChatState::Streaming))
        .on(ChatEvent::StreamEnd, Transition::to(ChatState::Success))
        .on(ChatEvent::Success, Transition::to(ChatState::Success))
        .on(ChatEvent::Error, Transition::to(ChatState::Error))
        .on(ChatEvent::Cancel, Transition::to(ChatState::Idle));

    let streaming = StateConfig::new()
        .on(ChatEvent::StreamChunk, Transition::to(ChatState::Streaming))
        .on(ChatEvent::StreamEnd, Transition::to(ChatState::Success))
        .on(ChatEvent::Success, Transition::to(ChatState::Success))
        .on(ChatEvent::Error, Transition::to(ChatState::Error))
        .on(ChatEvent::Cancel, Transition::to(ChatState::Idle));

    let success = StateConfig::new()
        .on(ChatEvent::Send, Transition::to(ChatState::Sending))
        .on(ChatEvent::Reset, Transition::to(ChatState::Idle));

    let error_context = Arc::clone(context);
    let error_pending = Arc::clone(pending_error);
    let guard_context = Arc::clone(context);
    let retry_context = Arc::clone(context);
    let error = StateConfig::new()
        .on_enter(move || {
            let context = Arc::clone(&error_context);
            let pending = Arc::clone(&error_pending);
            async move {
                if let Some(message) = lock(&pending).take() {
                    lock(&context).error = Some(message);
                }
                Ok(())
            }
        })
        .on(
            ChatEvent::Retry,
            Transition::to(ChatState::Retrying)
                .guard(move || {
                    let context = lock(&guard_context);
                    context.retry_count < context.max_retries
                })
                .action(move || {
                    let context = Arc::clone(&retry_context);
                    async move {
                        lock(&context).retry_count += 1;
                        Ok(())
                    }
                }),
        )
        .on(ChatEvent::Reset, Transition::to(ChatState::Idle));

    let retrying = issue_token_on_enter(context, false)
        .on(ChatEvent::ReceiveStart, Transition::to(ChatState::Receiving))
        .on(ChatEvent::Error, Transition::to(ChatState::Error))
        .on(ChatEvent::Cancel, Transition::to(ChatState::Idle));

    StateMachine::builder(ChatState::Idle)
        .state(ChatState::Idle, idle)
        .state(ChatState::Sending, sending)
        .state(ChatState::Receiving, receiving)
        .state(ChatState::Streaming, streaming)
        .state(ChatState::Success, success)
        .state(ChatState::Error, error)
        .state(ChatState::Retrying, retrying)
        .max_history(max_history)
        .build()
}
