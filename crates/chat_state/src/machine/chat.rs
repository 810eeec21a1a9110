//! ChatStateMachine - the chat exchange FSM
//!
//! Thin wrappers over the engine with the retry, cancellation and error
//! bookkeeping the chat lifecycle needs.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::engine::{FsmError, StateChangeEvent, StateMachine, Unsubscribe, DEFAULT_MAX_HISTORY};

use super::context::{ChatStateContext, RetryContext, DEFAULT_MAX_RETRIES};
use super::events::ChatEvent;
use super::states::ChatState;
use super::transitions::{build_chat_machine, lock, PendingError, SharedContext};

pub struct ChatStateMachine {
    machine: StateMachine<ChatState, ChatEvent>,
    context: SharedContext,
    pending_error: PendingError,
    max_retries: u32,
}

impl ChatStateMachine {
    /// Create a machine in `idle` with 3 retries and 50 history entries.
    pub fn new() -> Result<Self, FsmError> {
        Self::with_limits(DEFAULT_MAX_RETRIES, DEFAULT_MAX_HISTORY)
    }

    pub fn with_limits(max_retries: u32, max_history: usize) -> Result<Self, FsmError> {
        let context: SharedContext = Arc::new(Mutex::new(ChatStateContext::new(max_retries)));
        let pending_error: PendingError = Arc::new(Mutex::new(None));
        let machine = build_chat_machine(&context, &pending_error, max_history)?;

        Ok(Self {
            machine,
            context,
            pending_error,
            max_retries,
        })
    }

    pub async fn send(&self) -> Result<bool, FsmError> {
        self.machine.transition(ChatEvent::Send).await
    }

    pub async fn receive_start(&self) -> Result<bool, FsmError> {
        self.machine.transition(ChatEvent::ReceiveStart).await
    }

    pub async fn stream_chunk(&self) -> Result<bool, FsmError> {
        self.machine.transition(ChatEvent::StreamChunk).await
    }

    pub async fn stream_end(&self) -> Result<bool, FsmError> {
        self.machine.transition(ChatEvent::StreamEnd).await
    }

    /// Forgives earlier retries, then completes the exchange.
    pub async fn success(&self) -> Result<bool, FsmError> {
        lock(&self.context).retry_count = 0;
        self.machine.transition(ChatEvent::Success).await
    }

    /// Fail the exchange; `message` is kept in the context once `error` is entered.
    pub async fn error(&self, message: impl Into<String>) -> Result<bool, FsmError> {
        *lock(&self.pending_error) = Some(message.into());
        let result = self.machine.transition(ChatEvent::Error).await;
        // Not entered: the message must not leak into a later error.
        lock(&self.pending_error).take();
        result
    }

    /// Try the failed exchange again.
    ///
    /// Once `max_retries` retries have been spent this routes through the
    /// `error` event instead, which is rejected from `error` itself.
    pub async fn retry(&self) -> Result<bool, FsmError> {
        let (retry_count, max_retries) = {
            let context = lock(&self.context);
            (context.retry_count, context.max_retries)
        };

        if retry_count >= max_retries {
            log::warn!("Retry limit reached ({retry_count}/{max_retries})");
            return self
                .error(format!("Maximum retries ({max_retries}) exceeded"))
                .await;
        }

        self.machine.transition(ChatEvent::Retry).await
    }

    /// Signal the in-flight operation to stop, then return to `idle`.
    pub async fn cancel(&self) -> Result<bool, FsmError> {
        let token = lock(&self.context).cancel_token.clone();
        if let Some(token) = token {
            token.cancel();
        }
        self.machine.transition(ChatEvent::Cancel).await
    }

    /// Clear the context and return to `idle`.
    ///
    /// Takes the `reset` transition from `success`/`error`; from any other
    /// state the engine's unconditional reset is used.
    pub async fn reset(&self) -> Result<bool, FsmError> {
        {
            let mut context = lock(&self.context);
            context.error = None;
            context.retry_count = 0;
            context.max_retries = self.max_retries;
        }
        lock(&self.pending_error).take();

        if self.machine.can(ChatEvent::Reset) {
            return self.machine.transition(ChatEvent::Reset).await;
        }
        if self.machine.state() != ChatState::Idle {
            self.machine.reset(ChatState::Idle).await?;
        }
        Ok(true)
    }

    pub fn state(&self) -> ChatState {
        self.machine.state()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == ChatState::Streaming
    }

    pub fn has_error(&self) -> bool {
        self.state() == ChatState::Error
    }

    pub fn is_idle(&self) -> bool {
        self.state() == ChatState::Idle
    }

    pub fn can(&self, event: ChatEvent) -> bool {
        self.machine.can(event)
    }

    pub fn available_events(&self) -> Vec<ChatEvent> {
        self.machine.available_events()
    }

    pub fn context(&self) -> ChatStateContext {
        lock(&self.context).clone()
    }

    pub fn retry_context(&self) -> RetryContext {
        RetryContext::from(&*lock(&self.context))
    }

    /// Token of the current network operation, if one was issued.
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        lock(&self.context).cancel_token.clone()
    }

    pub fn history(&self) -> Vec<StateChangeEvent<ChatState, ChatEvent>> {
        self.machine.history()
    }

    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&StateChangeEvent<ChatState, ChatEvent>) + Send + Sync + 'static,
    {
        self.machine.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::engine::TransitionCause;

    async fn machine_in_error(max_retries: u32) -> ChatStateMachine {
        let machine = ChatStateMachine::with_limits(max_retries, 50).unwrap();
        assert!(machine.send().await.unwrap());
        assert!(machine.error("boom").await.unwrap());
        machine
    }

    #[tokio::test]
    async fn test_basic_flow() {
        let machine = ChatStateMachine::new().unwrap();
        assert_eq!(machine.state(), ChatState::Idle);
        assert!(machine.cancellation_token().is_none());

        assert!(machine.send().await.unwrap());
        assert_eq!(machine.state(), ChatState::Sending);
        assert!(machine.cancellation_token().is_some());

        assert!(machine.receive_start().await.unwrap());
        assert_eq!(machine.state(), ChatState::Receiving);

        assert!(machine.stream_chunk().await.unwrap());
        assert_eq!(machine.state(), ChatState::Streaming);
        assert!(machine.is_streaming());

        assert!(machine.stream_chunk().await.unwrap());
        assert_eq!(machine.state(), ChatState::Streaming);

        assert!(machine.stream_end().await.unwrap());
        assert_eq!(machine.state(), ChatState::Success);
        assert!(!machine.is_loading());
    }

    #[tokio::test]
    async fn test_invalid_events_are_rejected() {
        let machine = ChatStateMachine::new().unwrap();

        for event in [
            ChatEvent::ReceiveStart,
            ChatEvent::StreamChunk,
            ChatEvent::StreamEnd,
            ChatEvent::Success,
            ChatEvent::Error,
            ChatEvent::Retry,
            ChatEvent::Cancel,
            ChatEvent::Reset,
        ] {
            assert!(!machine.can(event), "{event} accepted from idle");
        }
        assert!(!machine.stream_chunk().await.unwrap());
        assert_eq!(machine.state(), ChatState::Idle);
        assert_eq!(machine.available_events(), vec![ChatEvent::Send]);
    }

    #[tokio::test]
    async fn test_success_allows_next_send() {
        let machine = ChatStateMachine::new().unwrap();
        machine.send().await.unwrap();
        machine.receive_start().await.unwrap();
        assert!(machine.success().await.unwrap());

        assert!(machine.send().await.unwrap());
        assert_eq!(machine.state(), ChatState::Sending);
    }

    #[tokio::test]
    async fn test_error_message_is_retained() {
        let machine = machine_in_error(3).await;

        assert!(machine.has_error());
        assert_eq!(machine.context().error.as_deref(), Some("boom"));
        assert_eq!(
            machine.available_events(),
            vec![ChatEvent::Retry, ChatEvent::Reset]
        );
    }

    #[tokio::test]
    async fn test_rejected_error_does_not_overwrite_message() {
        let machine = machine_in_error(3).await;

        assert!(!machine.error("second failure").await.unwrap());
        assert_eq!(machine.context().error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_retry_exhaustion_routes_to_error() {
        let machine = machine_in_error(3).await;

        for attempt in 1..=3 {
            assert!(machine.retry().await.unwrap(), "retry {attempt} rejected");
            assert_eq!(machine.state(), ChatState::Retrying);
            assert_eq!(machine.context().retry_count, attempt);
            assert!(machine.error("boom again").await.unwrap());
        }

        assert!(!machine.can(ChatEvent::Retry));
        assert!(!machine.retry().await.unwrap());
        assert_eq!(machine.state(), ChatState::Error);
        assert_eq!(machine.context().retry_count, 3);
        assert_eq!(machine.context().error.as_deref(), Some("boom again"));
    }

    #[tokio::test]
    async fn test_retry_reissues_token() {
        let machine = machine_in_error(3).await;
        let before = machine.cancellation_token().unwrap();

        machine.retry().await.unwrap();

        let after = machine.cancellation_token().unwrap();
        assert!(before.is_cancelled());
        assert!(!after.is_cancelled());
        assert!(machine.receive_start().await.unwrap());
    }

    #[tokio::test]
    async fn test_success_forgives_retries() {
        let machine = machine_in_error(3).await;
        machine.retry().await.unwrap();
        machine.receive_start().await.unwrap();
        assert_eq!(machine.context().retry_count, 1);

        assert!(machine.success().await.unwrap());
        assert_eq!(machine.context().retry_count, 0);

        // Even a rejected success clears the counter.
        let machine = machine_in_error(3).await;
        machine.retry().await.unwrap();
        machine.error("again").await.unwrap();
        assert!(!machine.success().await.unwrap());
        assert_eq!(machine.context().retry_count, 0);
    }

    #[tokio::test]
    async fn test_cancel_invalidates_token_and_returns_to_idle() {
        let machine = ChatStateMachine::new().unwrap();
        machine.send().await.unwrap();
        machine.receive_start().await.unwrap();
        let token = machine.cancellation_token().unwrap();

        assert!(machine.cancel().await.unwrap());

        assert!(token.is_cancelled());
        assert!(machine.is_idle());
        assert!(machine.cancellation_token().is_none());
        assert!(!machine.stream_chunk().await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_from_error_clears_context() {
        let machine = machine_in_error(3).await;
        machine.retry().await.unwrap();
        machine.error("boom").await.unwrap();

        assert!(machine.reset().await.unwrap());

        assert!(machine.is_idle());
        let context = machine.retry_context();
        assert_eq!(context.retry_count, 0);
        assert_eq!(context.max_retries, 3);
        assert!(context.error.is_none());
        assert_eq!(machine.history()[0].cause, TransitionCause::Event(ChatEvent::Reset));
    }

    #[tokio::test]
    async fn test_reset_from_active_state_uses_escape_hatch() {
        let machine = ChatStateMachine::new().unwrap();
        machine.send().await.unwrap();
        let token = machine.cancellation_token().unwrap();

        assert!(machine.reset().await.unwrap());

        assert!(machine.is_idle());
        assert!(token.is_cancelled());
        assert_eq!(machine.history()[0].cause, TransitionCause::Reset);
    }

    #[tokio::test]
    async fn test_listeners_observe_committed_state() {
        let machine = Arc::new(ChatStateMachine::new().unwrap());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();

        let _unsubscribe = machine.subscribe(move |change| {
            assert_eq!(change.from, ChatState::Idle);
            assert_eq!(change.to, ChatState::Sending);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        machine.send().await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
