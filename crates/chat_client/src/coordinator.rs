//! ChatCoordinator - drives one chat exchange at a time
//!
//! Moves the chat state machine through `send -> receive_start ->
//! stream_chunk* -> stream_end/success`, keeps the message list in step
//! with the streamed frames and turns transport failures into `error`
//! (and, when enabled, `retry`) transitions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chat_core::{ChatMessage, Citation, Config};
use chat_state::{
    ChatEvent, ChatState, ChatStateMachine, FsmError, RetryContext, StateChangeEvent, Unsubscribe,
};
use chat_stream::{read_stream, StreamError};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::handler::ExchangeHandler;
use crate::transport::{ChatRequest, SharedTransport, WireMessage};

/// Receives each streamed content fragment as it arrives.
pub type ContentListener = Arc<dyn Fn(&str) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    pub max_retries: u32,
    pub max_history: usize,
    /// Take the `retry` transition right after a failure.
    pub auto_retry: bool,
    /// Re-issue the request whenever the machine is left in `retrying`.
    pub auto_resend: bool,
    pub model: Option<String>,
}

impl From<&Config> for CoordinatorOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            max_history: config.max_history,
            auto_retry: config.auto_retry,
            auto_resend: config.auto_resend,
            model: config.model.clone(),
        }
    }
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

/// How an exchange ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The machine could not accept the request; nothing was sent.
    Rejected,
    Completed,
    /// The exchange failed with this message.
    Failed(String),
    Cancelled,
}

impl ExchangeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Streaming,
    Single,
}

/// A request together with the assistant message it fills.
#[derive(Debug, Clone)]
struct Exchange {
    request: ChatRequest,
    placeholder: Uuid,
    mode: Mode,
}

pub struct ChatCoordinator {
    transport: SharedTransport,
    machine: ChatStateMachine,
    messages: Mutex<Vec<ChatMessage>>,
    last_exchange: Mutex<Option<Exchange>>,
    content_listener: Mutex<Option<ContentListener>>,
    options: CoordinatorOptions,
}

impl ChatCoordinator {
    pub fn new(transport: SharedTransport, options: CoordinatorOptions) -> Result<Self> {
        let machine = ChatStateMachine::with_limits(options.max_retries, options.max_history)?;
        log::debug!(
            "Chat coordinator using '{}' transport (max_retries={}, auto_retry={}, auto_resend={})",
            transport.name(),
            options.max_retries,
            options.auto_retry,
            options.auto_resend
        );

        Ok(Self {
            transport,
            machine,
            messages: Mutex::new(Vec::new()),
            last_exchange: Mutex::new(None),
            content_listener: Mutex::new(None),
            options,
        })
    }

    pub fn from_config(transport: SharedTransport, config: &Config) -> Result<Self> {
        Self::new(transport, CoordinatorOptions::from(config))
    }

    /// Send `content` and stream the answer into a new assistant message.
    pub async fn stream_send_message(&self, content: impl Into<String>) -> Result<ExchangeOutcome> {
        self.start(content.into(), Mode::Streaming).await
    }

    /// Send `content` to the non-streaming endpoint.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<ExchangeOutcome> {
        self.start(content.into(), Mode::Single).await
    }

    /// Re-issue the last request. Only valid in `retrying`.
    pub async fn resend(&self) -> Result<ExchangeOutcome> {
        if self.machine.state() != ChatState::Retrying {
            log::warn!("Cannot resend while {}", self.machine.state());
            return Ok(ExchangeOutcome::Rejected);
        }
        let Some(exchange) = lock(&self.last_exchange).clone() else {
            log::warn!("Nothing to resend");
            return Ok(ExchangeOutcome::Rejected);
        };
        self.drive(&exchange).await
    }

    pub async fn cancel(&self) -> Result<bool> {
        Ok(self.machine.cancel().await?)
    }

    pub async fn retry(&self) -> Result<bool> {
        Ok(self.machine.retry().await?)
    }

    pub async fn reset(&self) -> Result<bool> {
        Ok(self.machine.reset().await?)
    }

    pub fn state(&self) -> ChatState {
        self.machine.state()
    }

    pub fn loading(&self) -> bool {
        self.machine.is_loading()
    }

    pub fn is_streaming(&self) -> bool {
        self.machine.is_streaming()
    }

    pub fn has_error(&self) -> bool {
        self.machine.has_error()
    }

    pub fn is_idle(&self) -> bool {
        self.machine.is_idle()
    }

    pub fn retry_context(&self) -> RetryContext {
        self.machine.retry_context()
    }

    pub fn available_events(&self) -> Vec<ChatEvent> {
        self.machine.available_events()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        lock(&self.messages).clone()
    }

    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&StateChangeEvent<ChatState, ChatEvent>) + Send + Sync + 'static,
    {
        self.machine.subscribe(listener)
    }

    /// Replace the listener for streamed content fragments.
    pub fn on_content<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *lock(&self.content_listener) = Some(Arc::new(listener));
    }

    pub fn machine(&self) -> &ChatStateMachine {
        &self.machine
    }

    async fn start(&self, content: String, mode: Mode) -> Result<ExchangeOutcome> {
        if !self.machine.can(ChatEvent::Send) {
            log::warn!("Cannot send while {}", self.machine.state());
            return Ok(ExchangeOutcome::Rejected);
        }
        if !self.machine.send().await? {
            return Ok(ExchangeOutcome::Rejected);
        }

        let exchange = {
            let mut messages = lock(&self.messages);
            let history: Vec<WireMessage> = messages
                .iter()
                .filter(|message| !message.is_empty())
                .map(WireMessage::from)
                .collect();
            let placeholder = ChatMessage::assistant_placeholder();
            let exchange = Exchange {
                request: ChatRequest::new(content.clone())
                    .with_model(self.options.model.clone())
                    .with_history(history),
                placeholder: placeholder.id,
                mode,
            };
            messages.push(ChatMessage::user(content));
            messages.push(placeholder);
            exchange
        };
        *lock(&self.last_exchange) = Some(exchange.clone());

        log::info!(
            "Chat exchange started with {} prior messages",
            exchange.request.history.len()
        );
        self.drive(&exchange).await
    }

    async fn drive(&self, exchange: &Exchange) -> Result<ExchangeOutcome> {
        loop {
            self.update_message(exchange.placeholder, |message| {
                message.content.clear();
                message.citations.clear();
            });

            let outcome = self.attempt(exchange).await?;
            let resend = matches!(outcome, ExchangeOutcome::Failed(_))
                && self.options.auto_resend
                && self.machine.state() == ChatState::Retrying;
            if !resend {
                log::info!("Chat exchange finished: {:?}", outcome);
                return Ok(outcome);
            }

            let context = self.machine.retry_context();
            log::info!(
                "Re-sending request (retry {}/{})",
                context.retry_count,
                context.max_retries
            );
        }
    }

    async fn attempt(&self, exchange: &Exchange) -> Result<ExchangeOutcome> {
        if !self.machine.receive_start().await? {
            return Ok(self.interrupted());
        }
        let token = self.machine.cancellation_token().unwrap_or_default();

        match exchange.mode {
            Mode::Streaming => self.attempt_stream(exchange, &token).await,
            Mode::Single => self.attempt_single(exchange, &token).await,
        }
    }

    async fn attempt_stream(
        &self,
        exchange: &Exchange,
        token: &CancellationToken,
    ) -> Result<ExchangeOutcome> {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return self.cancelled().await,
            opened = self.transport.open_stream(&exchange.request) => opened,
        };
        let response = match opened {
            Ok(response) => response,
            Err(err) => return self.fail(err.to_string()).await,
        };

        let mut handler = ExchangeHandler::new(self, exchange.placeholder);
        match read_stream::<Citation, _>(response, &mut handler, token).await {
            Ok(stats) => {
                if !handler.completed() {
                    log::warn!(
                        "Stream ended without a completion frame after {} frames",
                        stats.frames
                    );
                    self.complete().await?;
                }
                Ok(self.settled())
            }
            Err(StreamError::Cancelled) => self.cancelled().await,
            Err(StreamError::Handler(err)) => match err.downcast::<FsmError>() {
                Ok(err) => Err(ClientError::State(*err)),
                Err(err) => self.fail(err.to_string()).await,
            },
            Err(StreamError::Remote(message)) => self.fail(message).await,
            Err(err) => self.fail(err.to_string()).await,
        }
    }

    async fn attempt_single(
        &self,
        exchange: &Exchange,
        token: &CancellationToken,
    ) -> Result<ExchangeOutcome> {
        let sent = tokio::select! {
            biased;
            _ = token.cancelled() => return self.cancelled().await,
            sent = self.transport.send(&exchange.request) => sent,
        };

        match sent {
            Ok(response) => {
                self.update_message(exchange.placeholder, |message| {
                    message.content = response.content;
                    message.citations = response.citations;
                });
                self.machine.success().await?;
                Ok(self.settled())
            }
            Err(err) => self.fail(err.to_string()).await,
        }
    }

    /// `stream_end` followed by `success`.
    pub(crate) async fn complete(&self) -> std::result::Result<(), FsmError> {
        self.machine.stream_end().await?;
        self.machine.success().await?;
        Ok(())
    }

    pub(crate) fn emit_content(&self, content: &str) {
        let listener = lock(&self.content_listener).clone();
        if let Some(listener) = listener {
            listener(content);
        }
    }

    pub(crate) fn update_message<F>(&self, id: Uuid, update: F)
    where
        F: FnOnce(&mut ChatMessage),
    {
        let mut messages = lock(&self.messages);
        match messages.iter_mut().rev().find(|message| message.id == id) {
            Some(message) => update(message),
            None => log::warn!("Message {} is gone; dropping update", id),
        }
    }

    async fn fail(&self, message: String) -> Result<ExchangeOutcome> {
        if !self.machine.error(message.clone()).await? {
            if self.machine.state() == ChatState::Success {
                log::warn!("Ignoring failure after the answer completed: {}", message);
                return Ok(ExchangeOutcome::Completed);
            }
            return Ok(self.interrupted());
        }
        log::error!("Chat exchange failed: {}", message);

        if self.options.auto_retry && self.machine.can(ChatEvent::Retry) {
            self.machine.retry().await?;
        }
        Ok(ExchangeOutcome::Failed(message))
    }

    async fn cancelled(&self) -> Result<ExchangeOutcome> {
        if !self.machine.is_idle() {
            self.machine.cancel().await?;
        }
        log::info!("Chat exchange cancelled");
        Ok(ExchangeOutcome::Cancelled)
    }

    /// Outcome of an attempt that ran to its end.
    fn settled(&self) -> ExchangeOutcome {
        match self.machine.state() {
            ChatState::Success => ExchangeOutcome::Completed,
            ChatState::Idle => ExchangeOutcome::Cancelled,
            state => ExchangeOutcome::Failed(
                self.machine
                    .context()
                    .error
                    .unwrap_or_else(|| format!("Exchange ended in {state}")),
            ),
        }
    }

    /// Outcome when a transition of our own was refused mid-exchange.
    fn interrupted(&self) -> ExchangeOutcome {
        let state = self.machine.state();
        if state == ChatState::Idle {
            ExchangeOutcome::Cancelled
        } else {
            log::warn!("Chat exchange interrupted in {}", state);
            ExchangeOutcome::Rejected
        }
    }
}
