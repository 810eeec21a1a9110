use serde::Serialize;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Companion data of the chat FSM that a state tag cannot express.
#[derive(Debug, Clone)]
pub struct ChatStateContext {
    /// Message of the last failure; set when `error` is entered.
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Live while a network operation may be running.
    pub cancel_token: Option<CancellationToken>,
}

impl ChatStateContext {
    pub fn new(max_retries: u32) -> Self {
        Self {
            error: None,
            retry_count: 0,
            max_retries,
            cancel_token: None,
        }
    }

    pub fn retries_left(&self) -> u32 {
        self.max_retries.saturating_sub(self.retry_count)
    }

    /// Cancel the current token and install a fresh one.
    pub(crate) fn issue_token(&mut self) -> CancellationToken {
        if let Some(previous) = self.cancel_token.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.cancel_token = Some(token.clone());
        token
    }

    pub(crate) fn revoke_token(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

impl Default for ChatStateContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// Serializable view of the retry bookkeeping for UI consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryContext {
    pub retry_count: u32,
    pub max_retries: u32,
    pub error: Option<String>,
}

impl From<&ChatStateContext> for RetryContext {
    fn from(context: &ChatStateContext) -> Self {
        Self {
            retry_count: context.retry_count,
            max_retries: context.max_retries,
            error: context.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuing_a_token_cancels_the_previous_one() {
        let mut context = ChatStateContext::default();
        let first = context.issue_token();
        let second = context.issue_token();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        context.revoke_token();
        assert!(second.is_cancelled());
        assert!(context.cancel_token.is_none());
    }

    #[test]
    fn retries_left_saturates() {
        let context = ChatStateContext {
            retry_count: 5,
            ..ChatStateContext::new(3)
        };
        assert_eq!(context.retries_left(), 0);
    }
}
