//! Chat states - the closed set of modes a chat exchange can be in

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a chat exchange.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatState {
    /// Awaiting user input.
    #[default]
    Idle,

    /// Request accepted, not yet handed to the network.
    Sending,

    /// Request in flight, no content received yet.
    Receiving,

    /// Content fragments are arriving.
    Streaming,

    /// Exchange completed. Also a valid starting point for the next send.
    Success,

    /// Exchange failed; the message is kept in the context.
    Error,

    /// A failed exchange is being attempted again.
    Retrying,
}

impl ChatState {
    pub const ALL: [ChatState; 7] = [
        Self::Idle,
        Self::Sending,
        Self::Receiving,
        Self::Streaming,
        Self::Success,
        Self::Error,
        Self::Retrying,
    ];

    /// A network operation is pending or in progress.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            Self::Sending | Self::Receiving | Self::Streaming | Self::Retrying
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Receiving => "receiving",
            Self::Streaming => "streaming",
            Self::Success => "success",
            Self::Error => "error",
            Self::Retrying => "retrying",
        }
    }

    /// Get a human-readable description of the current state.
    pub fn description(&self) -> &str {
        match self {
            Self::Idle => "Ready for input",
            Self::Sending => "Sending your message",
            Self::Receiving => "Waiting for response",
            Self::Streaming => "Receiving response",
            Self::Success => "Done",
            Self::Error => "Failed",
            Self::Retrying => "Retrying",
        }
    }
}

impl fmt::Display for ChatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(ChatState::default(), ChatState::Idle);
    }

    #[test]
    fn test_loading_states() {
        let loading: Vec<_> = ChatState::ALL
            .into_iter()
            .filter(ChatState::is_loading)
            .collect();
        assert_eq!(
            loading,
            vec![
                ChatState::Sending,
                ChatState::Receiving,
                ChatState::Streaming,
                ChatState::Retrying
            ]
        );
    }

    #[test]
    fn test_serde_matches_display() {
        for state in ChatState::ALL {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
