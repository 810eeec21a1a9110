//! Chat events - the events that trigger state transitions

use std::fmt;

use serde::{Deserialize, Serialize};

/// Defines the events that can trigger state transitions in the chat FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEvent {
    // ========== User Events ==========
    /// User sent a new message.
    Send,

    /// User asked to try a failed exchange again.
    Retry,

    /// User cancelled the current exchange.
    Cancel,

    /// User cleared a finished or failed exchange.
    Reset,

    // ========== Transport Events ==========
    /// The response has been requested and is awaited.
    ReceiveStart,

    /// A content fragment arrived.
    StreamChunk,

    /// The stream signalled completion.
    StreamEnd,

    /// The exchange completed.
    Success,

    /// The exchange failed.
    Error,
}

impl ChatEvent {
    /// Check if this event is user-initiated.
    pub fn is_user_event(&self) -> bool {
        matches!(self, Self::Send | Self::Retry | Self::Cancel | Self::Reset)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Retry => "retry",
            Self::Cancel => "cancel",
            Self::Reset => "reset",
            Self::ReceiveStart => "receive_start",
            Self::StreamChunk => "stream_chunk",
            Self::StreamEnd => "stream_end",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
