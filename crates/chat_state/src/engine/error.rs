use std::fmt;

use thiserror::Error;

/// Hook that failed during a transition or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Exit,
    Action,
    Enter,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exit => f.write_str("exit"),
            Self::Action => f.write_str("transition"),
            Self::Enter => f.write_str("entry"),
        }
    }
}

/// Errors raised by the engine.
///
/// Missing transitions and failing guards are not errors; they resolve to `false`.
#[derive(Error, Debug)]
pub enum FsmError {
    #[error("{phase} hook failed during {from} -> {to} on {event}: {cause}")]
    HookFailed {
        phase: HookPhase,
        from: String,
        to: String,
        event: String,
        cause: anyhow::Error,
    },

    #[error("state {0} has no configuration")]
    UnknownState(String),
}

impl FsmError {
    pub(crate) fn hook(
        phase: HookPhase,
        from: impl fmt::Debug,
        to: impl fmt::Debug,
        event: impl Into<String>,
        cause: anyhow::Error,
    ) -> Self {
        Self::HookFailed {
            phase,
            from: format!("{from:?}"),
            to: format!("{to:?}"),
            event: event.into(),
            cause,
        }
    }

    pub fn phase(&self) -> Option<HookPhase> {
        match self {
            Self::HookFailed { phase, .. } => Some(*phase),
            Self::UnknownState(_) => None,
        }
    }
}
