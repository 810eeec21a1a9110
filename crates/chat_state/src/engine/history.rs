use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// What moved the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause<E> {
    Event(E),
    Reset,
}

/// Immutable record of one state change.
#[derive(Debug, Clone, Serialize)]
pub struct StateChangeEvent<S, E> {
    pub from: S,
    pub to: S,
    pub cause: TransitionCause<E>,
    pub at: DateTime<Utc>,
}

impl<S, E> StateChangeEvent<S, E> {
    pub(crate) fn new(from: S, to: S, cause: TransitionCause<E>) -> Self {
        Self {
            from,
            to,
            cause,
            at: Utc::now(),
        }
    }
}

/// Bounded ring of changes, oldest at the front.
#[derive(Debug)]
pub(crate) struct History<S, E> {
    entries: VecDeque<StateChangeEvent<S, E>>,
    capacity: usize,
}

impl<S: Clone, E: Clone> History<S, E> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, change: StateChangeEvent<S, E>) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(change);
    }

    pub(crate) fn newest_first(&self) -> Vec<StateChangeEvent<S, E>> {
        self.entries.iter().rev().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_first() {
        let mut history = History::new(2);
        history.push(StateChangeEvent::new(0, 1, TransitionCause::Event('a')));
        history.push(StateChangeEvent::new(1, 2, TransitionCause::Event('b')));
        history.push(StateChangeEvent::new(2, 3, TransitionCause::Event('c')));

        let entries = history.newest_first();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cause, TransitionCause::Event('c'));
        assert_eq!(entries[1].cause, TransitionCause::Event('b'));
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history: History<u8, char> = History::new(0);
        history.push(StateChangeEvent::new(0, 1, TransitionCause::Reset));
        assert_eq!(history.len(), 0);
    }
}
