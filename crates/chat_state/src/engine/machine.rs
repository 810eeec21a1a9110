use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::config::StateConfig;
use super::error::{FsmError, HookPhase};
use super::history::{History, StateChangeEvent, TransitionCause};
use super::Tag;

pub const DEFAULT_MAX_HISTORY: usize = 50;

type Listener<S, E> = Arc<dyn Fn(&StateChangeEvent<S, E>) + Send + Sync>;
type ListenerList<S, E> = Arc<Mutex<Vec<(u64, Listener<S, E>)>>>;

/// Removes the listener it was returned for.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Clears the in-flight flag on every exit path of a transition.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StateMachineBuilder<S, E> {
    initial: S,
    states: HashMap<S, StateConfig<S, E>>,
    max_history: usize,
}

impl<S: Tag, E: Tag> StateMachineBuilder<S, E> {
    pub fn state(mut self, state: S, config: StateConfig<S, E>) -> Self {
        self.states.insert(state, config);
        self
    }

    pub fn max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Fails if the initial state or any transition target is unconfigured.
    pub fn build(self) -> Result<StateMachine<S, E>, FsmError> {
        if !self.states.contains_key(&self.initial) {
            return Err(FsmError::UnknownState(format!("{:?}", self.initial)));
        }
        for config in self.states.values() {
            for (_, transition) in &config.transitions {
                if !self.states.contains_key(&transition.target) {
                    return Err(FsmError::UnknownState(format!("{:?}", transition.target)));
                }
            }
        }

        Ok(StateMachine {
            current: Mutex::new(self.initial),
            states: self.states,
            transitioning: AtomicBool::new(false),
            history: Mutex::new(History::new(self.max_history)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: AtomicU64::new(0),
        })
    }
}

/// Async state machine with guarded transitions, hooks and history.
///
/// All methods take `&self`; share it behind an `Arc` when several tasks
/// drive the same machine. Only one transition runs at a time: a call made
/// while another transition is suspended inside a hook is dropped and
/// resolves to `false`.
pub struct StateMachine<S, E> {
    states: HashMap<S, StateConfig<S, E>>,
    current: Mutex<S>,
    transitioning: AtomicBool,
    history: Mutex<History<S, E>>,
    listeners: ListenerList<S, E>,
    next_listener_id: AtomicU64,
}

impl<S: Tag, E: Tag> StateMachine<S, E> {
    pub fn builder(initial: S) -> StateMachineBuilder<S, E> {
        StateMachineBuilder {
            initial,
            states: HashMap::new(),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    /// Run the entry hook of the current (initial) state.
    pub async fn start(&self) -> Result<(), FsmError> {
        let state = self.state();
        if let Some(enter) = self.states.get(&state).and_then(|c| c.on_enter.clone()) {
            enter()
                .await
                .map_err(|cause| FsmError::hook(HookPhase::Enter, state, state, "start", cause))?;
        }
        Ok(())
    }

    pub fn state(&self) -> S {
        *lock(&self.current)
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning.load(Ordering::Acquire)
    }

    /// Whether `event` would currently be accepted. No hooks run.
    pub fn can(&self, event: E) -> bool {
        let state = self.state();
        self.states
            .get(&state)
            .and_then(|config| config.lookup(&event))
            .is_some_and(|transition| transition.allows())
    }

    /// Events accepted from the current state, in configuration order.
    pub fn available_events(&self) -> Vec<E> {
        let state = self.state();
        self.states
            .get(&state)
            .map(|config| {
                config
                    .transitions
                    .iter()
                    .filter(|(_, transition)| transition.allows())
                    .map(|(event, _)| *event)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fire `event`.
    ///
    /// Resolves to `Ok(false)` when another transition is in flight, when no
    /// transition exists for the current state, or when its guard rejects.
    /// On a hook error the previous state is restored and the error returned.
    pub async fn transition(&self, event: E) -> Result<bool, FsmError> {
        if self.transitioning.swap(true, Ordering::AcqRel) {
            log::warn!("Dropping {:?}: another transition is in progress", event);
            return Ok(false);
        }
        let _in_flight = InFlight(&self.transitioning);

        let from = self.state();
        let Some(config) = self.states.get(&from) else {
            return Ok(false);
        };
        let Some(transition) = config.lookup(&event) else {
            log::debug!("No transition for {:?} from {:?}", event, from);
            return Ok(false);
        };
        if !transition.allows() {
            log::debug!("Guard rejected {:?} from {:?}", event, from);
            return Ok(false);
        }
        let to = transition.target;

        if let Some(exit) = &config.on_exit {
            exit()
                .await
                .map_err(|cause| {
                    FsmError::hook(HookPhase::Exit, from, to, format!("{event:?}"), cause)
                })?;
        }

        if let Some(action) = &transition.action {
            action()
                .await
                .map_err(|cause| {
                    FsmError::hook(HookPhase::Action, from, to, format!("{event:?}"), cause)
                })?;
        }

        *lock(&self.current) = to;

        if let Some(enter) = self.states.get(&to).and_then(|c| c.on_enter.as_ref()) {
            if let Err(cause) = enter().await {
                *lock(&self.current) = from;
                return Err(FsmError::hook(
                    HookPhase::Enter,
                    from,
                    to,
                    format!("{event:?}"),
                    cause,
                ));
            }
        }

        self.record(StateChangeEvent::new(from, to, TransitionCause::Event(event)));
        Ok(true)
    }

    /// Force the machine into `state`.
    ///
    /// Only the target's entry hook runs; the current state's exit hook is
    /// skipped. Guards and the in-flight flag are ignored.
    pub async fn reset(&self, state: S) -> Result<(), FsmError> {
        let Some(config) = self.states.get(&state) else {
            return Err(FsmError::UnknownState(format!("{state:?}")));
        };

        let from = std::mem::replace(&mut *lock(&self.current), state);

        if let Some(enter) = &config.on_enter {
            if let Err(cause) = enter().await {
                *lock(&self.current) = from;
                return Err(FsmError::hook(HookPhase::Enter, from, state, "reset", cause));
            }
        }

        self.record(StateChangeEvent::new(from, state, TransitionCause::Reset));
        Ok(())
    }

    /// Changes, newest first.
    pub fn history(&self) -> Vec<StateChangeEvent<S, E>> {
        lock(&self.history).newest_first()
    }

    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn(&StateChangeEvent<S, E>) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push((id, Arc::new(listener)));

        let listeners = Arc::downgrade(&self.listeners);
        Box::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                lock(&listeners).retain(|(listener_id, _)| *listener_id != id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn record(&self, change: StateChangeEvent<S, E>) {
        lock(&self.history).push(change.clone());
        self.notify(&change);
    }

    fn notify(&self, change: &StateChangeEvent<S, E>) {
        let listeners: Vec<Listener<S, E>> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| listener(change)));
            if let Err(panic) = result {
                log::error!(
                    "State listener panicked on {:?} -> {:?}: {}",
                    change.from,
                    change.to,
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}
