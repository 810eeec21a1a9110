use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Async lifecycle or side-effect hook.
pub type Hook = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Synchronous predicate that must hold for a transition to proceed.
pub type Guard = Arc<dyn Fn() -> bool + Send + Sync>;

fn boxed_hook<F, Fut>(hook: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || hook().boxed())
}

/// Target of an event from a given state.
#[derive(Clone)]
pub struct Transition<S> {
    pub(crate) target: S,
    pub(crate) guard: Option<Guard>,
    pub(crate) action: Option<Hook>,
}

impl<S> Transition<S> {
    pub fn to(target: S) -> Self {
        Self {
            target,
            guard: None,
            action: None,
        }
    }

    pub fn guard<F>(mut self, guard: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Side effect run after the exit hook and before the state pointer moves.
    pub fn action<F, Fut>(mut self, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.action = Some(boxed_hook(action));
        self
    }

    pub fn target(&self) -> &S {
        &self.target
    }

    pub(crate) fn allows(&self) -> bool {
        self.guard.as_ref().map_or(true, |guard| guard())
    }
}

/// Hooks and outgoing transitions of one state.
pub struct StateConfig<S, E> {
    pub(crate) on_enter: Option<Hook>,
    pub(crate) on_exit: Option<Hook>,
    pub(crate) transitions: Vec<(E, Transition<S>)>,
}

impl<S, E> Default for StateConfig<S, E> {
    fn default() -> Self {
        Self {
            on_enter: None,
            on_exit: None,
            transitions: Vec::new(),
        }
    }
}

impl<S, E: PartialEq> StateConfig<S, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_enter = Some(boxed_hook(hook));
        self
    }

    pub fn on_exit<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.on_exit = Some(boxed_hook(hook));
        self
    }

    /// Add or replace the transition taken on `event`.
    pub fn on(mut self, event: E, transition: Transition<S>) -> Self {
        match self.transitions.iter_mut().find(|(e, _)| *e == event) {
            Some(slot) => slot.1 = transition,
            None => self.transitions.push((event, transition)),
        }
        self
    }

    pub(crate) fn lookup(&self, event: &E) -> Option<&Transition<S>> {
        self.transitions
            .iter()
            .find(|(e, _)| e == event)
            .map(|(_, transition)| transition)
    }
}
