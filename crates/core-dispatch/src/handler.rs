//! The handler protocol: the contract every action consumer obeys.

use std::sync::Arc;

use core_actions::{Action, ActionResult};

use crate::ExecutionContext;

/// The unit that consumes an [`Action`] and produces an [`ActionResult`].
///
/// Handlers are shared immutable references after registration; anything they
/// need to remember between dispatches goes through the context's data bag or
/// their own interior state.
pub trait ActionHandler: Send + Sync {
    fn handle(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> ActionResult;
}

/// A handler that owns a whole namespace (`cursor.*`, `search.*`, ...) and
/// claims individual action names via `can_handle`.
pub trait NamespaceHandler: ActionHandler {
    /// The dotted prefix this handler is registered under.
    fn namespace(&self) -> &str;
    /// Whether this handler accepts the given full action name.
    fn can_handle(&self, action_name: &str) -> bool;
}

/// One registry slot: a handler plus the priority it was registered with.
/// Entries for the same name are kept sorted descending by priority, ties
/// resolved by registration order.
#[derive(Clone)]
pub struct HandlerEntry {
    pub handler: Arc<dyn ActionHandler>,
    pub priority: i32,
    pub(crate) seq: u64,
}

/// Closure adapter so tests and embedders can register plain functions.
pub struct FnHandler<F>(F);

impl<F> ActionHandler for FnHandler<F>
where
    F: Fn(&Action, &mut ExecutionContext<'_>) -> ActionResult + Send + Sync,
{
    fn handle(&self, action: &Action, ctx: &mut ExecutionContext<'_>) -> ActionResult {
        (self.0)(action, ctx)
    }
}

/// Wrap a closure as a shareable [`ActionHandler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(&Action, &mut ExecutionContext<'_>) -> ActionResult + Send + Sync + 'static,
{
    Arc::new(FnHandler(f))
}
