//! Built-in handlers for the dispatch core: cursor motions, editor edits,
//! mode transitions, and search, each owning its dotted namespace.
//!
//! `register_builtin` wires all four into a dispatcher's router; hosts can
//! still shadow individual names through the exact registry — the router
//! wins only for names the namespace handlers claim.

pub mod cursor;
pub mod editor;
pub mod modes;
pub mod motion;
pub mod search;

pub use cursor::CursorHandler;
pub use editor::EditorHandler;
pub use modes::ModeHandler;
pub use search::SearchHandler;

use core_dispatch::Dispatcher;
use std::sync::Arc;
use tracing::debug;

/// Register the built-in namespace handlers on `dispatcher`.
pub fn register_builtin(dispatcher: &Dispatcher) {
    dispatcher
        .router()
        .register_namespace(Arc::new(CursorHandler::new()));
    dispatcher
        .router()
        .register_namespace(Arc::new(EditorHandler::new()));
    dispatcher
        .router()
        .register_namespace(Arc::new(ModeHandler::new()));
    dispatcher
        .router()
        .register_namespace(Arc::new(SearchHandler::new()));
    debug!(target: "handlers", "built-in namespace handlers registered");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_builtin_claims_four_namespaces() {
        let d = Dispatcher::default();
        register_builtin(&d);
        assert_eq!(
            d.router().namespaces(),
            vec!["cursor", "editor", "mode", "search"]
        );
    }
}
