//! Shared harness for the end-to-end dispatch tests: a dispatcher with every
//! subsystem installed and the built-in handlers registered.
#![allow(dead_code)] // not every test binary uses every helper

use core_dispatch::Dispatcher;
use core_state::{CursorSet, ModeManager, ModeStack, UndoJournal, ViewportRenderer};
use core_text::{Engine, TextEngine};

pub const VIEW_HEIGHT: u32 = 24;

static TRACING: std::sync::Once = std::sync::Once::new();

/// Opt-in test logging: `RUST_LOG=handlers.search=trace cargo test ...`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Dispatcher over `text` with the primary cursor at `at`, mode `normal`.
pub fn editor(text: &str, at: usize) -> Dispatcher {
    init_tracing();
    let dispatcher = Dispatcher::default();
    dispatcher.install_engine(Box::new(TextEngine::from_str(text)));
    dispatcher.install_cursors(CursorSet::single(at));
    dispatcher.install_mode(Box::new(ModeStack::new()));
    dispatcher.install_history(Box::new(UndoJournal::new()));
    dispatcher.install_renderer(Box::new(ViewportRenderer::new(VIEW_HEIGHT)));
    core_handlers::register_builtin(&dispatcher);
    dispatcher
}

pub fn buffer_text(d: &Dispatcher) -> String {
    d.read_subsystems(|s| s.engine.as_ref().unwrap().text())
}

pub fn primary_head(d: &Dispatcher) -> usize {
    d.read_subsystems(|s| s.cursors.as_ref().unwrap().primary().head)
}

pub fn current_mode(d: &Dispatcher) -> String {
    d.read_subsystems(|s| s.mode.as_ref().unwrap().current_name().to_string())
}
