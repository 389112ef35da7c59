//! Dispatch orchestration: context build, hook chains, handler resolution,
//! fault isolation, result projection, and metrics capture.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use core_actions::{Action, ActionError, ActionResult};
use core_state::{CursorSet, History, ModeManager, Renderer};
use core_text::Engine;
use tracing::{trace, warn};

use crate::context::{DataBag, ExecutionContext};
use crate::handler::ActionHandler;
use crate::{HookManager, MetricsRegistry, PerfMonitor, Registry, Router};
use crate::{DISPATCH_TOTAL, PANICS_CAUGHT};

/// Maximum captured stack trace carried inside a panic result.
const PANIC_TRACE_CAP: usize = 4096;

/// Dispatcher behavior switches.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Run each handler inside a fault boundary. When off, handler panics
    /// propagate to the caller.
    pub panic_isolation: bool,
    /// Record per-action metrics and latency.
    pub metrics: bool,
    /// Cooperative per-handler time budget. Checked after the handler
    /// returns; exceeding it converts the result into a timeout error.
    pub handler_timeout: Option<Duration>,
    /// Capacity of the async action and result queues.
    pub queue_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            panic_isolation: true,
            metrics: true,
            handler_timeout: None,
            queue_capacity: 100,
        }
    }
}

/// The editor subsystems a dispatcher executes against. All optional:
/// handlers surface `MissingSubsystem` for whatever they need and lack.
#[derive(Default)]
pub struct Subsystems {
    pub engine: Option<Box<dyn Engine + Send + Sync>>,
    pub cursors: Option<CursorSet>,
    pub mode: Option<Box<dyn ModeManager + Send + Sync>>,
    pub history: Option<Box<dyn History + Send + Sync>>,
    pub renderer: Option<Box<dyn Renderer + Send + Sync>>,
    pub data: DataBag,
}

/// Routes actions to handlers and executes them against the installed
/// subsystems. An instance, not a singleton: each editor window owns its own
/// dispatcher, registries and metrics included.
pub struct Dispatcher {
    registry: Registry,
    router: Router,
    hooks: HookManager,
    subsystems: RwLock<Subsystems>,
    metrics: MetricsRegistry,
    perf: PerfMonitor,
    panic_counts: Mutex<HashMap<String, u64>>,
    config: DispatcherConfig,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        Self {
            registry: Registry::new(),
            router: Router::new(),
            hooks: HookManager::new(),
            subsystems: RwLock::new(Subsystems::default()),
            metrics: MetricsRegistry::new(),
            perf: PerfMonitor::default(),
            panic_counts: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn hooks(&self) -> &HookManager {
        &self.hooks
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn perf(&self) -> &PerfMonitor {
        &self.perf
    }

    /// Panic-boundary hits for one action name.
    pub fn panic_count(&self, name: &str) -> u64 {
        self.panic_counts
            .lock()
            .expect("panic counter lock poisoned")
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    // --- subsystem installation ------------------------------------------------------------------

    pub fn install_engine(&self, engine: Box<dyn Engine + Send + Sync>) {
        self.write_subsystems(|s| s.engine = Some(engine));
    }

    pub fn install_cursors(&self, cursors: CursorSet) {
        self.write_subsystems(|s| s.cursors = Some(cursors));
    }

    pub fn install_mode(&self, mode: Box<dyn ModeManager + Send + Sync>) {
        self.write_subsystems(|s| s.mode = Some(mode));
    }

    pub fn install_history(&self, history: Box<dyn History + Send + Sync>) {
        self.write_subsystems(|s| s.history = Some(history));
    }

    pub fn install_renderer(&self, renderer: Box<dyn Renderer + Send + Sync>) {
        self.write_subsystems(|s| s.renderer = Some(renderer));
    }

    /// Mutate the installed subsystems directly (setup and tests).
    pub fn write_subsystems<R>(&self, f: impl FnOnce(&mut Subsystems) -> R) -> R {
        let mut subsystems = self.subsystems.write().expect("subsystem lock poisoned");
        f(&mut subsystems)
    }

    /// Read the installed subsystems (assertions and presenters).
    pub fn read_subsystems<R>(&self, f: impl FnOnce(&Subsystems) -> R) -> R {
        let subsystems = self.subsystems.read().expect("subsystem lock poisoned");
        f(&subsystems)
    }

    // --- dispatch --------------------------------------------------------------------------------

    /// Synchronous dispatch: the action is resolved, executed, projected, and
    /// observable before this returns.
    pub fn dispatch(&self, action: Action) -> ActionResult {
        self.dispatch_with_input(action, None)
    }

    /// Dispatch with an input-layer mode attached to the context.
    pub fn dispatch_with_input(&self, mut action: Action, input_mode: Option<String>) -> ActionResult {
        let started = Instant::now();
        DISPATCH_TOTAL.fetch_add(1, Ordering::Relaxed);

        let mut subsystems = self.subsystems.write().expect("subsystem lock poisoned");
        let mut ctx = ExecutionContext::new(&mut subsystems);
        if action.count > 0 {
            ctx.count = action.count as u32;
        }
        ctx.input_mode = input_mode;

        if !self.hooks.run_pre(&mut action, &mut ctx) {
            return ActionResult::cancelled("cancelled by hook");
        }

        // Router wins; the exact registry is the fallback. No merging.
        let handler = self
            .router
            .route(&action.name)
            .or_else(|| self.registry.get(&action.name));
        let Some(handler) = handler else {
            trace!(target: "dispatch.core", action = %action.name, "no handler");
            return ActionResult::error(ActionError::NoHandler(action.name.clone()));
        };

        let mut result = self.invoke(handler.as_ref(), &action, &mut ctx);

        if let Some(limit) = self.config.handler_timeout
            && started.elapsed() > limit
        {
            result = ActionResult::error(ActionError::HandlerTimeout);
        }

        project_result(&mut ctx, &result);
        self.hooks.run_post(&action, &mut ctx, &mut result);
        drop(ctx);
        drop(subsystems);

        let elapsed = started.elapsed();
        if self.config.metrics {
            self.metrics.record(&action.name, elapsed, result.status);
            self.perf.record(&action.name, elapsed);
        }
        trace!(target: "dispatch.core", action = %action.name, status = ?result.status, elapsed_us = elapsed.as_micros() as u64, "dispatch complete");
        result
    }

    /// Dispatch `actions` in order, collecting results. Halts after the first
    /// error result when `stop_on_error` is set.
    pub fn dispatch_batch(&self, actions: Vec<Action>, stop_on_error: bool) -> Vec<ActionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            let result = self.dispatch(action);
            let is_error = result.is_error();
            results.push(result);
            if stop_on_error && is_error {
                break;
            }
        }
        results
    }

    fn invoke(
        &self,
        handler: &dyn ActionHandler,
        action: &Action,
        ctx: &mut ExecutionContext<'_>,
    ) -> ActionResult {
        if !self.config.panic_isolation {
            return handler.handle(action, ctx);
        }
        match std::panic::catch_unwind(AssertUnwindSafe(|| handler.handle(action, ctx))) {
            Ok(result) => result,
            Err(payload) => {
                PANICS_CAUGHT.fetch_add(1, Ordering::Relaxed);
                let message = panic_message(payload.as_ref());
                *self
                    .panic_counts
                    .lock()
                    .expect("panic counter lock poisoned")
                    .entry(action.name.clone())
                    .or_insert(0) += 1;
                warn!(target: "dispatch.core", action = %action.name, %message, "handler panicked");
                ActionResult::error(ActionError::HandlerPanic {
                    action: action.name.clone(),
                    message,
                    trace: captured_trace(),
                })
            }
        }
    }
}

/// Apply the result's projection: mode change, then the presenter updates,
/// then the keep-primary-cursor-visible rule.
fn project_result(ctx: &mut ExecutionContext<'_>, result: &ActionResult) {
    if let Some(mode) = &result.mode_change
        && let Ok(mgr) = ctx.mode_mut()
    {
        // A refusing mode manager is the host's business; projection goes on.
        let _ = mgr.switch(mode);
    }

    if !ctx.has_renderer() {
        return;
    }
    let primary = ctx.primary_point();
    let update = &result.view_update;
    let Some(renderer) = ctx.renderer_mut() else {
        return;
    };
    if update.redraw {
        renderer.redraw();
    } else if !update.redraw_lines.is_empty() {
        renderer.redraw_lines(&update.redraw_lines);
    }
    if let Some(scroll) = update.scroll_to {
        if scroll.center {
            renderer.center_on_line(scroll.line);
        } else {
            renderer.scroll_to(scroll.line, scroll.column);
        }
    } else if let Some(line) = update.center_line {
        renderer.center_on_line(line);
    } else if let Some(point) = primary
        && !renderer.is_line_visible(point.line)
    {
        renderer.scroll_to_reveal(point.line, point.column);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Capture the current backtrace, truncated to `PANIC_TRACE_CAP` bytes on a
/// char boundary.
fn captured_trace() -> String {
    let mut trace = std::backtrace::Backtrace::force_capture().to_string();
    if trace.len() > PANIC_TRACE_CAP {
        let mut cut = PANIC_TRACE_CAP;
        while cut > 0 && !trace.is_char_boundary(cut) {
            cut -= 1;
        }
        trace.truncate(cut);
    }
    trace
}
