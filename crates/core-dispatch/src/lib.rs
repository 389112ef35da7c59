//! Action dispatch: routing, hooks, execution, projection, metrics.
//!
//! The [`Dispatcher`] is the orchestration point of the core. A dispatch
//! builds an [`ExecutionContext`] over the installed subsystems, runs the
//! pre-hook chain (which may cancel), resolves a handler (namespace router
//! first, exact registry second), invokes it under an optional panic
//! boundary, projects the result onto the mode manager and renderer, runs the
//! post-hook chain, and records metrics.
//!
//! Dispatchers are plain instances: two editor windows get two dispatchers
//! with independent registries and metrics. The async facility is a
//! queue-backed serialiser over the same synchronous path, not parallelism.

use std::sync::atomic::AtomicU64;

mod batcher;
mod context;
mod dispatcher;
mod handler;
pub mod hooks;
mod metrics;
mod perf;
mod queue;
mod registry;
mod router;

pub use batcher::ActionBatcher;
pub use context::{DataBag, ExecutionContext, SearchState, Slot, REGISTER_KEY, SEARCH_STATE_KEY};
pub use dispatcher::{Dispatcher, DispatcherConfig, Subsystems};
pub use handler::{ActionHandler, FnHandler, HandlerEntry, NamespaceHandler, handler_fn};
pub use hooks::{Hook, HookManager};
pub use metrics::{ActionStats, GlobalStats, MetricsRegistry};
pub use perf::{LatencyStats, LatencyTracker, PerfMonitor, HISTOGRAM_BOUNDS_US};
pub use queue::AsyncDispatch;
pub use registry::Registry;
pub use router::Router;

// -------------------------------------------------------------------------------------------------
// Telemetry
// -------------------------------------------------------------------------------------------------
// Process-wide counters, relaxed atomics. Per-action data lives in the
// per-dispatcher metrics table; these exist so tests and embedders can watch
// aggregate behavior without holding a dispatcher reference.
// -------------------------------------------------------------------------------------------------

/// Total dispatches started across all dispatcher instances.
pub static DISPATCH_TOTAL: AtomicU64 = AtomicU64::new(0);
/// Results discarded because the async result queue was full.
pub static RESULTS_DROPPED: AtomicU64 = AtomicU64::new(0);
/// Handler panics caught by the fault boundary.
pub static PANICS_CAUGHT: AtomicU64 = AtomicU64::new(0);
