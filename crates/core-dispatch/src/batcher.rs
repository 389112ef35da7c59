//! Debounced action collection for I/O-ish consumers.
//!
//! Collects actions until `max_size` is reached or the flush interval
//! elapses, then hands the batch to the supplied sink. A size-triggered
//! flush happens inline in `add` and restarts the interval timer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use core_actions::Action;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::trace;

const DEFAULT_MAX_SIZE: usize = 10;

type Sink = Box<dyn Fn(Vec<Action>) + Send + Sync>;

struct BatcherInner {
    pending: Mutex<Vec<Action>>,
    max_size: usize,
    sink: Sink,
    /// Signalled after a size-triggered flush so the timer restarts instead
    /// of flushing a just-emptied buffer.
    timer_reset: Notify,
    stopped: AtomicBool,
}

impl BatcherInner {
    fn flush(&self) {
        let batch = {
            let mut pending = self.pending.lock().expect("batcher lock poisoned");
            if pending.is_empty() {
                return;
            }
            std::mem::take(&mut *pending)
        };
        trace!(target: "dispatch.batch", size = batch.len(), "flush");
        (self.sink)(batch);
    }
}

/// Scoped collector flushing to a sink by size or time.
pub struct ActionBatcher {
    inner: Arc<BatcherInner>,
    timer: JoinHandle<()>,
}

impl ActionBatcher {
    /// `max_size <= 0` selects the default of 10.
    pub fn new<F>(max_size: i32, interval: Duration, sink: F) -> Self
    where
        F: Fn(Vec<Action>) + Send + Sync + 'static,
    {
        let max_size = if max_size <= 0 {
            DEFAULT_MAX_SIZE
        } else {
            max_size as usize
        };
        let inner = Arc::new(BatcherInner {
            pending: Mutex::new(Vec::new()),
            max_size,
            sink: Box::new(sink),
            timer_reset: Notify::new(),
            stopped: AtomicBool::new(false),
        });
        let timer_inner = inner.clone();
        let timer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if timer_inner.stopped.load(Ordering::SeqCst) {
                            break;
                        }
                        timer_inner.flush();
                    }
                    _ = timer_inner.timer_reset.notified() => {
                        if timer_inner.stopped.load(Ordering::SeqCst) {
                            break;
                        }
                        // Restart the sleep from now.
                    }
                }
            }
        });
        Self { inner, timer }
    }

    /// Add an action. Reaching `max_size` flushes inline and restarts the
    /// pending timer.
    pub fn add(&self, action: Action) {
        let full = {
            let mut pending = self.inner.pending.lock().expect("batcher lock poisoned");
            pending.push(action);
            pending.len() >= self.inner.max_size
        };
        if full {
            self.inner.flush();
            self.inner.timer_reset.notify_one();
        }
    }

    /// Flush whatever is pending right now.
    pub fn flush(&self) {
        self.inner.flush();
        self.inner.timer_reset.notify_one();
    }

    /// Number of actions currently buffered.
    pub fn pending(&self) -> usize {
        self.inner.pending.lock().expect("batcher lock poisoned").len()
    }

    /// Stop the timer and flush the remainder.
    pub async fn close(self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.timer_reset.notify_one();
        let _ = self.timer.await;
        self.inner.flush();
    }
}
