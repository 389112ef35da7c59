//! Queued (async) dispatch: a single consumer task serialising actions
//! through the synchronous path.
//!
//! Both queues are bounded. The inbound side applies backpressure through
//! `submit`; the outbound side is try-send only — when the result queue is
//! full the result is dropped and counted. Callers that must see every
//! result use synchronous dispatch instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use core_actions::{Action, ActionResult};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{Dispatcher, RESULTS_DROPPED};

struct StopSignal {
    notify: Notify,
    stopped: AtomicBool,
}

/// Handle to a running consumer task. Dropping the handle closes the action
/// queue, which also ends the task.
pub struct AsyncDispatch {
    actions: mpsc::Sender<Action>,
    results: mpsc::Receiver<ActionResult>,
    stop: Arc<StopSignal>,
    task: JoinHandle<()>,
}

impl AsyncDispatch {
    /// Start the consumer with the dispatcher's configured queue capacity.
    pub fn start(dispatcher: Arc<Dispatcher>) -> Self {
        let capacity = dispatcher.config().queue_capacity.max(1);
        Self::with_capacity(dispatcher, capacity)
    }

    pub fn with_capacity(dispatcher: Arc<Dispatcher>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (actions_tx, mut actions_rx) = mpsc::channel::<Action>(capacity);
        let (results_tx, results_rx) = mpsc::channel::<ActionResult>(capacity);
        let stop = Arc::new(StopSignal {
            notify: Notify::new(),
            stopped: AtomicBool::new(false),
        });
        let stop_task = stop.clone();

        let task = tokio::spawn(async move {
            debug!(target: "dispatch.async", capacity, "consumer started");
            loop {
                if stop_task.stopped.load(Ordering::SeqCst) {
                    break;
                }
                tokio::select! {
                    biased;
                    _ = stop_task.notify.notified() => break,
                    maybe = actions_rx.recv() => {
                        let Some(action) = maybe else { break };
                        let name = action.name.clone();
                        let result = dispatcher.dispatch(action);
                        match results_tx.try_send(result) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => {
                                RESULTS_DROPPED.fetch_add(1, Ordering::Relaxed);
                                warn!(target: "dispatch.async", action = %name, "result queue full; result dropped");
                            }
                            Err(TrySendError::Closed(_)) => break,
                        }
                    }
                }
            }
            debug!(target: "dispatch.async", "consumer stopped");
        });

        Self {
            actions: actions_tx,
            results: results_rx,
            stop,
            task,
        }
    }

    /// Enqueue an action, waiting for queue space. False once the consumer
    /// has stopped.
    pub async fn submit(&self, action: Action) -> bool {
        self.actions.send(action).await.is_ok()
    }

    /// Enqueue without waiting. False when the queue is full or closed.
    pub fn try_submit(&self, action: Action) -> bool {
        self.actions.try_send(action).is_ok()
    }

    /// Next result in submission order. `None` once the consumer is gone and
    /// the queue is drained.
    pub async fn next_result(&mut self) -> Option<ActionResult> {
        self.results.recv().await
    }

    /// Non-blocking result poll.
    pub fn try_next_result(&mut self) -> Option<ActionResult> {
        self.results.try_recv().ok()
    }

    /// Signal the consumer to exit after the in-flight dispatch. Idempotent.
    pub fn stop(&self) {
        self.stop.stopped.store(true, Ordering::SeqCst);
        self.stop.notify.notify_one();
    }

    /// Stop and wait for the consumer task to finish.
    pub async fn shutdown(self) {
        self.stop();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler_fn;
    use core_actions::Value;

    fn counting_dispatcher() -> Arc<Dispatcher> {
        let d = Dispatcher::default();
        d.registry().register(
            "test.echo",
            handler_fn(|action, _| {
                ActionResult::success().with_data(
                    "tag",
                    Value::Text(action.args.get("tag").unwrap_or("").to_string()),
                )
            }),
        );
        Arc::new(d)
    }

    #[tokio::test]
    async fn results_arrive_in_submission_order() {
        let mut q = AsyncDispatch::with_capacity(counting_dispatcher(), 32);
        for i in 0..10 {
            assert!(q.submit(Action::new("test.echo").with_arg("tag", i.to_string())).await);
        }
        for i in 0..10 {
            let r = q.next_result().await.expect("result expected");
            assert_eq!(r.data.get("tag"), Some(&Value::Text(i.to_string())));
        }
        q.shutdown().await;
    }

    #[tokio::test]
    async fn full_result_queue_drops_nonblocking() {
        let before = RESULTS_DROPPED.load(Ordering::Relaxed);
        let mut q = AsyncDispatch::with_capacity(counting_dispatcher(), 2);
        // Submit more than the result queue holds without draining it.
        for i in 0..6 {
            assert!(q.submit(Action::new("test.echo").with_arg("tag", i.to_string())).await);
        }
        // Give the consumer time to process everything.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let mut received = 0;
        while q.try_next_result().is_some() {
            received += 1;
        }
        assert!(received <= 2, "result queue capacity bounds delivery");
        assert!(
            RESULTS_DROPPED.load(Ordering::Relaxed) > before,
            "dropped results are counted"
        );
        q.shutdown().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_prevents_future_dispatch() {
        let dispatcher = counting_dispatcher();
        let q = AsyncDispatch::with_capacity(dispatcher.clone(), 8);
        q.stop();
        q.stop();
        q.shutdown().await;
        // The consumer is gone; metrics stay wherever they were.
        let total = dispatcher.metrics().global().total_dispatches;
        assert_eq!(total, 0);
    }
}
