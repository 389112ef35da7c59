//! Per-action dispatch metrics.
//!
//! Updates happen inside one short critical section per dispatch; every read
//! returns copies, never live references into the table.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use core_actions::ActionStatus;

/// Aggregates for one action name.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStats {
    pub count: u64,
    pub total_duration: Duration,
    pub min: Duration,
    pub max: Duration,
    pub last_status: ActionStatus,
    pub last_time: Instant,
    pub error_count: u64,
}

impl ActionStats {
    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

/// Whole-dispatcher aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub total_dispatches: u64,
    pub total_duration: Duration,
    pub total_errors: u64,
}

#[derive(Default)]
struct Inner {
    actions: HashMap<String, ActionStats>,
    global: GlobalStats,
}

#[derive(Default)]
pub struct MetricsRegistry {
    inner: Mutex<Inner>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &str, duration: Duration, status: ActionStatus) {
        let now = Instant::now();
        let is_error = matches!(status, ActionStatus::Error);
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        inner.global.total_dispatches += 1;
        inner.global.total_duration += duration;
        if is_error {
            inner.global.total_errors += 1;
        }
        match inner.actions.get_mut(name) {
            Some(stats) => {
                stats.count += 1;
                stats.total_duration += duration;
                stats.min = stats.min.min(duration);
                stats.max = stats.max.max(duration);
                stats.last_status = status;
                stats.last_time = now;
                if is_error {
                    stats.error_count += 1;
                }
            }
            None => {
                inner.actions.insert(
                    name.to_string(),
                    ActionStats {
                        count: 1,
                        total_duration: duration,
                        min: duration,
                        max: duration,
                        last_status: status,
                        last_time: now,
                        error_count: is_error as u64,
                    },
                );
            }
        }
    }

    /// Copy of the stats for one action.
    pub fn action(&self, name: &str) -> Option<ActionStats> {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        inner.actions.get(name).cloned()
    }

    pub fn global(&self) -> GlobalStats {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        inner.global
    }

    /// The `n` most dispatched actions, descending by count.
    pub fn top_actions(&self, n: usize) -> Vec<(String, ActionStats)> {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        let mut all: Vec<(String, ActionStats)> = inner
            .actions
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }

    /// The `n` slowest actions, descending by average duration.
    pub fn slowest_actions(&self, n: usize) -> Vec<(String, ActionStats)> {
        let inner = self.inner.lock().expect("metrics lock poisoned");
        let mut all: Vec<(String, ActionStats)> = inner
            .actions
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        all.sort_by(|a, b| b.1.average().cmp(&a.1.average()).then(a.0.cmp(&b.0)));
        all.truncate(n);
        all
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("metrics lock poisoned");
        *inner = Inner::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_accumulates_per_action_and_global() {
        let m = MetricsRegistry::new();
        m.record("a", Duration::from_micros(10), ActionStatus::Ok);
        m.record("a", Duration::from_micros(30), ActionStatus::Error);
        m.record("b", Duration::from_micros(5), ActionStatus::NoOp);

        let a = m.action("a").unwrap();
        assert_eq!(a.count, 2);
        assert_eq!(a.total_duration, Duration::from_micros(40));
        assert_eq!(a.min, Duration::from_micros(10));
        assert_eq!(a.max, Duration::from_micros(30));
        assert_eq!(a.error_count, 1);
        assert_eq!(a.last_status, ActionStatus::Error);
        assert_eq!(a.average(), Duration::from_micros(20));

        let g = m.global();
        assert_eq!(g.total_dispatches, 3);
        assert_eq!(g.total_duration, Duration::from_micros(45));
        assert_eq!(g.total_errors, 1);
        assert!(m.action("missing").is_none());
    }

    #[test]
    fn total_duration_grows_by_exactly_each_dispatch() {
        let m = MetricsRegistry::new();
        let mut expected = Duration::ZERO;
        for us in [3u64, 7, 11] {
            let before = m.global().total_dispatches;
            m.record("x", Duration::from_micros(us), ActionStatus::Ok);
            expected += Duration::from_micros(us);
            assert_eq!(m.global().total_dispatches, before + 1);
            assert_eq!(m.global().total_duration, expected);
        }
    }

    #[test]
    fn top_and_slowest_queries() {
        let m = MetricsRegistry::new();
        for _ in 0..3 {
            m.record("frequent", Duration::from_micros(1), ActionStatus::Ok);
        }
        m.record("slow", Duration::from_millis(5), ActionStatus::Ok);

        let top = m.top_actions(1);
        assert_eq!(top[0].0, "frequent");
        let slowest = m.slowest_actions(1);
        assert_eq!(slowest[0].0, "slow");
        assert_eq!(m.top_actions(10).len(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let m = MetricsRegistry::new();
        m.record("x", Duration::from_micros(1), ActionStatus::Ok);
        m.reset();
        assert_eq!(m.global(), GlobalStats::default());
        assert!(m.action("x").is_none());
    }
}
