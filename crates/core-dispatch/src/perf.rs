//! Latency tracking beyond the plain metrics table: online mean/variance via
//! Welford's algorithm plus a fixed bucket histogram for percentile
//! estimates, with deterministic sampling and a slow-dispatch callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::warn;

/// Upper bounds of the first nine histogram buckets, in microseconds. The
/// tenth bucket is unbounded.
pub const HISTOGRAM_BOUNDS_US: [u64; 9] = [10, 50, 100, 500, 1_000, 5_000, 10_000, 50_000, 100_000];

/// Midpoint duration assumed for the unbounded tail bucket.
const TAIL_BUCKET_NS: f64 = 100_000_000.0; // 100 ms

/// Online latency aggregate for one action.
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    count: u64,
    min_ns: f64,
    max_ns: f64,
    mean_ns: f64,
    m2: f64,
    buckets: [u64; 10],
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self {
            count: 0,
            min_ns: f64::INFINITY,
            max_ns: 0.0,
            mean_ns: 0.0,
            m2: 0.0,
            buckets: [0; 10],
        }
    }

    pub fn record(&mut self, duration: Duration) {
        let ns = duration.as_nanos() as f64;
        self.count += 1;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        // Welford's online update.
        let delta = ns - self.mean_ns;
        self.mean_ns += delta / self.count as f64;
        self.m2 += delta * (ns - self.mean_ns);

        let us = duration.as_micros() as u64;
        let idx = HISTOGRAM_BOUNDS_US
            .iter()
            .position(|&bound| us <= bound)
            .unwrap_or(HISTOGRAM_BOUNDS_US.len());
        self.buckets[idx] += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn stats(&self) -> LatencyStats {
        let variance = if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        };
        LatencyStats {
            count: self.count,
            min_ns: if self.count == 0 { 0.0 } else { self.min_ns },
            max_ns: self.max_ns,
            mean_ns: self.mean_ns,
            stddev_ns: variance.sqrt(),
            p50_ns: self.percentile(0.50),
            p95_ns: self.percentile(0.95),
            p99_ns: self.percentile(0.99),
        }
    }

    /// Percentile estimate as the midpoint of the containing bucket.
    fn percentile(&self, q: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let rank = (q * self.count as f64).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (idx, &n) in self.buckets.iter().enumerate() {
            seen += n;
            if seen >= rank {
                return bucket_midpoint_ns(idx);
            }
        }
        TAIL_BUCKET_NS
    }
}

fn bucket_midpoint_ns(idx: usize) -> f64 {
    if idx >= HISTOGRAM_BOUNDS_US.len() {
        return TAIL_BUCKET_NS;
    }
    let upper = HISTOGRAM_BOUNDS_US[idx];
    let lower = if idx == 0 { 0 } else { HISTOGRAM_BOUNDS_US[idx - 1] };
    ((lower + upper) as f64 / 2.0) * 1_000.0
}

/// Snapshot of one tracker. All figures in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub min_ns: f64,
    pub max_ns: f64,
    pub mean_ns: f64,
    pub stddev_ns: f64,
    pub p50_ns: f64,
    pub p95_ns: f64,
    pub p99_ns: f64,
}

type SlowCallback = Box<dyn Fn(&str, Duration) + Send + Sync>;

/// Per-action latency monitor with deterministic sampling.
///
/// Sampling: the `n`-th observation is tracked iff `n % 100 < rate * 100`,
/// so a rate of 1.0 tracks everything and 0.25 tracks a fixed quarter of the
/// stream. The slow-threshold callback fires for every observation over the
/// threshold, sampled or not.
pub struct PerfMonitor {
    trackers: Mutex<HashMap<String, LatencyTracker>>,
    counter: AtomicU64,
    rate_pct: u64,
    slow_threshold: Mutex<Option<(Duration, SlowCallback)>>,
}

impl Default for PerfMonitor {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PerfMonitor {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            trackers: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            rate_pct: (sample_rate.clamp(0.0, 1.0) * 100.0) as u64,
            slow_threshold: Mutex::new(None),
        }
    }

    /// Install (or replace) the slow-dispatch callback.
    pub fn set_slow_threshold<F>(&self, threshold: Duration, callback: F)
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        *self
            .slow_threshold
            .lock()
            .expect("perf lock poisoned") = Some((threshold, Box::new(callback)));
    }

    pub fn record(&self, name: &str, duration: Duration) {
        {
            let slow = self.slow_threshold.lock().expect("perf lock poisoned");
            if let Some((threshold, callback)) = slow.as_ref()
                && duration > *threshold
            {
                warn!(target: "dispatch.metrics", action = name, elapsed_us = duration.as_micros() as u64, "slow dispatch");
                callback(name, duration);
            }
        }
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        if n % 100 >= self.rate_pct {
            return;
        }
        let mut trackers = self.trackers.lock().expect("perf lock poisoned");
        trackers.entry(name.to_string()).or_default().record(duration);
    }

    /// Snapshot of one action's latency stats.
    pub fn stats(&self, name: &str) -> Option<LatencyStats> {
        let trackers = self.trackers.lock().expect("perf lock poisoned");
        trackers.get(name).map(LatencyTracker::stats)
    }
}
