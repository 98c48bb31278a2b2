use crate::config::OperationKind;
use crate::data::OperationResult;
use std::time::Duration;

/// Nearest-rank percentile over `samples`.
///
/// Sorts a copy, takes index `ceil(n * p / 100) - 1` clamped to `[0, n - 1]`.
/// Returns `None` for an empty slice.
pub fn percentile(samples: &[Duration], p: f64) -> Option<Duration> {
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    percentile_sorted(&sorted, p)
}

/// Same as [`percentile`] for input already sorted ascending.
pub fn percentile_sorted(sorted: &[Duration], p: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }

    let rank = (sorted.len() as f64 * p / 100.).ceil() as i64 - 1;
    let idx = rank.clamp(0, sorted.len() as i64 - 1) as usize;
    Some(sorted[idx])
}

pub fn as_millis_f64(dur: Duration) -> f64 {
    dur.as_secs_f64() * 1_000.
}

/// Running totals for one operation type, owned by the run loop.
#[derive(Debug, Clone)]
pub struct LatencyAccumulator {
    operation: OperationKind,
    iterations: u64,
    successes: u64,
    failures: u64,
    total: Duration,
    min: Option<Duration>,
    max: Duration,
    samples: Vec<Duration>,
}

impl LatencyAccumulator {
    pub fn new(operation: OperationKind, iterations: u64) -> Self {
        Self {
            operation,
            iterations,
            successes: 0,
            failures: 0,
            total: Duration::ZERO,
            min: None,
            max: Duration::ZERO,
            samples: Vec::with_capacity(iterations as usize),
        }
    }

    pub fn record_success(&mut self, elapsed: Duration) {
        self.successes += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |m| m.min(elapsed)));
        self.max = self.max.max(elapsed);
        self.samples.push(elapsed);
    }

    /// Failed operations count toward the totals but never the latency figures.
    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn completed(&self) -> u64 {
        self.successes + self.failures
    }

    /// Mean latency of successful operations so far, 0 with no successes.
    pub fn avg_ms(&self) -> f64 {
        if self.successes == 0 {
            0.
        } else {
            as_millis_f64(self.total) / self.successes as f64
        }
    }

    /// Successful operations per second of accumulated store time.
    pub fn throughput(&self) -> f64 {
        let secs = self.total.as_secs_f64();
        if secs > 0. {
            self.successes as f64 / secs
        } else {
            0.
        }
    }

    /// Freeze into an [`OperationResult`]. Percentiles are computed once, here.
    pub fn finish(mut self) -> OperationResult {
        debug_assert_eq!(self.completed(), self.iterations);
        self.samples.sort_unstable();
        let pct = |p| percentile_sorted(&self.samples, p).map_or(0., as_millis_f64);

        OperationResult {
            operation: self.operation,
            iterations: self.iterations,
            successes: self.successes,
            failures: self.failures,
            total_time: as_millis_f64(self.total),
            avg_time: self.avg_ms(),
            min_time: self.min.map_or(0., as_millis_f64),
            max_time: as_millis_f64(self.max),
            p50: pct(50.),
            p95: pct(95.),
            p99: pct(99.),
            ops: self.throughput(),
        }
    }
}
