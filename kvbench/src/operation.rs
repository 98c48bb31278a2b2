use crate::store::{Store, StoreError};
use kvbench_core::{OperationKind, FIELDS_PER_HASH};
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

/// One concrete store call, with its key (and field) already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operation {
    Set { key: String },
    Get { key: String },
    HSet { key: String, field: String },
    HGet { key: String, field: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Set { .. } => OperationKind::Set,
            Operation::Get { .. } => OperationKind::Get,
            Operation::HSet { .. } => OperationKind::HSet,
            Operation::HGet { .. } => OperationKind::HGet,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Operation::Set { key }
            | Operation::Get { key }
            | Operation::HSet { key, .. }
            | Operation::HGet { key, .. } => key.as_str(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Operation::HSet { field, .. } | Operation::HGet { field, .. } => Some(field.as_str()),
            _ => None,
        }
    }
}

/// Key derivation for one session.
///
/// Writes use the iteration index directly so that reads, which pick a random
/// index in `[0, iterations)`, land on keys written earlier in the session.
pub(crate) struct Workload {
    prefix: String,
    payload: String,
    iterations: u64,
    rng: SmallRng,
}

impl Workload {
    pub fn new(prefix: impl Into<String>, value_size: usize, iterations: u64) -> Self {
        let mut rng = SmallRng::from_entropy();
        let payload = Alphanumeric.sample_string(&mut rng, value_size);
        Self {
            prefix: prefix.into(),
            payload,
            iterations: iterations.max(1),
            rng,
        }
    }

    /// Random payload generated once per session.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn cleanup_pattern(&self) -> String {
        format!("{}:*", self.prefix)
    }

    pub fn operation(&mut self, kind: OperationKind, i: u64) -> Operation {
        let prefix = &self.prefix;
        match kind {
            OperationKind::Set => Operation::Set {
                key: format!("{prefix}:set:{i}"),
            },
            OperationKind::Get => {
                let idx = self.rng.gen_range(0..self.iterations);
                Operation::Get {
                    key: format!("{prefix}:set:{idx}"),
                }
            }
            OperationKind::HSet => Operation::HSet {
                key: format!("{prefix}:hash:{}", i / FIELDS_PER_HASH),
                field: format!("field:{i}"),
            },
            OperationKind::HGet => {
                let hash = self
                    .rng
                    .gen_range(0..self.iterations.div_ceil(FIELDS_PER_HASH));
                let field = self.rng.gen_range(0..self.iterations);
                Operation::HGet {
                    key: format!("{prefix}:hash:{hash}"),
                    field: format!("field:{field}"),
                }
            }
        }
    }
}

/// One timed store call.
pub(crate) struct Sample {
    pub elapsed: Duration,
    pub outcome: Result<(), StoreError>,
}

/// Issue `op` against the store, timing only the store round-trip.
pub(crate) async fn perform<S: Store>(conn: &mut S, op: &Operation, payload: &str) -> Sample {
    let start = Instant::now();
    let outcome = match op {
        Operation::Set { key } => conn.set(key, payload).await,
        Operation::Get { key } => conn.get(key).await.map(drop),
        Operation::HSet { key, field } => conn.hset(key, field, payload).await,
        Operation::HGet { key, field } => conn.hget(key, field).await.map(drop),
    };
    let elapsed = start.elapsed();

    #[cfg(feature = "metrics")]
    record_metrics(op.kind(), elapsed, outcome.is_ok());

    Sample { elapsed, outcome }
}

#[cfg(feature = "metrics")]
fn record_metrics(kind: OperationKind, elapsed: Duration, success: bool) {
    let operation = kind.as_str();
    metrics::histogram!("kvbench_operation_latency_seconds", "operation" => operation)
        .record(elapsed.as_secs_f64());

    if success {
        metrics::counter!("kvbench_operation_success_total", "operation" => operation)
            .increment(1);
    } else {
        metrics::counter!("kvbench_operation_error_total", "operation" => operation).increment(1);
    }
}
