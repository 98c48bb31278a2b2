use crate::config::{BenchConfig, OperationKind};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;

/// Aggregate over all samples of one operation type. Latencies are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub operation: OperationKind,
    pub iterations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_time: f64,
    pub avg_time: f64,
    pub min_time: f64,
    pub max_time: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    /// Successful operations per second
    pub ops: f64,
}

impl OperationResult {
    pub fn success_rate(&self) -> f64 {
        if self.iterations == 0 {
            0.
        } else {
            self.successes as f64 / self.iterations as f64 * 100.
        }
    }
}

/// A single failed store call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub operation: OperationKind,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub error: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Error,
    Stopped,
}

/// Read-only roll-up over a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Wall-clock duration of the session in milliseconds
    pub test_duration: u64,
    pub total_operations: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Percentage in `[0, 100]`
    pub success_rate: f64,
    /// Sum of the per-operation throughputs
    pub avg_ops_per_second: f64,
    pub start_time: String,
    pub end_time: String,
    pub error_count: usize,
    pub config: BenchConfig,
}

impl Summary {
    pub fn new(
        details: &[OperationResult],
        error_count: usize,
        config: &BenchConfig,
        started_at: OffsetDateTime,
        ended_at: OffsetDateTime,
    ) -> Self {
        let total_operations = details.iter().map(|r| r.iterations).sum::<u64>();
        let total_successes = details.iter().map(|r| r.successes).sum::<u64>();
        let total_failures = details.iter().map(|r| r.failures).sum::<u64>();
        let avg_ops_per_second = details.iter().map(|r| r.ops).sum::<f64>();

        let success_rate = if total_operations == 0 {
            0.
        } else {
            total_successes as f64 / total_operations as f64 * 100.
        };

        let test_duration = (ended_at - started_at).whole_milliseconds().max(0) as u64;

        Self {
            test_duration,
            total_operations,
            total_successes,
            total_failures,
            success_rate,
            avg_ops_per_second,
            start_time: format_timestamp(started_at),
            end_time: format_timestamp(ended_at),
            error_count,
            config: config.clone(),
        }
    }
}

/// Everything delivered with the `completed` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResults {
    #[serde(serialize_with = "details_as_map")]
    pub details: Vec<OperationResult>,
    pub summary: Summary,
    pub errors: Vec<ErrorRecord>,
}

impl SessionResults {
    pub fn detail(&self, operation: OperationKind) -> Option<&OperationResult> {
        self.details.iter().find(|r| r.operation == operation)
    }
}

// Keyed by operation name, in run order.
fn details_as_map<S: Serializer>(details: &[OperationResult], s: S) -> Result<S::Ok, S::Error> {
    let mut map = s.serialize_map(Some(details.len()))?;
    for result in details {
        map.serialize_entry(result.operation.as_str(), result)?;
    }
    map.end()
}

/// `YYYY-MM-DD HH:MM:SS`
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    ts.format(&format).unwrap_or_else(|_| ts.to_string())
}
