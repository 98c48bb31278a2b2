use crate::config::{BenchConfig, OperationKind};
use crate::data::{OperationResult, SessionResults};
use serde::Serialize;
use uuid::Uuid;

/// Session lifecycle notifications, in emission order:
/// `Started`, then any number of `Progress`/`Result`, then exactly one of
/// `Completed`, `Error` or `Stopped`.
///
/// Serializes as `{"event": "<name>", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum BenchEvent {
    Started(Started),
    Progress(Progress),
    Result(OperationResult),
    Completed(SessionResults),
    Error(Message),
    Stopped(Message),
}

impl BenchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BenchEvent::Completed(_) | BenchEvent::Error(_) | BenchEvent::Stopped(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            BenchEvent::Started(_) => "started",
            BenchEvent::Progress(_) => "progress",
            BenchEvent::Result(_) => "result",
            BenchEvent::Completed(_) => "completed",
            BenchEvent::Error(_) => "error",
            BenchEvent::Stopped(_) => "stopped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Started {
    pub session_id: Uuid,
    pub config: BenchConfig,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Progress {
    Iteration(IterationProgress),
    Phase(PhaseProgress),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationProgress {
    pub operation: OperationKind,
    pub completed: u64,
    pub total: u64,
    pub avg_time_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Connected,
    Starting,
    Testing,
    Cleanup,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseProgress {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationKind>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
