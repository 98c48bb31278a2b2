use crate::operation::Operation;
use crate::store::StoreError;
use kvbench_core::{
    BenchConfig, ErrorRecord, OperationResult, SessionResults, SessionStatus, Summary, KEY_PREFIX,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// Mutable state of one benchmark execution, written only by the run loop.
#[derive(Debug)]
pub(crate) struct Session {
    id: Uuid,
    config: BenchConfig,
    started_at: OffsetDateTime,
    ended_at: Option<OffsetDateTime>,
    status: SessionStatus,
    results: Vec<OperationResult>,
    errors: Vec<ErrorRecord>,
}

impl Session {
    pub fn new(id: Uuid, config: BenchConfig) -> Self {
        Self {
            id,
            config,
            started_at: OffsetDateTime::now_utc(),
            ended_at: None,
            status: SessionStatus::Running,
            results: vec![],
            errors: vec![],
        }
    }

    /// Namespace for every key this session writes.
    pub fn key_prefix(&self) -> String {
        format!("{KEY_PREFIX}_{}", self.id.simple())
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn record_error(&mut self, op: &Operation, err: &StoreError) {
        self.errors.push(ErrorRecord {
            operation: op.kind(),
            key: op.key().to_string(),
            field: op.field().map(str::to_string),
            error: err.to_string(),
            timestamp: OffsetDateTime::now_utc(),
        });
    }

    pub fn push_result(&mut self, result: OperationResult) {
        self.results.push(result);
    }

    pub fn finish(&mut self, status: SessionStatus) {
        self.status = status;
        self.ended_at = Some(OffsetDateTime::now_utc());
    }

    /// Results plus [`Summary`]. Only meaningful once the session has finished.
    pub fn results(&self) -> SessionResults {
        let ended_at = self.ended_at.unwrap_or_else(OffsetDateTime::now_utc);
        let summary = Summary::new(
            &self.results,
            self.errors.len(),
            &self.config,
            self.started_at,
            ended_at,
        );

        SessionResults {
            details: self.results.clone(),
            summary,
            errors: self.errors.clone(),
        }
    }
}
