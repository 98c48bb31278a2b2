//! Benchmark session state machine.
//!
//! ```text
//! idle -> connecting -> running -> cleaning_up -> completed
//!            |             |
//!            v             v
//!          error     error | stopped
//! ```
use crate::error::BenchError;
use crate::operation::{perform, Workload};
use crate::session::Session;
use crate::sink::EventSink;
use crate::store::{Connector, Store};
use kvbench_core::{
    BenchConfig, BenchEvent, IterationProgress, LatencyAccumulator, Message, OperationKind,
    OperationResult, Phase, PhaseProgress, Progress, SessionResults, SessionStatus, Started,
    PROGRESS_INTERVAL,
};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunnerState {
    Idle,
    Connecting,
    Running,
    CleaningUp,
    Completed,
    Error,
    Stopped,
}

impl RunnerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => RunnerState::Idle,
            1 => RunnerState::Connecting,
            2 => RunnerState::Running,
            3 => RunnerState::CleaningUp,
            4 => RunnerState::Completed,
            5 => RunnerState::Error,
            _ => RunnerState::Stopped,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunnerState::Completed | RunnerState::Error | RunnerState::Stopped
        )
    }
}

/// Cooperative cancellation for a running session.
///
/// Polled before each operation type and once more before cleanup; an
/// operation type that has already begun always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How a session ended. Mirrors the terminal event that was emitted.
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(SessionResults),
    Stopped,
    Failed(BenchError),
}

enum Flow {
    Finished,
    Stopped,
}

/// Runs a single benchmark session against a store.
///
/// A runner executes at most one session; a second call to [`BenchRunner::run`]
/// is rejected with [`BenchError::AlreadyRunning`] (or
/// [`BenchError::AlreadyFinished`]) without emitting any event.
pub struct BenchRunner<C, E> {
    id: Uuid,
    config: BenchConfig,
    connector: C,
    sink: E,
    stop: StopHandle,
    state: AtomicU8,
}

impl<C, E> BenchRunner<C, E>
where
    C: Connector,
    E: EventSink,
{
    pub fn new(config: BenchConfig, connector: C, sink: E) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            connector,
            sink,
            stop: StopHandle::default(),
            state: AtomicU8::new(RunnerState::Idle as u8),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn state(&self) -> RunnerState {
        RunnerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a stop. Takes effect before the next operation type begins.
    pub fn stop(&self) {
        self.stop.stop();
    }

    #[instrument(name = "session", skip_all, fields(id = %self.id))]
    pub async fn run(&self) -> Result<SessionOutcome, BenchError> {
        self.begin()?;
        info!(
            "Connecting to {} with config {:?}",
            self.config.address(),
            &self.config
        );

        let start = Instant::now();
        let mut session = Session::new(self.id, self.config.clone());

        let mut conn = match self.connector.connect(&self.config).await {
            Ok(conn) => conn,
            Err(err) => {
                error!("Connection failed: {err}");
                session.finish(SessionStatus::Error);
                return Ok(self.fail(BenchError::Connect(err)));
            }
        };

        self.sink.emit(BenchEvent::Started(Started {
            session_id: self.id,
            config: self.config.clone(),
            message: "Benchmark started".to_string(),
        }));
        self.phase(Phase::Connected, None, "Connected to store".to_string());

        let flow = self.drive(&mut conn, &mut session).await;

        if let Err(err) = conn.close().await {
            warn!("Error closing store connection: {err}");
        }

        let outcome = match flow {
            Ok(Flow::Finished) => {
                session.finish(SessionStatus::Completed);
                let results = session.results();
                info!(
                    "Session complete in {}: {} operations, {:.2}% success",
                    humantime::format_duration(start.elapsed()),
                    results.summary.total_operations,
                    results.summary.success_rate,
                );
                self.set_state(RunnerState::Completed);
                self.sink.emit(BenchEvent::Completed(results.clone()));
                SessionOutcome::Completed(results)
            }
            Ok(Flow::Stopped) => {
                session.finish(SessionStatus::Stopped);
                info!(
                    "Session stopped after {}",
                    humantime::format_duration(start.elapsed())
                );
                self.set_state(RunnerState::Stopped);
                self.sink
                    .emit(BenchEvent::Stopped(Message::new("Benchmark stopped")));
                SessionOutcome::Stopped
            }
            Err(err) => {
                session.finish(SessionStatus::Error);
                self.fail(err)
            }
        };
        debug!("Session finished as {:?}", session.status());

        Ok(outcome)
    }

    fn begin(&self) -> Result<(), BenchError> {
        self.state
            .compare_exchange(
                RunnerState::Idle as u8,
                RunnerState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| {
                if RunnerState::from_u8(current).is_terminal() {
                    BenchError::AlreadyFinished
                } else {
                    BenchError::AlreadyRunning
                }
            })
    }

    async fn drive<S: Store>(
        &self,
        conn: &mut S,
        session: &mut Session,
    ) -> Result<Flow, BenchError> {
        self.set_state(RunnerState::Running);

        let types = self.config.test_types();
        let iterations = self.config.iterations_per_operation();
        let mut workload = Workload::new(session.key_prefix(), self.config.value_size(), iterations);

        self.phase(
            Phase::Starting,
            None,
            format!(
                "Starting benchmark: {iterations} iterations x {} operation types",
                types.len()
            ),
        );

        for &kind in types {
            if self.stop.is_stopped() {
                info!("Stop requested, skipping {kind} and remaining operations.");
                return Ok(Flow::Stopped);
            }

            self.phase(Phase::Testing, Some(kind), format!("Testing {kind}"));
            let result = self
                .run_operation(conn, session, &mut workload, kind, iterations)
                .await?;

            info!(
                "{kind}: {}/{} ok, avg={:.3}ms p50={:.3}ms p95={:.3}ms p99={:.3}ms, {:.0} ops/s",
                result.successes,
                result.iterations,
                result.avg_time,
                result.p50,
                result.p95,
                result.p99,
                result.ops,
            );
            session.push_result(result.clone());
            self.sink.emit(BenchEvent::Result(result));
        }

        if self.stop.is_stopped() {
            info!("Stop requested, skipping cleanup.");
            return Ok(Flow::Stopped);
        }

        self.set_state(RunnerState::CleaningUp);
        self.phase(Phase::Cleanup, None, "Cleaning up test data".to_string());
        cleanup(conn, &workload.cleanup_pattern()).await;

        Ok(Flow::Finished)
    }

    async fn run_operation<S: Store>(
        &self,
        conn: &mut S,
        session: &mut Session,
        workload: &mut Workload,
        kind: OperationKind,
        iterations: u64,
    ) -> Result<OperationResult, BenchError> {
        let mut acc = LatencyAccumulator::new(kind, iterations);

        for i in 0..iterations {
            let op = workload.operation(kind, i);
            let sample = perform(conn, &op, workload.payload()).await;

            match sample.outcome {
                Ok(()) => acc.record_success(sample.elapsed),
                Err(err) => {
                    trace!("{kind} failed on {}: {err}", op.key());
                    acc.record_failure();
                    session.record_error(&op, &err);

                    if err.is_fatal() {
                        error!("Unrecoverable store failure during {kind}: {err}");
                        return Err(BenchError::Store(err));
                    }
                }
            }

            if i % PROGRESS_INTERVAL == 0 {
                self.sink
                    .emit(BenchEvent::Progress(Progress::Iteration(IterationProgress {
                        operation: kind,
                        completed: i + 1,
                        total: iterations,
                        avg_time_ms: acc.avg_ms(),
                    })));
            }
        }

        Ok(acc.finish())
    }

    fn fail(&self, err: BenchError) -> SessionOutcome {
        error!("Session failed: {err}");
        self.set_state(RunnerState::Error);
        self.sink
            .emit(BenchEvent::Error(Message::new(err.to_string())));
        SessionOutcome::Failed(err)
    }

    fn phase(&self, phase: Phase, operation: Option<OperationKind>, message: String) {
        debug!("{message}");
        self.sink
            .emit(BenchEvent::Progress(Progress::Phase(PhaseProgress {
                phase,
                operation,
                message,
            })));
    }

    fn set_state(&self, state: RunnerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Best-effort removal of every key under the session prefix. Failures are
/// logged and never change the session outcome.
async fn cleanup<S: Store>(conn: &mut S, pattern: &str) {
    let keys = match conn.keys(pattern).await {
        Ok(keys) => keys,
        Err(err) => {
            warn!("Error listing test keys for cleanup: {err}");
            return;
        }
    };

    match conn.del(&keys).await {
        Ok(removed) => debug!("Cleanup removed {removed} keys."),
        Err(err) => warn!("Error deleting test keys during cleanup: {err}"),
    }
}
