use kvbench_core::ValidationErrors;
use std::sync::PoisonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0}")]
    Invalid(#[from] ValidationErrors),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Unable to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("Session registry mutex is poisoned.")]
    PoisonData,
}

impl<T> From<PoisonError<T>> for RuntimeError {
    fn from(_err: PoisonError<T>) -> Self {
        Self::PoisonData
    }
}
