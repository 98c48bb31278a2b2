use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("benchmark session already running")]
    AlreadyRunning,

    #[error("benchmark session already finished")]
    AlreadyFinished,

    #[error("{0}")]
    Connect(#[source] StoreError),

    #[error("store failure during benchmark: {0}")]
    Store(#[from] StoreError),
}
