#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
mod operation;
pub mod runner;
mod session;
pub mod sink;
pub mod store;

pub use error::BenchError;
pub use runner::{BenchRunner, RunnerState, SessionOutcome, StopHandle};
pub use sink::EventSink;
pub use store::{Connector, Store, StoreError};

#[cfg(feature = "redis")]
pub use store::{RedisConnector, RedisStore};

pub use kvbench_core as types;

pub mod prelude {
    pub use crate::runner::{BenchRunner, SessionOutcome, StopHandle};
    pub use crate::sink::EventSink;
    pub use crate::store::{Connector, Store};

    #[cfg(feature = "redis")]
    pub use crate::store::RedisConnector;

    pub use kvbench_core::{BenchConfig, BenchEvent, RawConfig, Report};
}
