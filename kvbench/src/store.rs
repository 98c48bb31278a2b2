//! Store abstraction the runner drives.
//!
//! A [`Connector`] opens a connection; the connection implements [`Store`].
//! Both traits are generated with `trait_variant` so the runner's futures stay
//! `Send` and can be spawned onto a multi-threaded runtime.
use kvbench_core::BenchConfig;
use thiserror::Error;

#[cfg(feature = "redis")]
mod redis_store;

#[cfg(feature = "redis")]
pub use redis_store::{RedisConnector, RedisStore};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("unable to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("{0}")]
    Command(String),

    #[error("connection lost: {0}")]
    Disconnected(String),
}

impl StoreError {
    /// The connection cannot be used any further.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Disconnected(_))
    }
}

#[trait_variant::make(Connector: Send)]
pub trait LocalConnector {
    type Connection: Store;

    async fn connect(&self, config: &BenchConfig) -> Result<Self::Connection, StoreError>;
}

#[trait_variant::make(Store: Send)]
pub trait LocalStore {
    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Keys matching a glob-style pattern, e.g. `prefix:*`.
    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Returns the number of keys removed.
    async fn del(&mut self, keys: &[String]) -> Result<u64, StoreError>;

    async fn close(self) -> Result<(), StoreError>;
}
