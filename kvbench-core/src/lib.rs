//! Plain data types shared by the kvbench engine and its runtime: configuration
//! and validation, results, lifecycle events and latency statistics.
mod config;
mod constants;
mod data;
mod event;
mod report;
mod stats;

pub use config::*;
pub use constants::*;
pub use data::*;
pub use event::*;
pub use report::*;
pub use stats::*;
