//! Network surface and CLI for `kvbench`.
//!
//! [`KvBenchRuntime`] either serves the event relay (`serve`) or runs a single
//! session in the foreground and prints its report (`run`).
pub mod runtime;

mod error;
mod message;
mod server;

pub use crate::error::RuntimeError;
pub use crate::message::{ClientMessage, Control, ServerMessage, SessionInfo, StatusReport};
pub use crate::runtime::KvBenchRuntime;
pub use crate::server::router;
