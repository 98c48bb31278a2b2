//! Observer side of the runner. The runner only ever calls [`EventSink::emit`];
//! what happens to the event afterwards is up to the caller.
use kvbench_core::BenchEvent;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, warn};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: BenchEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: BenchEvent) {
        (**self).emit(event)
    }
}

impl EventSink for tokio::sync::mpsc::UnboundedSender<BenchEvent> {
    fn emit(&self, event: BenchEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver dropped.");
        }
    }
}

impl EventSink for async_channel::Sender<BenchEvent> {
    fn emit(&self, event: BenchEvent) {
        match self.try_send(event) {
            Ok(()) => {}
            Err(async_channel::TrySendError::Full(event)) => {
                warn!("Event channel full, dropping {} event.", event.name());
            }
            Err(async_channel::TrySendError::Closed(_)) => {
                debug!("Event receiver dropped.");
            }
        }
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(F);

pub fn from_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(BenchEvent) + Send + Sync,
{
    FnSink(f)
}

impl<F> EventSink for FnSink<F>
where
    F: Fn(BenchEvent) + Send + Sync,
{
    fn emit(&self, event: BenchEvent) {
        (self.0)(event)
    }
}
