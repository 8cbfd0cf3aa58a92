// LogTail - app/dispatch.rs
//
// Event Dispatcher: synchronous fan-out of engine events to every registered
// consumer. An event is delivered to all sinks before the engine moves on to
// the next notice for that file. Sinks must return promptly; buffering for
// slow consumers is the sink's own concern (see `ChannelSink`).

use crate::core::model::TailEvent;
use std::sync::{mpsc, Arc, PoisonError, RwLock};

/// A consumer of engine events.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: &TailEvent);
}

impl<F> EventSink for F
where
    F: Fn(&TailEvent) + Send + Sync,
{
    fn deliver(&self, event: &TailEvent) {
        self(event)
    }
}

/// Forwards every event over an mpsc channel, so a UI or renderer thread can
/// drain them at its own pace. A dropped receiver is ignored.
pub struct ChannelSink {
    tx: mpsc::Sender<TailEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new() -> (Self, mpsc::Receiver<TailEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn deliver(&self, event: &TailEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Registered sinks, shared by the engine and its worker.
#[derive(Default)]
pub struct Dispatcher {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn EventSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver `event` to every sink, in registration order.
    pub fn dispatch(&self, event: TailEvent) {
        // Snapshot so a sink may register another sink without deadlocking.
        let sinks: Vec<Arc<dyn EventSink>> = self
            .sinks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for sink in &sinks {
            sink.deliver(&event);
        }
    }
}
