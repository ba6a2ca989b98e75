//! Observer registry for history changes
//!
//! Synchronous fan-out in registration order. Observers get a borrowed event
//! whose payload is already a clone of the stored entry.

use crate::interface::HistoryEvent;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

/// Receives history change notifications
pub trait HistoryObserver {
    fn on_event(&mut self, event: &HistoryEvent);
}

impl<F> HistoryObserver for F
where
    F: FnMut(&HistoryEvent),
{
    fn on_event(&mut self, event: &HistoryEvent) {
        self(event)
    }
}

/// Forwards events into a channel, for consumers living on another task
pub struct ChannelObserver {
    tx: UnboundedSender<HistoryEvent>,
}

impl ChannelObserver {
    pub fn new(tx: UnboundedSender<HistoryEvent>) -> Self {
        Self { tx }
    }
}

impl HistoryObserver for ChannelObserver {
    fn on_event(&mut self, event: &HistoryEvent) {
        if self.tx.send(event.clone()).is_err() {
            trace!(kind = ?event.kind(), "event receiver dropped");
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn HistoryObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: impl HistoryObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn add_boxed(&mut self, observer: Box<dyn HistoryObserver>) {
        self.observers.push(observer);
    }

    /// Register a channel observer and hand back its receiving end
    pub fn subscribe_channel(&mut self) -> UnboundedReceiver<HistoryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_observer(ChannelObserver::new(tx));
        rx
    }

    pub fn notify(&mut self, event: HistoryEvent) {
        trace!(
            kind = ?event.kind(),
            id = ?event.entry().and_then(|e| e.id),
            observers = self.observers.len(),
            "firing history event"
        );
        for observer in &mut self.observers {
            observer.on_event(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventBus({} observers)", self.observers.len())
    }
}
