//! In-process environment event bus backed by a tokio broadcast channel.
//!
//! The host application publishes [`EnvironmentEvent`]s here; the engine
//! subscribes at `start()` and unsubscribes (by dropping its receiver)
//! at `stop()`.

use tokio::sync::broadcast;

use cadence_domain::event::EnvironmentEvent;

/// Typed event bus using a tokio [`broadcast`] channel.
///
/// Publishing succeeds even when there are no active subscribers
/// (the event is simply dropped).
pub struct EnvironmentBus {
    sender: broadcast::Sender<EnvironmentEvent>,
}

impl EnvironmentBus {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EnvironmentEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: EnvironmentEvent) {
        // broadcast::send fails only when there are zero receivers,
        // which is fine: nobody was listening.
        let _ = self.sender.send(event);
    }
}
