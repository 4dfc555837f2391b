use tokio::sync::broadcast;

use crate::mailbox::Message;

/// A state-change notification observers can react to without polling the
/// store.
#[derive(Debug, Clone)]
pub enum MailboxEvent {
    /// Bulk fetch applied; carries the new list length.
    Loaded { count: usize },
    /// A message arrived on the live feed and was merged.
    MessageArrived(Box<Message>),
    /// A message was removed locally after a successful remote delete.
    MessageRemoved { id: String },
    /// The mailbox was cleared.
    Cleared,
    /// The live feed (re)connected.
    FeedConnected,
    /// The live feed dropped; a reconnect is pending.
    FeedDisconnected,
}

/// Broadcasts [`MailboxEvent`]s to all subscribed observers.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<MailboxEvent>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send an event to all subscribers.
    pub fn broadcast(&self, event: MailboxEvent) {
        // Ignore errors — no subscribers is fine
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> broadcast::Receiver<MailboxEvent> {
        self.tx.subscribe()
    }
}
