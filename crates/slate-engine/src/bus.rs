use tokio::sync::broadcast;

use crate::change::ChangeEvent;

/// The default channel capacity, chosen to absorb a burst of bulk writes
/// without forcing slow subscribers to miss ordinary single-document
/// mutations. Subscribers that fall further behind than this drop the
/// oldest undelivered events rather than stall the writer.
const DEFAULT_CAPACITY: usize = 1024;

/// Bounded multi-producer, multi-subscriber change notification bus for one
/// collection. Never blocks writers: a lagging subscriber just misses the
/// oldest events in its backlog, observable as `RecvError::Lagged` on its
/// receiver.
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Called only after the originating transaction has
    /// committed. A lack of subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    /// A cloned handle to the underlying sender, for fanning events from
    /// another bus into this one.
    pub fn clone_sender(&self) -> broadcast::Sender<ChangeEvent> {
        self.sender.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();
        let doc = json!({"_id": "1"}).as_object().unwrap().clone();
        bus.publish(ChangeEvent::insert("heroes", "1", doc));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, "1");
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_oldest_instead_of_blocking_writer() {
        let bus = ChangeBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            let doc = json!({"_id": i.to_string()}).as_object().unwrap().clone();
            bus.publish(ChangeEvent::insert("heroes", i.to_string(), doc));
        }
        let err = rx.try_recv().unwrap_err();
        assert!(matches!(err, tokio::sync::broadcast::error::TryRecvError::Lagged(_)));
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = ChangeBus::new();
        let doc = json!({"_id": "1"}).as_object().unwrap().clone();
        bus.publish(ChangeEvent::insert("heroes", "1", doc));
    }
}
