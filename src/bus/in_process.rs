use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::bus::{BusError, BusMessage, MessageBus};

/// In-process bus: one broadcast channel per topic, created on first use.
///
/// Stands in for the external transport in tests and single-process
/// deployments. Delivery to slow subscribers is lossy (bounded channels),
/// matching the at-least-once posture of the real transport: handlers must
/// tolerate both gaps and replays.
pub struct InProcessBus {
    channels: DashMap<String, broadcast::Sender<BusMessage>>,
    capacity: usize,
}

impl InProcessBus {
    /// Create a bus whose per-topic channels hold `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        self.channels
            .entry(topic.to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl MessageBus for InProcessBus {
    fn publish(&self, message: BusMessage) -> Result<(), BusError> {
        // A topic without subscribers swallows the message, same as a
        // fire-and-forget broker publish.
        let _ = self.sender(&message.topic).send(message);
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<BusMessage> {
        self.sender(topic).subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let bus = InProcessBus::new(8);
        let mut rx = bus.subscribe("round.created");

        let message = BusMessage::new("round.created", &json!({"round_id": "r1"})).unwrap();
        bus.publish(message).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "round.created");
        assert_eq!(received.payload["round_id"], "r1");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_not_an_error() {
        let bus = InProcessBus::new(8);
        let message = BusMessage::new("round.created", &json!({})).unwrap();
        assert!(bus.publish(message).is_ok());
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = InProcessBus::new(8);
        let mut created = bus.subscribe("round.created");
        let mut deleted = bus.subscribe("round.deleted");

        bus.publish(BusMessage::new("round.deleted", &json!({})).unwrap())
            .unwrap();

        assert!(created.try_recv().is_err());
        assert!(deleted.try_recv().is_ok());
    }
}
