//! Named-topic push channel for checkpoint notifications
//!
//! The push transport itself (websocket, IPC event bridge, whatever the host
//! application uses) is out of scope; it feeds [`PushBus::publish`] and the
//! timeline controller consumes subscriptions. One topic exists per session,
//! named `checkpoint-created:<session_id>`.

use crate::api::CheckpointCreated;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Per-topic channel capacity; a lagging subscriber only ever needs the
/// newest event to know a reload is due
const TOPIC_CAPACITY: usize = 16;

/// Topic name for checkpoint-created notifications scoped to one session
pub fn checkpoint_created_topic(session_id: &str) -> String {
    format!("checkpoint-created:{}", session_id)
}

/// In-process fan-out of push notifications by topic name
///
/// Topics are created lazily on first subscribe or publish and dropped once
/// a publish finds no live subscribers.
#[derive(Default)]
pub struct PushBus {
    topics: Mutex<HashMap<String, broadcast::Sender<CheckpointCreated>>>,
}

impl PushBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a named topic
    ///
    /// The returned receiver stops getting events as soon as it is dropped;
    /// there is nothing else to release.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<CheckpointCreated> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a named topic
    ///
    /// # Returns
    ///
    /// The number of subscribers the event was delivered to. Publishing to a
    /// topic nobody listens on is not an error; the dead topic is pruned.
    pub fn publish(&self, topic: &str, event: CheckpointCreated) -> usize {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = topics.get(topic) else {
            debug!(topic, "Push event dropped; topic has never been subscribed");
            return 0;
        };
        match sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                debug!(topic, "Pruning push topic with no live subscribers");
                topics.remove(topic);
                0
            }
        }
    }

    /// Number of live subscribers on a topic (diagnostic)
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, index: usize) -> CheckpointCreated {
        CheckpointCreated {
            checkpoint_id: id.to_string(),
            message_index: index,
        }
    }

    #[test]
    fn test_topic_naming() {
        assert_eq!(
            checkpoint_created_topic("abc-123"),
            "checkpoint-created:abc-123"
        );
    }

    #[tokio::test]
    async fn test_subscribe_then_publish_delivers() {
        let bus = PushBus::new();
        let mut receiver = bus.subscribe("checkpoint-created:s1");

        let delivered = bus.publish("checkpoint-created:s1", event("cp-1", 3));
        assert_eq!(delivered, 1);

        let received = receiver.recv().await.expect("recv failed");
        assert_eq!(received.checkpoint_id, "cp-1");
        assert_eq!(received.message_index, 3);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = PushBus::new();
        let mut s1 = bus.subscribe("checkpoint-created:s1");
        let mut s2 = bus.subscribe("checkpoint-created:s2");

        bus.publish("checkpoint-created:s1", event("cp-1", 0));

        assert_eq!(s1.recv().await.expect("recv failed").checkpoint_id, "cp-1");
        assert!(s2.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = PushBus::new();
        assert_eq!(bus.publish("checkpoint-created:s1", event("cp-1", 0)), 0);
    }

    #[test]
    fn test_dead_topic_is_pruned() {
        let bus = PushBus::new();
        let receiver = bus.subscribe("checkpoint-created:s1");
        assert_eq!(bus.subscriber_count("checkpoint-created:s1"), 1);

        drop(receiver);
        bus.publish("checkpoint-created:s1", event("cp-1", 0));
        assert_eq!(bus.subscriber_count("checkpoint-created:s1"), 0);
    }
}
