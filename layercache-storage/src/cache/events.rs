//! Event distribution.
//!
//! Cache events go out over a tokio broadcast channel. Publishing never
//! blocks; subscribers that fall behind lose the oldest events.

use layercache_core::CacheEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast sender for [`CacheEvent`]s.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<CacheEvent>,
}

impl EventSink {
    /// Create a sink buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: CacheEvent) {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => {
                trace!(event_type = event_type, receivers = receivers, "Cache event emitted");
            }
            Err(_) => {
                // No subscribers.
            }
        }
    }

    /// Receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::new(8);
        sink.emit(CacheEvent::Miss {
            key: "k".to_string(),
            tier: "memory".to_string(),
        });
        assert_eq!(sink.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_emit_with_subscriber() {
        let sink = EventSink::new(8);
        let mut rx = sink.subscribe();

        let event = CacheEvent::Set {
            key: "k".to_string(),
            tier: "memory".to_string(),
        };
        sink.emit(event.clone());

        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn test_zero_capacity_is_bumped() {
        let sink = EventSink::new(0);
        let mut rx = sink.subscribe();
        sink.emit(CacheEvent::Miss {
            key: "k".to_string(),
            tier: "memory".to_string(),
        });
        assert!(rx.try_recv().is_ok());
    }
}
