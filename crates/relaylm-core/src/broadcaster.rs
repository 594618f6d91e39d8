//! Fan-out hub for live activity logs.
//!
//! Every observer gets its own bounded channel. Publishing never waits on an
//! observer: a full channel drops the event for that observer only, and a
//! closed channel is pruned on the next publish.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, trace, warn};

use crate::events::{LogEvent, LogKind};

/// Default per-observer channel capacity.
pub const DEFAULT_LOG_CAPACITY: usize = 256;

/// Opaque identifier of one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type SubscriberMap = HashMap<SubscriberId, mpsc::Sender<LogEvent>>;

#[derive(Debug)]
struct Inner {
    subscribers: Mutex<SubscriberMap>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SubscriberMap> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }
}

/// Process-wide log broadcaster.
///
/// Cheap to clone; all clones share one subscriber set.
#[derive(Debug, Clone)]
pub struct LogBroadcaster {
    inner: Arc<Inner>,
}

impl LogBroadcaster {
    /// Create a broadcaster whose observers each buffer up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Create a broadcaster with [`DEFAULT_LOG_CAPACITY`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }

    /// Register a new observer.
    ///
    /// Only events published after this call are delivered. Dropping the
    /// returned [`Subscription`] unregisters it.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.inner.lock().insert(id, sender);
        debug!(subscriber = id.0, "Log observer subscribed");

        Subscription {
            id,
            receiver,
            hub: Arc::downgrade(&self.inner),
        }
    }

    /// Remove an observer. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            debug!(subscriber = id.0, "Log observer unsubscribed");
        }
        removed
    }

    /// Deliver an event to every registered observer.
    pub fn publish(&self, event: LogEvent) {
        trace_event(&event);

        let mut subscribers = self.inner.lock();
        if subscribers.is_empty() {
            return;
        }

        subscribers.retain(|id, sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(subscriber = id.0, "Log observer lagging; event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Number of currently registered observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Mirror an event into the process log at a level matching its kind.
fn trace_event(event: &LogEvent) {
    match event.kind {
        LogKind::Error => error!(kind = %event.kind, "{}", event.message),
        LogKind::Warning => warn!(kind = %event.kind, "{}", event.message),
        LogKind::StreamChunk => trace!(kind = %event.kind, "{}", event.message),
        _ => info!(kind = %event.kind, "{}", event.message),
    }
}

/// Receiving end of one observer's channel.
///
/// Implements [`Stream`] so it can feed an SSE response directly.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<LogEvent>,
    hub: Weak<Inner>,
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next event. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.receiver.recv().await
    }

    /// Take an already-buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<LogEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for Subscription {
    type Item = LogEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade()
            && hub.remove(self.id)
        {
            debug!(subscriber = self.id.0, "Log observer disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = LogBroadcaster::with_defaults();
        // Should not panic or block with nobody listening
        broadcaster.publish(LogEvent::request("nobody home"));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_events_in_order() {
        let broadcaster = LogBroadcaster::with_defaults();
        let mut sub = broadcaster.subscribe();

        broadcaster.publish(LogEvent::request("one"));
        broadcaster.publish(LogEvent::response("two"));

        let first = tokio_test::block_on(sub.recv()).unwrap();
        let second = tokio_test::block_on(sub.recv()).unwrap();
        assert_eq!(first, LogEvent::request("one"));
        assert_eq!(second, LogEvent::response("two"));
    }

    #[test]
    fn test_no_replay_for_late_subscriber() {
        let broadcaster = LogBroadcaster::with_defaults();
        broadcaster.publish(LogEvent::request("before"));

        let mut sub = broadcaster.subscribe();
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_stalled_subscriber_does_not_block_publisher() {
        let broadcaster = LogBroadcaster::new(4);
        let mut stalled = broadcaster.subscribe();
        let mut active = broadcaster.subscribe();

        for i in 0..100 {
            broadcaster.publish(LogEvent::stream_chunk(i.to_string()));
            // Keep the second observer drained so it sees everything.
            assert_eq!(
                active.try_recv(),
                Some(LogEvent::stream_chunk(i.to_string()))
            );
        }

        // The stalled observer kept only what fit in its buffer.
        let mut buffered = 0;
        while stalled.try_recv().is_some() {
            buffered += 1;
        }
        assert_eq!(buffered, 4);
        assert_eq!(broadcaster.subscriber_count(), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let broadcaster = LogBroadcaster::with_defaults();
        let sub = broadcaster.subscribe();
        let id = sub.id();

        assert!(broadcaster.unsubscribe(id));
        assert!(!broadcaster.unsubscribe(id));
        assert_eq!(broadcaster.subscriber_count(), 0);

        // Dropping after an explicit unsubscribe is harmless.
        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let broadcaster = LogBroadcaster::with_defaults();
        let sub = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn test_unsubscribed_receiver_drains_then_ends() {
        let broadcaster = LogBroadcaster::with_defaults();
        let mut sub = broadcaster.subscribe();
        broadcaster.publish(LogEvent::warning("last"));
        broadcaster.unsubscribe(sub.id());

        assert_eq!(
            tokio_test::block_on(sub.recv()),
            Some(LogEvent::warning("last"))
        );
        assert_eq!(tokio_test::block_on(sub.recv()), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publish_and_churn() {
        let broadcaster = LogBroadcaster::new(8);

        let publishers: Vec<_> = (0..4)
            .map(|p| {
                let broadcaster = broadcaster.clone();
                tokio::spawn(async move {
                    for i in 0..500 {
                        broadcaster.publish(LogEvent::stream_chunk(format!("{p}-{i}")));
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        let churn = {
            let broadcaster = broadcaster.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let sub = broadcaster.subscribe();
                    if sub.id().0 % 2 == 0 {
                        broadcaster.unsubscribe(sub.id());
                    }
                    drop(sub);
                    tokio::task::yield_now().await;
                }
            })
        };

        let all = async {
            for handle in publishers {
                handle.await.unwrap();
            }
            churn.await.unwrap();
        };
        tokio::time::timeout(Duration::from_secs(10), all)
            .await
            .expect("publishers must never block on observers");

        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_as_stream() {
        use futures_util::StreamExt;

        let broadcaster = LogBroadcaster::with_defaults();
        let mut sub = broadcaster.subscribe();
        broadcaster.publish(LogEvent::error("boom"));

        assert_eq!(sub.next().await, Some(LogEvent::error("boom")));
    }
}
