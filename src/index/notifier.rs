use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

/// Fan-out registry for "index changed" signals.
///
/// Signals carry no payload; a subscriber re-fetches the index itself.
/// `emit` never blocks: every subscriber owns an unbounded channel, and a
/// subscriber that went away is pruned on the next emit. Clones share the
/// same registry.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    subscribers: Arc<Mutex<HashMap<u64, mpsc::UnboundedSender<()>>>>,
    next_id: Arc<AtomicU64>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .expect("notifier lock poisoned")
            .insert(id, tx);
        ChangeSubscription {
            id,
            rx,
            notifier: self.clone(),
        }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers
            .lock()
            .expect("notifier lock poisoned")
            .remove(&id);
    }

    /// Delivers one signal to every live subscriber.
    ///
    /// Called by the invalidation cache after a rebuild whose result
    /// actually differs from the previous snapshot.
    pub fn emit(&self) {
        let mut subscribers = self.subscribers.lock().expect("notifier lock poisoned");
        subscribers.retain(|_, tx| tx.send(()).is_ok());
        debug!(subscribers = subscribers.len(), "index change signal emitted");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .expect("notifier lock poisoned")
            .len()
    }
}

/// Handle to one subscription; unsubscribes itself on drop.
pub struct ChangeSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<()>,
    notifier: ChangeNotifier,
}

impl ChangeSubscription {
    /// Waits for the next change signal. Returns `false` once the notifier
    /// has dropped this subscription.
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Non-blocking drain, used to count delivered signals.
    pub fn try_changed(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.notifier.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_reaches_every_subscriber() {
        let notifier = ChangeNotifier::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();

        notifier.emit();

        assert!(first.changed().await);
        assert!(second.changed().await);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_noop() {
        let notifier = ChangeNotifier::new();
        notifier.emit();
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_unsubscribes() {
        let notifier = ChangeNotifier::new();
        let subscription = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_one_registry() {
        let notifier = ChangeNotifier::new();
        let mut subscription = notifier.subscribe();

        notifier.clone().emit();
        assert!(subscription.changed().await);
    }

    #[tokio::test]
    async fn test_slow_subscriber_does_not_block_emit() {
        let notifier = ChangeNotifier::new();
        let mut idle = notifier.subscribe();

        // many emits with no intervening reads must not block the producer
        for _ in 0..1000 {
            notifier.emit();
        }

        let mut received = 0;
        while idle.try_changed() {
            received += 1;
        }
        assert_eq!(received, 1000);
    }

    #[tokio::test]
    async fn test_signals_after_unsubscribe_are_not_delivered() {
        let notifier = ChangeNotifier::new();
        let mut subscription = notifier.subscribe();
        notifier.unsubscribe(subscription.id);

        notifier.emit();
        assert!(!subscription.try_changed());
    }
}
