//! Owning registry of subscriptions.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::subscription::Subscription;

new_key_type! {
    /// Identifies a subscription stored in a [`CancellableBag`].
    pub struct SubscriptionKey;
}

struct BagInner {
    entries: Mutex<SlotMap<SubscriptionKey, Subscription>>,
}

/// Owns a set of subscriptions and cancels them together.
///
/// A bag belongs to exactly one owner (a view model, a screen, a session).
/// When the owner goes away, dropping the bag disposes everything it still
/// holds. Subscriptions that finish on their own remove themselves, so a
/// long-lived bag does not accumulate completed work.
///
/// # Example
///
/// ```
/// use tessera_core::{CancellableBag, Observable, Teardown};
///
/// let pending = Observable::<u32, String>::create(|_| Teardown::empty());
///
/// let bag = CancellableBag::new();
/// pending.subscribe_with(|_| {}, |_| {}, || {}).store_in(&bag);
/// assert_eq!(bag.len(), 1);
///
/// assert_eq!(bag.dispose_all(), 1);
/// assert!(bag.is_empty());
/// ```
pub struct CancellableBag {
    inner: Arc<BagInner>,
}

impl CancellableBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BagInner {
                entries: Mutex::new(SlotMap::with_key()),
            }),
        }
    }

    /// Take ownership of a subscription.
    ///
    /// Returns `None` if the subscription is already closed; nothing is
    /// stored in that case.
    pub fn insert(&self, subscription: Subscription) -> Option<SubscriptionKey> {
        if subscription.is_closed() {
            return None;
        }

        let key = self.inner.entries.lock().insert(subscription.clone());

        let weak: Weak<BagInner> = Arc::downgrade(&self.inner);
        let registered = subscription.on_close(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.entries.lock().remove(key);
            }
        }));

        if !registered {
            // Closed between the check above and hook registration.
            self.inner.entries.lock().remove(key);
            return None;
        }

        tracing::trace!(target: "tessera_core::bag", ?key, "subscription stored");
        Some(key)
    }

    /// Stop tracking a subscription without disposing it.
    pub fn remove(&self, key: SubscriptionKey) -> Option<Subscription> {
        self.inner.entries.lock().remove(key)
    }

    /// Dispose every stored subscription and empty the bag.
    ///
    /// Returns the number of subscriptions drained. Calling it again on an
    /// empty bag does nothing.
    pub fn dispose_all(&self) -> usize {
        let drained: Vec<Subscription> = {
            let mut entries = self.inner.entries.lock();
            entries.drain().map(|(_, subscription)| subscription).collect()
        };

        let count = drained.len();
        for subscription in drained {
            subscription.dispose();
        }

        if count > 0 {
            tracing::debug!(target: "tessera_core::bag", count, "disposed subscriptions");
        }
        count
    }

    /// Number of subscriptions currently held.
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Check if the bag holds no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CancellableBag {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CancellableBag {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

impl std::fmt::Debug for CancellableBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellableBag")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Emitter, Observable, Teardown};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// An observable that never finishes on its own and counts cancellations.
    fn pending(cancels: &Arc<AtomicUsize>) -> Observable<(), String> {
        let cancels = cancels.clone();
        Observable::create(move |_| {
            let cancels = cancels.clone();
            Teardown::new(move || {
                cancels.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[test]
    fn test_dispose_all_cancels_each_once() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let source = pending(&cancels);
        let bag = CancellableBag::new();

        for _ in 0..3 {
            source.subscribe_with(|_| {}, |_| {}, || {}).store_in(&bag);
        }
        assert_eq!(bag.len(), 3);

        assert_eq!(bag.dispose_all(), 3);
        assert_eq!(cancels.load(Ordering::SeqCst), 3);
        assert!(bag.is_empty());

        assert_eq!(bag.dispose_all(), 0);
        assert_eq!(cancels.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_drop_disposes_members() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let source = pending(&cancels);

        {
            let bag = CancellableBag::new();
            source.subscribe_with(|_| {}, |_| {}, || {}).store_in(&bag);
            source.subscribe_with(|_| {}, |_| {}, || {}).store_in(&bag);
        }

        assert_eq!(cancels.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_completed_subscriptions_leave_the_bag() {
        let held: Arc<parking_lot::Mutex<Option<Emitter<(), String>>>> =
            Arc::new(parking_lot::Mutex::new(None));
        let slot = held.clone();
        let source = Observable::<(), String>::create(move |emitter| {
            *slot.lock() = Some(emitter);
            Teardown::empty()
        });

        let bag = CancellableBag::new();
        source.subscribe_with(|_| {}, |_| {}, || {}).store_in(&bag);
        assert_eq!(bag.len(), 1);

        let emitter = held.lock().take().unwrap();
        emitter.emit_complete();
        assert!(bag.is_empty());
    }

    #[test]
    fn test_insert_closed_subscription() {
        let source = Observable::<(), String>::create(|emitter| {
            emitter.emit_complete();
            Teardown::empty()
        });

        let bag = CancellableBag::new();
        assert!(bag.insert(source.subscribe_with(|_| {}, |_| {}, || {})).is_none());
        assert!(bag.is_empty());
    }

    #[test]
    fn test_remove_keeps_subscription_alive() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let source = pending(&cancels);
        let bag = CancellableBag::new();

        let key = bag
            .insert(source.subscribe_with(|_| {}, |_| {}, || {}))
            .unwrap();
        let subscription = bag.remove(key).unwrap();

        drop(bag);
        assert_eq!(cancels.load(Ordering::SeqCst), 0);
        assert!(!subscription.is_closed());
    }

    #[test]
    fn test_external_dispose_removes_entry() {
        let cancels = Arc::new(AtomicUsize::new(0));
        let source = pending(&cancels);
        let bag = CancellableBag::new();

        let subscription = source.subscribe_with(|_| {}, |_| {}, || {});
        bag.insert(subscription.clone());
        subscription.dispose();

        assert!(bag.is_empty());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }
}
