//! Subscription handles and the per-subscription state machine.
//!
//! Every call to [`Observable::subscribe`](crate::Observable::subscribe)
//! creates one [`Lifecycle`] shared between the producer side (the
//! [`Emitter`](crate::Emitter)) and the consumer side (the [`Subscription`]).
//! The lifecycle moves through three states with guarded transitions:
//!
//! ```text
//!            emit_error / emit_complete
//!   Active ────────────────────────────▶ Terminated
//!     │
//!     │ dispose
//!     ▼
//!   Disposed
//! ```
//!
//! Both exits from `Active` are compare-and-swap transitions, so exactly one
//! of them wins and every later transition attempt is a no-op.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use crate::bag::CancellableBag;
use crate::observable::Teardown;

const ACTIVE: u8 = 0;
const TERMINATED: u8 = 1;
const DISPOSED: u8 = 2;

/// Current state of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Events may still be delivered.
    Active,
    /// A terminal event (error or completion) has been delivered.
    Terminated,
    /// The subscriber cancelled before a terminal event.
    Disposed,
}

type CloseHook = Box<dyn FnOnce() + Send>;

/// Shared state of one subscription.
pub(crate) struct Lifecycle {
    state: AtomicU8,
    teardown: Mutex<Option<Teardown>>,
    close_hooks: Mutex<Vec<CloseHook>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(ACTIVE),
            teardown: Mutex::new(None),
            close_hooks: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        match self.state.load(Ordering::SeqCst) {
            ACTIVE => SubscriptionState::Active,
            TERMINATED => SubscriptionState::Terminated,
            _ => SubscriptionState::Disposed,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state.load(Ordering::SeqCst) == ACTIVE
    }

    /// Claim the right to deliver the terminal event.
    ///
    /// Returns `false` if the subscription already terminated or was disposed.
    /// The caller must invoke [`finish`](Self::finish) after delivering.
    pub(crate) fn terminate(&self) -> bool {
        self.state
            .compare_exchange(ACTIVE, TERMINATED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release resources after the terminal event was delivered.
    ///
    /// The teardown is dropped without running: the work already finished.
    pub(crate) fn finish(&self) {
        drop(self.teardown.lock().take());
        self.run_close_hooks();
    }

    /// Cancel the subscription. Runs the teardown at most once.
    pub(crate) fn dispose(&self) -> bool {
        if self
            .state
            .compare_exchange(ACTIVE, DISPOSED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown.run();
        }
        self.run_close_hooks();
        true
    }

    /// Store the teardown returned by an observable's setup function.
    ///
    /// The setup may have terminated or been disposed before returning, in
    /// which case the teardown is released or run right away.
    pub(crate) fn attach_teardown(&self, teardown: Teardown) {
        *self.teardown.lock() = Some(teardown);
        match self.state.load(Ordering::SeqCst) {
            ACTIVE => {}
            DISPOSED => {
                let teardown = self.teardown.lock().take();
                if let Some(teardown) = teardown {
                    teardown.run();
                }
            }
            _ => drop(self.teardown.lock().take()),
        }
    }

    /// Register a hook that runs once when the subscription leaves `Active`.
    ///
    /// Returns `false` (and drops the hook) if the subscription is already closed.
    pub(crate) fn on_close(&self, hook: CloseHook) -> bool {
        let mut hooks = self.close_hooks.lock();
        if !self.is_active() {
            return false;
        }
        hooks.push(hook);
        true
    }

    fn run_close_hooks(&self) {
        let hooks = std::mem::take(&mut *self.close_hooks.lock());
        for hook in hooks {
            hook();
        }
    }
}

/// A handle to one active stream delivery.
///
/// Disposing a subscription synchronously requests cancellation of the
/// underlying work and stops any further delivery to the subscriber.
/// Disposal is idempotent. Clones share the same subscription.
///
/// Dropping a `Subscription` does **not** cancel it; store it in a
/// [`CancellableBag`] to tie its lifetime to an owner.
#[derive(Clone)]
pub struct Subscription {
    lifecycle: Arc<Lifecycle>,
}

impl Subscription {
    pub(crate) fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Cancel the subscription.
    ///
    /// Returns `true` if this call cancelled it, `false` if it had already
    /// terminated or been disposed.
    pub fn dispose(&self) -> bool {
        let disposed = self.lifecycle.dispose();
        if disposed {
            tracing::trace!(target: "tessera_core::observable", "subscription disposed");
        }
        disposed
    }

    /// Get the current state.
    pub fn state(&self) -> SubscriptionState {
        self.lifecycle.state()
    }

    /// Check if the subscription has terminated or been disposed.
    pub fn is_closed(&self) -> bool {
        !self.lifecycle.is_active()
    }

    /// Hand this subscription to a bag that owns its lifetime.
    ///
    /// Already-closed subscriptions are not stored.
    pub fn store_in(self, bag: &CancellableBag) {
        bag.insert(self);
    }

    pub(crate) fn on_close(&self, hook: CloseHook) -> bool {
        self.lifecycle.on_close(hook)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state())
            .finish()
    }
}
