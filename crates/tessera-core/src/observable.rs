//! The observable bridge.
//!
//! [`Observable::create`] turns any callback-driven, cancelable piece of work
//! into a stream of values. The setup function receives an [`Emitter`] and
//! returns a [`Teardown`] that cancels the work.
//!
//! # Guarantees
//!
//! For each subscription:
//!
//! - the setup function runs exactly once, synchronously inside `subscribe`
//! - any number of values may be delivered, followed by at most one terminal
//!   event (error or completion)
//! - emitter calls after the terminal event, or after disposal, are no-ops
//! - disposing before the terminal event runs the teardown exactly once
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use tessera_core::{Observable, Teardown};
//!
//! let cancelled = Arc::new(AtomicBool::new(false));
//! let flag = cancelled.clone();
//!
//! let work = Observable::<u32, String>::create(move |emitter| {
//!     emitter.emit_next(1);
//!     let flag = flag.clone();
//!     Teardown::new(move || flag.store(true, Ordering::SeqCst))
//! });
//!
//! let subscription = work.subscribe_with(|_| {}, |_| {}, || {});
//! subscription.dispose();
//! assert!(cancelled.load(Ordering::SeqCst));
//! ```

use std::sync::Arc;

use crate::subscription::{Lifecycle, Subscription};

/// Receives the events of one subscription.
pub trait Observer<T, E>: Send + Sync + 'static {
    /// Called for each value.
    fn on_next(&self, value: T);

    /// Called at most once, when the stream fails.
    fn on_error(&self, error: E);

    /// Called at most once, when the stream finishes successfully.
    fn on_completed(&self);
}

/// An [`Observer`] built from three closures.
pub struct FnObserver<N, R, C> {
    on_next: N,
    on_error: R,
    on_completed: C,
}

impl<N, R, C> FnObserver<N, R, C> {
    /// Create an observer from value, error and completion handlers.
    pub fn new(on_next: N, on_error: R, on_completed: C) -> Self {
        Self {
            on_next,
            on_error,
            on_completed,
        }
    }
}

impl<T, E, N, R, C> Observer<T, E> for FnObserver<N, R, C>
where
    N: Fn(T) + Send + Sync + 'static,
    R: Fn(E) + Send + Sync + 'static,
    C: Fn() + Send + Sync + 'static,
{
    fn on_next(&self, value: T) {
        (self.on_next)(value)
    }

    fn on_error(&self, error: E) {
        (self.on_error)(error)
    }

    fn on_completed(&self) {
        (self.on_completed)()
    }
}

/// Cancellation work returned by an observable's setup function.
///
/// Runs at most once, and only if the subscription is disposed before a
/// terminal event. A teardown that is dropped without running does nothing.
pub struct Teardown(Option<Box<dyn FnOnce() + Send>>);

impl Teardown {
    /// Create a teardown from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Some(Box::new(f)))
    }

    /// A teardown with nothing to cancel.
    pub fn empty() -> Self {
        Self(None)
    }

    pub(crate) fn run(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl From<Subscription> for Teardown {
    fn from(subscription: Subscription) -> Self {
        Teardown::new(move || {
            subscription.dispose();
        })
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Teardown").field(&self.0.is_some()).finish()
    }
}

/// The producer side of one subscription.
///
/// Cloning an emitter is cheap; all clones feed the same subscriber and share
/// its state, so a terminal event from any clone closes all of them.
pub struct Emitter<T, E> {
    observer: Arc<dyn Observer<T, E>>,
    lifecycle: Arc<Lifecycle>,
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Self {
            observer: self.observer.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<T: 'static, E: 'static> Emitter<T, E> {
    /// Deliver a value. Ignored once the subscription is closed.
    pub fn emit_next(&self, value: T) {
        if self.lifecycle.is_active() {
            self.observer.on_next(value);
        } else {
            tracing::trace!(target: "tessera_core::observable", "value suppressed after close");
        }
    }

    /// Fail the stream. Only the first terminal event is delivered.
    pub fn emit_error(&self, error: E) {
        if self.lifecycle.terminate() {
            self.observer.on_error(error);
            self.lifecycle.finish();
        } else {
            tracing::trace!(target: "tessera_core::observable", "error suppressed after close");
        }
    }

    /// Finish the stream. Only the first terminal event is delivered.
    pub fn emit_complete(&self) {
        if self.lifecycle.terminate() {
            self.observer.on_completed();
            self.lifecycle.finish();
        } else {
            tracing::trace!(target: "tessera_core::observable", "completion suppressed after close");
        }
    }

    /// Check if the subscription has terminated or been disposed.
    ///
    /// Long-running producers can poll this to stop early.
    pub fn is_closed(&self) -> bool {
        !self.lifecycle.is_active()
    }
}

type Setup<T, E> = dyn Fn(Emitter<T, E>) -> Teardown + Send + Sync;

/// A cold, cancelable stream of `T` values that may fail with `E`.
///
/// Nothing runs until [`subscribe`](Self::subscribe) is called, and every
/// subscription runs the setup function again.
pub struct Observable<T, E> {
    setup: Arc<Setup<T, E>>,
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Self {
            setup: self.setup.clone(),
        }
    }
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap callback-style work as an observable.
    ///
    /// The setup function starts the work, wires its callbacks to the
    /// emitter, and returns how to cancel it.
    pub fn create<F>(setup: F) -> Self
    where
        F: Fn(Emitter<T, E>) -> Teardown + Send + Sync + 'static,
    {
        Self {
            setup: Arc::new(setup),
        }
    }

    /// Start a new subscription delivering to `observer`.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T, E>,
    {
        let lifecycle = Lifecycle::new();
        let emitter = Emitter {
            observer: Arc::new(observer),
            lifecycle: lifecycle.clone(),
        };
        let teardown = (self.setup)(emitter);
        lifecycle.attach_teardown(teardown);
        Subscription::new(lifecycle)
    }

    /// Start a new subscription with closure handlers.
    pub fn subscribe_with<N, R, C>(&self, on_next: N, on_error: R, on_completed: C) -> Subscription
    where
        N: Fn(T) + Send + Sync + 'static,
        R: Fn(E) + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        self.subscribe(FnObserver::new(on_next, on_error, on_completed))
    }
}

impl<T, E> std::fmt::Debug for Observable<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}
