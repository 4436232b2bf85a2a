//! Stream operators.
//!
//! Each operator returns a new cold [`Observable`] whose subscriptions own one
//! subscription to the source. Disposing the outer subscription disposes the
//! inner one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::observable::{Emitter, FnObserver, Observable, Teardown};
use crate::scheduler::Scheduler;
use crate::subscription::Subscription;

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Transform every value.
    pub fn map<U, F>(&self, f: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |emitter: Emitter<U, E>| {
            let f = f.clone();
            let next = emitter.clone();
            let error = emitter.clone();
            let subscription = source.subscribe(FnObserver::new(
                move |value| next.emit_next(f(value)),
                move |e| error.emit_error(e),
                move || emitter.emit_complete(),
            ));
            Teardown::from(subscription)
        })
    }

    /// Transform every value with a fallible function.
    ///
    /// The first `Err` fails the stream and cancels the source.
    pub fn try_map<U, F>(&self, f: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |emitter: Emitter<U, E>| {
            let inner: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

            let f = f.clone();
            let next = emitter.clone();
            let error = emitter.clone();
            let complete = emitter.clone();
            let next_inner = inner.clone();
            let subscription = source.subscribe(FnObserver::new(
                move |value| match f(value) {
                    Ok(mapped) => next.emit_next(mapped),
                    Err(e) => {
                        next.emit_error(e);
                        let current = next_inner.lock().take();
                        if let Some(current) = current {
                            current.dispose();
                        }
                    }
                },
                move |e| error.emit_error(e),
                move || complete.emit_complete(),
            ));

            if emitter.is_closed() {
                // Failed while subscribing; the teardown will not run.
                subscription.dispose();
                return Teardown::empty();
            }
            *inner.lock() = Some(subscription.clone());
            Teardown::from(subscription)
        })
    }

    /// Transform the error, if any.
    pub fn map_err<E2, F>(&self, f: F) -> Observable<T, E2>
    where
        E2: Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |emitter: Emitter<T, E2>| {
            let f = f.clone();
            let next = emitter.clone();
            let error = emitter.clone();
            let subscription = source.subscribe(FnObserver::new(
                move |value| next.emit_next(value),
                move |e| error.emit_error(f(e)),
                move || emitter.emit_complete(),
            ));
            Teardown::from(subscription)
        })
    }

    /// Resubscribe to the source up to `retries` times after an error.
    ///
    /// Every attempt runs the source's setup again, so the underlying work is
    /// redone from scratch. Attempts follow each other immediately. When all
    /// attempts fail, the last error is delivered.
    ///
    /// Attempts that fail while still being subscribed are restarted in a
    /// loop, so the stack depth does not grow with `retries`.
    pub fn retry(&self, retries: u32) -> Observable<T, E> {
        let source = self.clone();
        Observable::create(move |emitter: Emitter<T, E>| {
            let state = Arc::new(RetryState {
                source: source.clone(),
                emitter,
                current: Mutex::new(CurrentAttempt::default()),
                remaining: AtomicU32::new(retries),
                generation: AtomicU64::new(0),
                requested: AtomicUsize::new(0),
            });
            state.request_attempt();

            Teardown::new(move || {
                let current = state.current.lock().subscription.take();
                if let Some(current) = current {
                    current.dispose();
                }
            })
        })
    }

    /// Deliver every event through `scheduler`.
    ///
    /// Events keep their order as long as the scheduler runs jobs in FIFO
    /// order. Events scheduled before a dispose are dropped when they run.
    pub fn observe_on(&self, scheduler: Arc<dyn Scheduler>) -> Observable<T, E> {
        let source = self.clone();
        Observable::create(move |emitter: Emitter<T, E>| {
            let next = (emitter.clone(), scheduler.clone());
            let error = (emitter.clone(), scheduler.clone());
            let complete = (emitter, scheduler.clone());
            let subscription = source.subscribe(FnObserver::new(
                move |value| {
                    let emitter = next.0.clone();
                    next.1.schedule(Box::new(move || emitter.emit_next(value)));
                },
                move |e| {
                    let emitter = error.0.clone();
                    error.1.schedule(Box::new(move || emitter.emit_error(e)));
                },
                move || {
                    let emitter = complete.0.clone();
                    complete.1.schedule(Box::new(move || emitter.emit_complete()));
                },
            ));
            Teardown::from(subscription)
        })
    }
}

/// The newest attempt that is still running.
#[derive(Default)]
struct CurrentAttempt {
    generation: u64,
    subscription: Option<Subscription>,
}

struct RetryState<T, E> {
    source: Observable<T, E>,
    emitter: Emitter<T, E>,
    current: Mutex<CurrentAttempt>,
    remaining: AtomicU32,
    generation: AtomicU64,
    /// Attempts asked for but not yet started by the running drain loop.
    requested: AtomicUsize,
}

impl<T, E> RetryState<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Start an attempt, or hand it to the loop already running one.
    ///
    /// An attempt that fails inside `subscribe` lands here while the loop is
    /// still on the stack; the loop then runs the next attempt after
    /// `subscribe` returns instead of this call recursing.
    fn request_attempt(self: &Arc<Self>) {
        if self.requested.fetch_add(1, Ordering::SeqCst) > 0 {
            return;
        }
        loop {
            self.attempt();
            if self.requested.fetch_sub(1, Ordering::SeqCst) == 1 {
                break;
            }
        }
    }

    fn attempt(self: &Arc<Self>) {
        if self.emitter.is_closed() {
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let next = self.emitter.clone();
        let complete = self.emitter.clone();
        let state = self.clone();
        let subscription = self.source.subscribe(FnObserver::new(
            move |value| next.emit_next(value),
            move |error| {
                let retried = state
                    .remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if retried {
                    tracing::debug!(
                        target: "tessera_core::observable",
                        remaining = state.remaining.load(Ordering::SeqCst),
                        "retrying after error"
                    );
                    state.request_attempt();
                } else {
                    state.emitter.emit_error(error);
                }
            },
            move || complete.emit_complete(),
        ));

        {
            let mut current = self.current.lock();
            // A closed attempt already handed off to a later one, and a later
            // attempt may have been stored by another thread in the meantime.
            if subscription.is_closed() || current.generation > generation {
                return;
            }
            current.generation = generation;
            current.subscription = Some(subscription.clone());
        }
        if self.emitter.is_closed() {
            subscription.dispose();
        }
    }
}
