//! Core reactive primitives for Tessera.
//!
//! This crate provides the building blocks the networking layer uses to turn
//! callback-driven, cancelable work into uniform value streams:
//!
//! - **Observable Bridge**: [`Observable::create`] wraps any callback API
//!   (progress + completion/error) as a cancelable stream
//! - **Subscriptions**: [`Subscription`] handles with idempotent disposal
//! - **Cancellable Bag**: [`CancellableBag`] owns many subscriptions and
//!   cancels them together
//! - **Operators**: `map`, `try_map`, `map_err`, `retry`, `observe_on`
//! - **Schedulers**: explicit delivery contexts ([`ImmediateScheduler`],
//!   [`DispatchQueue`], and with the `tokio` feature `RuntimeScheduler`)
//!
//! # Example
//!
//! ```
//! use tessera_core::{CancellableBag, Observable, Teardown};
//!
//! let ticks = Observable::<u32, String>::create(|emitter| {
//!     for tick in 0..3 {
//!         emitter.emit_next(tick);
//!     }
//!     emitter.emit_complete();
//!     Teardown::empty()
//! });
//!
//! let bag = CancellableBag::new();
//! ticks
//!     .map(|tick| tick * 10)
//!     .subscribe_with(
//!         |value| println!("value: {value}"),
//!         |error| eprintln!("error: {error}"),
//!         || println!("done"),
//!     )
//!     .store_in(&bag);
//!
//! // Completed subscriptions remove themselves from the bag.
//! assert!(bag.is_empty());
//! ```

mod bag;
pub mod logging;
mod observable;
mod operators;
pub mod scheduler;
#[cfg(feature = "tokio")]
mod stream;
mod subscription;

pub use bag::{CancellableBag, SubscriptionKey};
pub use observable::{Emitter, FnObserver, Observable, Observer, Teardown};
#[cfg(feature = "tokio")]
pub use scheduler::RuntimeScheduler;
pub use scheduler::{DispatchQueue, ImmediateScheduler, Job, Scheduler};
#[cfg(feature = "tokio")]
pub use stream::ObservableStream;
pub use subscription::{Subscription, SubscriptionState};
