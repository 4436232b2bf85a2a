//! Delivery contexts.
//!
//! A [`Scheduler`] decides where a stream's events are delivered to the
//! subscriber. The networking layer finishes its work on transport worker
//! threads and hands results to the scheduler configured on the client:
//!
//! - [`ImmediateScheduler`] runs jobs on the calling thread
//! - [`DispatchQueue`] queues jobs for a UI thread that drains them with
//!   [`DispatchQueue::run_pending`]
//! - `RuntimeScheduler` (with the `tokio` feature) runs jobs in order on a
//!   single task of a tokio runtime

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};

/// A unit of work handed to a scheduler.
pub type Job = Box<dyn FnOnce() + Send>;

/// Runs jobs in some execution context.
///
/// Implementations must run jobs from a single producer in the order they
/// were scheduled.
pub trait Scheduler: Send + Sync {
    /// Run `job` in this scheduler's context.
    fn schedule(&self, job: Job);
}

/// Runs every job synchronously on the thread that schedules it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
    fn schedule(&self, job: Job) {
        job();
    }
}

type Waker = Arc<dyn Fn() + Send + Sync>;

/// A FIFO queue of jobs drained by its owner thread.
///
/// Typically the UI thread calls [`run_pending`](Self::run_pending) once per
/// event-loop iteration. An optional waker is called after each job is queued
/// so the event loop can be nudged awake.
///
/// # Example
///
/// ```
/// use tessera_core::{DispatchQueue, Scheduler};
///
/// let queue = DispatchQueue::new();
/// queue.schedule(Box::new(|| println!("on the UI thread")));
/// assert_eq!(queue.pending(), 1);
/// assert_eq!(queue.run_pending(), 1);
/// ```
#[derive(Clone)]
pub struct DispatchQueue {
    sender: Sender<Job>,
    receiver: Receiver<Job>,
    waker: Option<Waker>,
}

impl DispatchQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            waker: None,
        }
    }

    /// Create a queue that calls `waker` whenever a job is queued.
    pub fn with_waker<F>(waker: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            waker: Some(Arc::new(waker)),
            ..Self::new()
        }
    }

    /// Run every job queued so far. Returns how many ran.
    ///
    /// Jobs queued by the jobs themselves run in the same call.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            count += 1;
        }
        count
    }

    /// Number of jobs waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for DispatchQueue {
    fn schedule(&self, job: Job) {
        // Every clone holds the receiver, so the channel never disconnects.
        let _ = self.sender.send(job);
        if let Some(waker) = &self.waker {
            waker();
        }
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(feature = "tokio")]
pub use runtime::RuntimeScheduler;

#[cfg(feature = "tokio")]
mod runtime {
    use tokio::runtime::Handle;
    use tokio::sync::mpsc;

    use super::{Job, Scheduler};

    /// Runs jobs one after another on a single task of a tokio runtime.
    ///
    /// The task ends once every clone of the scheduler is dropped and the
    /// remaining jobs have run.
    #[derive(Clone, Debug)]
    pub struct RuntimeScheduler {
        sender: mpsc::UnboundedSender<Job>,
    }

    impl RuntimeScheduler {
        /// Spawn the draining task on `handle`.
        pub fn new(handle: &Handle) -> Self {
            let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
            handle.spawn(async move {
                while let Some(job) = receiver.recv().await {
                    job();
                }
            });
            Self { sender }
        }
    }

    impl Scheduler for RuntimeScheduler {
        fn schedule(&self, job: Job) {
            if self.sender.send(job).is_err() {
                tracing::warn!(target: "tessera_core::scheduler", "runtime scheduler stopped; job dropped");
            }
        }
    }
}
