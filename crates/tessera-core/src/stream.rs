//! Async adapter: consume an observable as a `Stream`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::observable::{FnObserver, Observable};
use crate::subscription::Subscription;

/// A [`Stream`] of `Result<T, E>` backed by one subscription.
///
/// Values arrive as `Ok`, an error arrives as a final `Err`, and the stream
/// ends after the terminal event. Dropping the stream disposes the
/// subscription.
pub struct ObservableStream<T, E> {
    receiver: mpsc::UnboundedReceiver<Result<T, E>>,
    subscription: Subscription,
}

impl<T, E> ObservableStream<T, E> {
    /// The subscription feeding this stream.
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<T, E> Stream for ObservableStream<T, E> {
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl<T, E> Drop for ObservableStream<T, E> {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}

type SenderSlot<T, E> = Arc<Mutex<Option<mpsc::UnboundedSender<Result<T, E>>>>>;

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Subscribe and expose the events as an async stream.
    ///
    /// ```
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// use futures_util::StreamExt;
    /// use tessera_core::{Observable, Teardown};
    ///
    /// let numbers = Observable::<u32, String>::create(|emitter| {
    ///     emitter.emit_next(1);
    ///     emitter.emit_next(2);
    ///     emitter.emit_complete();
    ///     Teardown::empty()
    /// });
    ///
    /// let collected: Vec<_> = numbers.into_stream().collect().await;
    /// assert_eq!(collected, vec![Ok(1), Ok(2)]);
    /// # }
    /// ```
    pub fn into_stream(&self) -> ObservableStream<T, E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let slot: SenderSlot<T, E> = Arc::new(Mutex::new(Some(sender)));

        let next = slot.clone();
        let error = slot.clone();
        let subscription = self.subscribe(FnObserver::new(
            move |value| {
                if let Some(sender) = next.lock().as_ref() {
                    let _ = sender.send(Ok(value));
                }
            },
            move |e| {
                if let Some(sender) = error.lock().take() {
                    let _ = sender.send(Err(e));
                }
            },
            move || {
                slot.lock().take();
            },
        ));

        ObservableStream {
            receiver,
            subscription,
        }
    }
}
