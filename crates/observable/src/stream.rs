use crate::observable::Observable;
use crate::observer::Observer;
use crate::subscription::Subscription;

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// A [`Stream`] view of one subscription, created by
/// [`Observable::into_stream`].
///
/// Yields `Ok` for every value and a final `Err` if the observable errors.
/// Dropping the stream unsubscribes.
#[derive(Debug)]
pub struct ObservableStream<T, E> {
    receiver: UnboundedReceiverStream<Result<T, E>>,
    subscription: Subscription,
}

impl<T, E> ObservableStream<T, E> {
    /// The underlying subscription.
    #[must_use]
    pub const fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<T, E> Stream for ObservableStream<T, E> {
    type Item = Result<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl<T, E> Drop for ObservableStream<T, E> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Subscribes and exposes the events as a [`Stream`].
    ///
    /// Values are buffered without bound until polled.
    #[must_use]
    pub fn into_stream(self) -> ObservableStream<T, E> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let error = sender.clone();
        let subscription = self.subscribe(
            Observer::new()
                .on_next(move |value| {
                    let _ = sender.send(Ok(value));
                })
                .on_error(move |err| {
                    let _ = error.send(Err(err));
                }),
        );

        ObservableStream {
            receiver: UnboundedReceiverStream::new(receiver),
            subscription,
        }
    }
}
