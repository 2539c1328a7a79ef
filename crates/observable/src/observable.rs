use crate::cleanup::Cleanup;
use crate::observer::Observer;
use crate::sink::{Sink, State};
use crate::subscription::Subscription;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::{Stream, StreamExt};

type Producer<T, E> = dyn Fn(Sink<T, E>) -> Result<Cleanup, E> + Send + Sync;

/// A lazy, single-subscriber stream of values ending in at most one error or
/// completion.
///
/// Cloning an observable clones the factory, not a running execution: each
/// [`subscribe`](Self::subscribe) runs the producer again.
pub struct Observable<T, E> {
    producer: Arc<Producer<T, E>>,
}

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates an observable from a producer.
    ///
    /// The producer runs synchronously inside every `subscribe` call. An
    /// `Err` returned from it is delivered as the subscription's error.
    pub fn create<F>(producer: F) -> Self
    where
        F: Fn(Sink<T, E>) -> Result<Cleanup, E> + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// Subscribes `observer`, running the producer immediately.
    pub fn subscribe(&self, observer: Observer<T, E>) -> Subscription {
        let state = State::new(observer);
        let subscription = state.subscription();

        if let Some(observer) = state.observer() {
            observer.start(&subscription);
        }
        if subscription.is_closed() {
            return subscription;
        }

        let sink = Sink::new(Arc::clone(&state));
        match (self.producer)(sink.clone()) {
            Ok(cleanup) => state.attach_cleanup(cleanup),
            Err(err) => sink.error(err),
        }

        subscription
    }

    /// Emits every item of `items`, then completes.
    pub fn from_values<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Clone + Send + Sync + 'static,
    {
        let items = items.into_iter();
        Self::create(move |sink| {
            for item in items.clone() {
                if sink.is_closed() {
                    break;
                }
                sink.next(item);
            }
            sink.complete();
            Ok(Cleanup::none())
        })
    }

    /// Emits `value` once, then completes.
    pub fn from_value(value: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::create(move |sink| {
            sink.next(value.clone());
            sink.complete();
            Ok(Cleanup::none())
        })
    }

    /// Errors immediately with `error`.
    pub fn from_error(error: E) -> Self
    where
        E: Clone + Sync,
    {
        Self::create(move |_| Err(error.clone()))
    }

    /// Completes immediately without values.
    #[must_use]
    pub fn empty() -> Self {
        Self::create(|sink| {
            sink.complete();
            Ok(Cleanup::none())
        })
    }

    /// Never emits, never terminates.
    #[must_use]
    pub fn never() -> Self {
        Self::create(|_| Ok(Cleanup::none()))
    }

    /// Runs the future built by `factory` for every subscription.
    ///
    /// The future is driven on a spawned tokio task that is aborted on
    /// unsubscribe.
    ///
    /// # Panics
    ///
    /// Subscribing panics when called outside a tokio runtime.
    pub fn from_future<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::create(move |sink| {
            let future = factory();
            let handle = tokio::spawn(async move {
                match future.await {
                    Ok(value) => {
                        sink.next(value);
                        sink.complete();
                    }
                    Err(err) => sink.error(err),
                }
            });
            Ok(Cleanup::from(handle))
        })
    }

    /// Forwards the stream built by `factory` for every subscription; the
    /// first `Err` item terminates it.
    ///
    /// # Panics
    ///
    /// Subscribing panics when called outside a tokio runtime.
    pub fn from_stream<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: Stream<Item = Result<T, E>> + Send + 'static,
    {
        Self::create(move |sink| {
            let stream = factory();
            let handle = tokio::spawn(async move {
                let mut stream = std::pin::pin!(stream);
                while let Some(item) = stream.next().await {
                    if sink.is_closed() {
                        return;
                    }
                    match item {
                        Ok(value) => sink.next(value),
                        Err(err) => {
                            sink.error(err);
                            return;
                        }
                    }
                }
                sink.complete();
            });
            Ok(Cleanup::from(handle))
        })
    }
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T, E> fmt::Debug for Observable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}
