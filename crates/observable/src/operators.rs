use crate::cleanup::Cleanup;
use crate::observable::Observable;
use crate::observer::Observer;
use crate::sink::Sink;
use crate::subscription::{SerialSubscription, Subscription};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl<T, E> Observable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Transforms every value with `f`. Errors pass through unchanged.
    pub fn map<U, F>(&self, f: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |sink: Sink<U, E>| {
            let f = Arc::clone(&f);
            let next = sink.clone();
            let subscription = source.subscribe(
                sink.terminal_observer()
                    .on_next(move |value| next.next(f(value))),
            );
            Ok(Cleanup::from(subscription))
        })
    }

    /// Replaces an errored stream with the observable returned by `f`.
    pub fn catch<F>(&self, f: F) -> Self
    where
        F: Fn(E) -> Self + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Self::create(move |sink| {
            let serial = SerialSubscription::default();
            let recover = {
                let f = Arc::clone(&f);
                let sink = sink.clone();
                let serial = serial.clone();
                move |err| {
                    let serial = serial.clone();
                    f(err).subscribe(
                        sink.observer()
                            .on_start(move |subscription| serial.set(subscription.clone())),
                    );
                }
            };
            let start = serial.clone();
            source.subscribe(
                sink.observer()
                    .on_start(move |subscription| start.set(subscription.clone()))
                    .on_error(recover),
            );
            Ok(Cleanup::from(serial))
        })
    }

    /// Runs `f` once the subscription completes, errors, or is cancelled.
    pub fn finally<F>(&self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Self::create(move |sink| {
            let subscription = source.subscribe(sink.observer());
            let f = Arc::clone(&f);
            Ok(Cleanup::from_fn(move || {
                subscription.unsubscribe();
                f();
            }))
        })
    }

    /// Calls `observer` for every event before forwarding it downstream.
    pub fn tap(&self, observer: Observer<T, E>) -> Self
    where
        T: Clone,
        E: Clone,
    {
        let source = self.clone();
        let observer = Arc::new(observer);
        Self::create(move |sink| {
            let (start, next, error, complete) = (
                Arc::clone(&observer),
                Arc::clone(&observer),
                Arc::clone(&observer),
                Arc::clone(&observer),
            );
            let (next_sink, error_sink, complete_sink) = (sink.clone(), sink.clone(), sink.clone());
            let subscription = source.subscribe(
                Observer::new()
                    .on_start(move |subscription| start.start(subscription))
                    .on_next(move |value: T| {
                        next.next(value.clone());
                        next_sink.next(value);
                    })
                    .on_error(move |err: E| {
                        error.error(err.clone());
                        error_sink.error(err);
                    })
                    .on_complete(move || {
                        complete.complete();
                        complete_sink.complete();
                    }),
            );
            Ok(Cleanup::from(subscription))
        })
    }

    /// Emits the values of `self`, then those of `other`.
    pub fn concat(&self, other: &Self) -> Self {
        let source = self.clone();
        let other = other.clone();
        Self::create(move |sink| {
            let serial = SerialSubscription::default();
            let follow = {
                let other = other.clone();
                let sink = sink.clone();
                let serial = serial.clone();
                move || {
                    let serial = serial.clone();
                    other.subscribe(
                        sink.observer()
                            .on_start(move |subscription| serial.set(subscription.clone())),
                    );
                }
            };
            let start = serial.clone();
            source.subscribe(
                sink.observer()
                    .on_start(move |subscription| start.set(subscription.clone()))
                    .on_complete(follow),
            );
            Ok(Cleanup::from(serial))
        })
    }

    /// Subscribes to `alternate` when `self` completes without a value.
    pub fn if_empty(&self, alternate: &Self) -> Self {
        let source = self.clone();
        let alternate = alternate.clone();
        Self::create(move |sink| {
            let serial = SerialSubscription::default();
            let seen = Arc::new(AtomicBool::new(false));
            let next = {
                let sink = sink.clone();
                let seen = Arc::clone(&seen);
                move |value| {
                    seen.store(true, Ordering::Release);
                    sink.next(value);
                }
            };
            let complete = {
                let alternate = alternate.clone();
                let sink = sink.clone();
                let serial = serial.clone();
                move || {
                    if seen.load(Ordering::Acquire) {
                        sink.complete();
                        return;
                    }
                    let serial = serial.clone();
                    alternate.subscribe(
                        sink.observer()
                            .on_start(move |subscription| serial.set(subscription.clone())),
                    );
                }
            };
            let start = serial.clone();
            source.subscribe(
                sink.observer()
                    .on_start(move |subscription| start.set(subscription.clone()))
                    .on_next(next)
                    .on_complete(complete),
            );
            Ok(Cleanup::from(serial))
        })
    }

    /// Maps every value to an observable and merges their events.
    ///
    /// Completes once the source and every inner observable have completed;
    /// the first error from any of them terminates the result.
    pub fn merge_map<U, F>(&self, f: F) -> Observable<U, E>
    where
        U: Send + 'static,
        F: Fn(T) -> Observable<U, E> + Send + Sync + 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Observable::create(move |sink: Sink<U, E>| {
            let merge = Merge::new(sink.clone());
            let next = {
                let f = Arc::clone(&f);
                let merge = Arc::clone(&merge);
                move |value| {
                    if merge.sink.is_closed() {
                        return;
                    }
                    f(value).subscribe(merge.inner_observer(merge.sink.observer()));
                }
            };
            source.subscribe(
                merge.inner_observer(sink.terminal_observer())
                    .on_next(next),
            );
            Ok(Cleanup::from_fn(move || merge.unsubscribe()))
        })
    }

    /// Re-subscribes to `self` `interval` after each completion, forwarding
    /// every value.
    ///
    /// Cycles never overlap. The first cycle error terminates polling with
    /// that error. Unsubscribing cancels the pending timer and the in-flight
    /// cycle.
    ///
    /// # Panics
    ///
    /// Subscribing panics when called outside a tokio runtime.
    pub fn poll(&self, interval: Duration) -> Self {
        let source = self.clone();
        Self::create(move |sink| {
            let poller = Arc::new(Poller {
                source: source.clone(),
                sink,
                interval,
                serial: SerialSubscription::default(),
                shutdown: CancellationToken::new(),
            });
            poller.cycle();
            Ok(Cleanup::from_fn(move || poller.stop()))
        })
    }

    /// Resolves with the first value, or `None` when the stream completes
    /// empty. The subscription is cancelled after the first value and when
    /// the future is dropped.
    ///
    /// # Errors
    ///
    /// Returns the stream's error if it errors before emitting a value.
    pub async fn to_future(&self) -> Result<Option<T>, E> {
        let (sender, receiver) = oneshot::channel();
        let sender = Arc::new(Mutex::new(Some(sender)));
        let current = Arc::new(Mutex::new(None::<Subscription>));

        let send = move |result: Result<Option<T>, E>| {
            if let Some(sender) = sender.lock().take() {
                let _ = sender.send(result);
            }
        };
        let (on_next, on_error, on_complete) = (send.clone(), send.clone(), send);
        let start = Arc::clone(&current);
        let first = Arc::clone(&current);

        let subscription = self.subscribe(
            Observer::new()
                .on_start(move |subscription| *start.lock() = Some(subscription.clone()))
                .on_next(move |value| {
                    on_next(Ok(Some(value)));
                    let subscription = first.lock().take();
                    if let Some(subscription) = subscription {
                        subscription.unsubscribe();
                    }
                })
                .on_error(move |err| on_error(Err(err)))
                .on_complete(move || on_complete(Ok(None))),
        );
        let _guard = UnsubscribeOnDrop(subscription);

        receiver.await.unwrap_or(Ok(None))
    }
}

struct UnsubscribeOnDrop(Subscription);

impl Drop for UnsubscribeOnDrop {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

struct MergeState {
    closed: bool,
    active: usize,
    subscriptions: Vec<Subscription>,
}

/// Bookkeeping for `merge_map`: the number of live upstream subscriptions.
struct Merge<U, E> {
    sink: Sink<U, E>,
    state: Mutex<MergeState>,
}

impl<U, E> Merge<U, E>
where
    U: Send + 'static,
    E: Send + 'static,
{
    fn new(sink: Sink<U, E>) -> Arc<Self> {
        Arc::new(Self {
            sink,
            state: Mutex::new(MergeState {
                closed: false,
                active: 0,
                subscriptions: Vec::new(),
            }),
        })
    }

    /// Wraps `observer` so that it is counted while live and completes the
    /// merged sink when it is the last to complete.
    fn inner_observer<V>(self: &Arc<Self>, observer: Observer<V, E>) -> Observer<V, E> {
        let start = Arc::clone(self);
        let complete = Arc::clone(self);
        observer
            .on_start(move |subscription| start.track(subscription))
            .on_complete(move || complete.finish_one())
    }

    fn track(&self, subscription: &Subscription) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            subscription.unsubscribe();
            return;
        }
        state.active += 1;
        state.subscriptions.retain(|s| !s.is_closed());
        state.subscriptions.push(subscription.clone());
    }

    fn finish_one(&self) {
        let done = {
            let mut state = self.state.lock();
            state.active = state.active.saturating_sub(1);
            state.active == 0
        };
        if done {
            self.sink.complete();
        }
    }

    fn unsubscribe(&self) {
        let subscriptions = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.subscriptions)
        };
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}

/// State of one `poll` subscription.
struct Poller<T, E> {
    source: Observable<T, E>,
    sink: Sink<T, E>,
    interval: Duration,
    serial: SerialSubscription,
    shutdown: CancellationToken,
}

impl<T, E> Poller<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn cycle(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let start = self.serial.clone();
        let schedule = Arc::clone(self);
        self.source.subscribe(
            self.sink
                .observer()
                .on_start(move |subscription| start.set(subscription.clone()))
                .on_complete(move || schedule.schedule()),
        );
    }

    fn schedule(self: &Arc<Self>) {
        if self.shutdown.is_cancelled() {
            return;
        }
        debug!(interval = ?self.interval, "scheduling next poll cycle");
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = poller.shutdown.cancelled() => {}
                () = tokio::time::sleep(poller.interval) => poller.cycle(),
            }
        });
    }

    fn stop(&self) {
        self.shutdown.cancel();
        self.serial.unsubscribe();
    }
}
