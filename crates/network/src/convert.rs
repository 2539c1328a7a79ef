//! Adapts caller-supplied fetch and subscribe functions into observables.

use crate::config::CacheConfig;
use crate::error::TransportError;
use crate::operation::{RequestParameters, Variables};
use crate::response::GraphQlResponse;
use crate::uploadable::UploadableMap;
use crate::ResponseObservable;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use ferry_observable::{Cleanup, Observable, Sink};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use parking_lot::Mutex;

/// Result of a fetch or subscribe function.
pub enum ObservableFromValue<T> {
    /// A single payload, available immediately.
    Value(T),
    /// A failure, available immediately.
    Error(TransportError),
    /// A single payload resolved later.
    Future(BoxFuture<'static, Result<T, TransportError>>),
    /// Payloads produced over time; the first `Err` ends the stream.
    Stream(BoxStream<'static, Result<T, TransportError>>),
    /// An observable subscribed once for this execution.
    Observable(Observable<T, TransportError>),
}

impl<T> ObservableFromValue<T>
where
    T: Send + 'static,
{
    /// Boxes `future`.
    pub fn future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        Self::Future(Box::pin(future))
    }

    /// Boxes `stream`.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T, TransportError>> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    /// Wraps the value in an observable.
    ///
    /// `Future` and `Stream` values are consumed by the first subscription;
    /// later subscriptions error with [`TransportError::Closed`].
    #[must_use]
    pub fn into_observable(self) -> Observable<T, TransportError> {
        match self {
            Self::Observable(observable) => observable,
            once => {
                let slot = Mutex::new(Some(once));
                Observable::create(move |sink| {
                    let value = slot.lock().take();
                    match value {
                        Some(value) => value.forward(sink),
                        None => Err(TransportError::Closed),
                    }
                })
            }
        }
    }

    /// Delivers the value into `sink`, returning what cancels it.
    ///
    /// Futures and streams are driven on a spawned tokio task.
    pub(crate) fn forward(self, sink: Sink<T, TransportError>) -> Result<Cleanup, TransportError> {
        match self {
            Self::Value(value) => {
                sink.next(value);
                sink.complete();
                Ok(Cleanup::none())
            }
            Self::Error(err) => Err(err),
            Self::Future(future) => {
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
            }
            Self::Stream(mut stream) => {
                let handle = tokio::spawn(async move {
                    while let Some(item) = stream.next().await {
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
            }
            Self::Observable(observable) => {
                Ok(Cleanup::from(observable.subscribe(sink.observer())))
            }
        }
    }
}

impl<T> From<Result<T, TransportError>> for ObservableFromValue<T> {
    fn from(result: Result<T, TransportError>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(err) => Self::Error(err),
        }
    }
}

impl<T> From<Observable<T, TransportError>> for ObservableFromValue<T> {
    fn from(observable: Observable<T, TransportError>) -> Self {
        Self::Observable(observable)
    }
}

impl<T> fmt::Debug for ObservableFromValue<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Future(_) => f.write_str("Future(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Observable(observable) => f.debug_tuple("Observable").field(observable).finish(),
        }
    }
}

/// Single-shot request function: resolves to one or more payloads, then
/// finishes.
pub trait FetchFunction: Send + Sync + 'static {
    /// Starts the request.
    fn fetch(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        config: &CacheConfig,
        uploadables: Option<&UploadableMap>,
    ) -> ObservableFromValue<GraphQlResponse>;
}

impl<F> FetchFunction for F
where
    F: Fn(
            &RequestParameters,
            &Variables,
            &CacheConfig,
            Option<&UploadableMap>,
        ) -> ObservableFromValue<GraphQlResponse>
        + Send
        + Sync
        + 'static,
{
    fn fetch(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        config: &CacheConfig,
        uploadables: Option<&UploadableMap>,
    ) -> ObservableFromValue<GraphQlResponse> {
        self(params, variables, config, uploadables)
    }
}

/// Long-lived request function for subscriptions: emits payloads until the
/// server ends the stream or the caller cancels.
pub trait SubscribeFunction: Send + Sync + 'static {
    /// Opens the subscription.
    fn subscribe(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        config: &CacheConfig,
    ) -> ObservableFromValue<GraphQlResponse>;
}

impl<F> SubscribeFunction for F
where
    F: Fn(&RequestParameters, &Variables, &CacheConfig) -> ObservableFromValue<GraphQlResponse>
        + Send
        + Sync
        + 'static,
{
    fn subscribe(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        config: &CacheConfig,
    ) -> ObservableFromValue<GraphQlResponse> {
        self(params, variables, config)
    }
}

/// Pins a closure to the [`FetchFunction`] signature so that its reference
/// arguments are inferred for any lifetime.
pub const fn fetch_fn<F>(f: F) -> F
where
    F: Fn(
            &RequestParameters,
            &Variables,
            &CacheConfig,
            Option<&UploadableMap>,
        ) -> ObservableFromValue<GraphQlResponse>
        + Send
        + Sync
        + 'static,
{
    f
}

/// Pins a closure to the [`SubscribeFunction`] signature.
pub const fn subscribe_fn<F>(f: F) -> F
where
    F: Fn(&RequestParameters, &Variables, &CacheConfig) -> ObservableFromValue<GraphQlResponse>
        + Send
        + Sync
        + 'static,
{
    f
}

/// Fetch adapted to return an observable.
pub type ExecuteFunction = Arc<
    dyn Fn(&RequestParameters, &Variables, &CacheConfig, Option<&UploadableMap>) -> ResponseObservable
        + Send
        + Sync,
>;

/// Subscribe adapted to return an observable.
pub type SubscribeExecuteFunction =
    Arc<dyn Fn(&RequestParameters, &Variables, &CacheConfig) -> ResponseObservable + Send + Sync>;

/// Adapts `fetch` so that every subscription to the returned observable
/// calls it once with copies of the arguments.
pub fn convert_fetch<F>(fetch: F) -> ExecuteFunction
where
    F: FetchFunction,
{
    let fetch = Arc::new(fetch);
    Arc::new(
        move |params: &RequestParameters,
              variables: &Variables,
              config: &CacheConfig,
              uploadables: Option<&UploadableMap>| {
            let fetch = Arc::clone(&fetch);
            let (params, variables, config) = (params.clone(), variables.clone(), config.clone());
            let uploadables = uploadables.cloned();
            Observable::create(move |sink| {
                fetch
                    .fetch(&params, &variables, &config, uploadables.as_ref())
                    .forward(sink)
            })
        },
    )
}

/// Adapts `subscribe` the same way [`convert_fetch`] adapts a fetch.
pub fn convert_subscribe<S>(subscribe: S) -> SubscribeExecuteFunction
where
    S: SubscribeFunction,
{
    let subscribe = Arc::new(subscribe);
    Arc::new(
        move |params: &RequestParameters, variables: &Variables, config: &CacheConfig| {
            let subscribe = Arc::clone(&subscribe);
            let (params, variables, config) = (params.clone(), variables.clone(), config.clone());
            Observable::create(move |sink| {
                subscribe
                    .subscribe(&params, &variables, &config)
                    .forward(sink)
            })
        },
    )
}
