use crate::subscription::Subscription;

use std::any::type_name;
use std::fmt;

use tracing::error;

type StartFn = Box<dyn Fn(&Subscription) + Send + Sync>;
type NextFn<T> = Box<dyn Fn(T) + Send + Sync>;
type ErrorFn<E> = Box<dyn Fn(E) + Send + Sync>;
type CompleteFn = Box<dyn Fn() + Send + Sync>;

/// Callbacks receiving the events of one subscription.
///
/// Every callback is optional. `on_start` runs before the producer and may
/// unsubscribe immediately. `on_unsubscribe` only runs for explicit
/// cancellation, never after `complete` or `error`.
pub struct Observer<T, E> {
    start: Option<StartFn>,
    next: Option<NextFn<T>>,
    error: Option<ErrorFn<E>>,
    complete: Option<CompleteFn>,
    unsubscribe: Option<StartFn>,
}

impl<T, E> Observer<T, E> {
    /// Creates an observer with no callbacks.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            start: None,
            next: None,
            error: None,
            complete: None,
            unsubscribe: None,
        }
    }

    /// Creates an observer that only handles values.
    pub fn from_fn<F>(next: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::new().on_next(next)
    }

    /// Sets the callback run with the subscription handle before the producer.
    #[must_use]
    pub fn on_start<F>(mut self, start: F) -> Self
    where
        F: Fn(&Subscription) + Send + Sync + 'static,
    {
        self.start = Some(Box::new(start));
        self
    }

    /// Sets the value callback.
    #[must_use]
    pub fn on_next<F>(mut self, next: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.next = Some(Box::new(next));
        self
    }

    /// Sets the error callback.
    #[must_use]
    pub fn on_error<F>(mut self, error: F) -> Self
    where
        F: Fn(E) + Send + Sync + 'static,
    {
        self.error = Some(Box::new(error));
        self
    }

    /// Sets the completion callback.
    #[must_use]
    pub fn on_complete<F>(mut self, complete: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.complete = Some(Box::new(complete));
        self
    }

    /// Sets the callback run when the subscription is cancelled.
    #[must_use]
    pub fn on_unsubscribe<F>(mut self, unsubscribe: F) -> Self
    where
        F: Fn(&Subscription) + Send + Sync + 'static,
    {
        self.unsubscribe = Some(Box::new(unsubscribe));
        self
    }

    pub(crate) fn start(&self, subscription: &Subscription) {
        if let Some(start) = &self.start {
            start(subscription);
        }
    }

    pub(crate) fn next(&self, value: T) {
        if let Some(next) = &self.next {
            next(value);
        }
    }

    pub(crate) fn error(&self, err: E) {
        match &self.error {
            Some(handler) => handler(err),
            None => error!(
                error_type = type_name::<E>(),
                "observable error reached an observer without an error callback"
            ),
        }
    }

    pub(crate) fn complete(&self) {
        if let Some(complete) = &self.complete {
            complete();
        }
    }

    pub(crate) fn unsubscribe(&self, subscription: &Subscription) {
        if let Some(unsubscribe) = &self.unsubscribe {
            unsubscribe(subscription);
        }
    }
}

impl<T, E> Default for Observer<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Observer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("start", &self.start.is_some())
            .field("next", &self.next.is_some())
            .field("error", &self.error.is_some())
            .field("complete", &self.complete.is_some())
            .field("unsubscribe", &self.unsubscribe.is_some())
            .finish()
    }
}
