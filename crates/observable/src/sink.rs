use crate::cleanup::Cleanup;
use crate::observer::Observer;
use crate::subscription::{Control, Subscription};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex};

/// Per-subscription delivery state shared by a [`Sink`] and its [`Subscription`].
///
/// `gate` serializes delivery with the terminal transition. It is re-entrant
/// so observers may unsubscribe, or producers emit, from inside a callback.
/// Cleanups always run after the gate is released.
pub(crate) struct State<T, E> {
    gate: ReentrantMutex<()>,
    closed: AtomicBool,
    observer: Mutex<Option<Arc<Observer<T, E>>>>,
    cleanup: Mutex<Option<Cleanup>>,
}

impl<T, E> State<T, E>
where
    T: 'static,
    E: 'static,
{
    pub(crate) fn new(observer: Observer<T, E>) -> Arc<Self> {
        Arc::new(Self {
            gate: ReentrantMutex::new(()),
            closed: AtomicBool::new(false),
            observer: Mutex::new(Some(Arc::new(observer))),
            cleanup: Mutex::new(None),
        })
    }

    pub(crate) fn subscription(self: &Arc<Self>) -> Subscription {
        Subscription::new(Arc::clone(self) as Arc<dyn Control>)
    }

    pub(crate) fn observer(&self) -> Option<Arc<Observer<T, E>>> {
        self.observer.lock().clone()
    }

    pub(crate) fn attach_cleanup(&self, cleanup: Cleanup) {
        let mut slot = self.cleanup.lock();
        if self.closed.load(Ordering::Acquire) {
            drop(slot);
            cleanup.run();
        } else {
            *slot = Some(cleanup);
        }
    }

    fn release(&self) {
        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
    }

    /// Marks the state closed and hands back the observer, or `None` if it
    /// was already closed. Caller must hold the gate.
    fn close(&self) -> Option<Arc<Observer<T, E>>> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }
        self.observer.lock().take()
    }
}

impl<T, E> Control for State<T, E>
where
    T: 'static,
    E: 'static,
{
    fn unsubscribe(self: Arc<Self>) {
        {
            let _gate = self.gate.lock();
            let Some(observer) = self.close() else {
                return;
            };
            observer.unsubscribe(&self.subscription());
        }
        self.release();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Producer-side handle used to emit events to one subscriber.
///
/// Cheap to clone, so producers can move it into spawned tasks. After
/// `error`, `complete`, or cancellation every further call is ignored.
pub struct Sink<T, E> {
    state: Arc<State<T, E>>,
}

impl<T, E> Sink<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub(crate) const fn new(state: Arc<State<T, E>>) -> Self {
        Self { state }
    }

    /// Delivers a value.
    pub fn next(&self, value: T) {
        let _gate = self.state.gate.lock();
        if self.state.is_closed() {
            return;
        }
        if let Some(observer) = self.state.observer() {
            observer.next(value);
        }
    }

    /// Delivers a terminal error and runs the cleanup.
    pub fn error(&self, error: E) {
        {
            let _gate = self.state.gate.lock();
            let Some(observer) = self.state.close() else {
                return;
            };
            observer.error(error);
        }
        self.state.release();
    }

    /// Completes the subscription and runs the cleanup.
    pub fn complete(&self) {
        {
            let _gate = self.state.gate.lock();
            let Some(observer) = self.state.close() else {
                return;
            };
            observer.complete();
        }
        self.state.release();
    }

    /// Whether the subscriber is gone; producers may stop work early.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    /// An observer forwarding every event into this sink.
    #[must_use]
    pub fn observer(&self) -> Observer<T, E> {
        let next = self.clone();
        self.terminal_observer().on_next(move |value| next.next(value))
    }

    /// An observer forwarding only `error` and `complete` into this sink.
    pub(crate) fn terminal_observer<U>(&self) -> Observer<U, E> {
        let error = self.clone();
        let complete = self.clone();
        Observer::new()
            .on_error(move |err| error.error(err))
            .on_complete(move || complete.complete())
    }
}

impl<T, E> Clone for Sink<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> fmt::Debug for Sink<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("closed", &self.state.closed.load(Ordering::Acquire))
            .finish()
    }
}
