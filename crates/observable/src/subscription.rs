use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Type-erased control over one live subscription.
pub(crate) trait Control: Send + Sync {
    fn unsubscribe(self: Arc<Self>);

    fn is_closed(&self) -> bool;
}

/// Handle to a subscription returned by [`crate::Observable::subscribe`].
///
/// Cancellation is explicit: dropping the handle leaves the subscription
/// running.
#[derive(Clone)]
pub struct Subscription {
    control: Arc<dyn Control>,
}

impl Subscription {
    pub(crate) fn new(control: Arc<dyn Control>) -> Self {
        Self { control }
    }

    /// Cancels the subscription and runs the producer's cleanup.
    ///
    /// Idempotent, and a no-op once the subscription completed or errored.
    /// Once this returns no further event reaches the observer.
    pub fn unsubscribe(&self) {
        Arc::clone(&self.control).unsubscribe();
    }

    /// Whether the subscription has completed, errored, or been cancelled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[derive(Default)]
struct SerialState {
    closed: bool,
    current: Option<Subscription>,
}

/// Holds the one upstream subscription an operator currently listens to.
///
/// Operators that switch sources (`catch`, `concat`, `poll`) replace the
/// current subscription; once closed, anything set afterwards is cancelled
/// on arrival.
#[derive(Clone, Default)]
pub(crate) struct SerialSubscription {
    state: Arc<Mutex<SerialState>>,
}

impl SerialSubscription {
    pub(crate) fn set(&self, subscription: Subscription) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            subscription.unsubscribe();
        } else {
            state.current = Some(subscription);
        }
    }

    pub(crate) fn unsubscribe(&self) {
        let current = {
            let mut state = self.state.lock();
            state.closed = true;
            state.current.take()
        };
        if let Some(subscription) = current {
            subscription.unsubscribe();
        }
    }
}

impl From<SerialSubscription> for crate::Cleanup {
    fn from(serial: SerialSubscription) -> Self {
        Self::from_fn(move || serial.unsubscribe())
    }
}
