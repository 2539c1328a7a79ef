use crate::subscription::Subscription;

use std::fmt;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Teardown = Box<dyn FnOnce() + Send>;

/// Disposer returned by a producer.
///
/// Runs at most once: when the subscription reaches a terminal state or is
/// unsubscribed. A cleanup returned after the subscription already closed is
/// run immediately.
#[derive(Default)]
pub struct Cleanup(Option<Teardown>);

impl Cleanup {
    /// A cleanup that does nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// Runs `teardown` when the subscription closes.
    pub fn from_fn<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Some(Box::new(teardown)))
    }

    /// Combines several cleanups; they run in order.
    #[must_use]
    pub fn all(cleanups: Vec<Self>) -> Self {
        Self::from_fn(move || {
            for cleanup in cleanups {
                cleanup.run();
            }
        })
    }

    pub(crate) fn run(self) {
        if let Some(teardown) = self.0 {
            teardown();
        }
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cleanup")
            .field(&self.0.as_ref().map(|_| "teardown"))
            .finish()
    }
}

impl From<Subscription> for Cleanup {
    fn from(subscription: Subscription) -> Self {
        Self::from_fn(move || subscription.unsubscribe())
    }
}

impl<T> From<JoinHandle<T>> for Cleanup
where
    T: Send + 'static,
{
    fn from(handle: JoinHandle<T>) -> Self {
        Self::from_fn(move || handle.abort())
    }
}

impl From<CancellationToken> for Cleanup {
    fn from(token: CancellationToken) -> Self {
        Self::from_fn(move || token.cancel())
    }
}
