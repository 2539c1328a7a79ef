use crate::config::CacheConfig;
use crate::operation::{OperationKind, RequestParameters};

use std::time::Duration;

/// How [`Network::execute`](crate::Network::execute) runs a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionPath {
    /// Long-lived stream through the subscribe function.
    Subscription,
    /// Forced fetch repeated every interval.
    Poll(Duration),
    /// Single fetch.
    Fetch,
}

/// Picks the execution path of a request. Subscriptions never poll.
#[must_use]
pub const fn classify(params: &RequestParameters, config: &CacheConfig) -> ExecutionPath {
    match (params.kind(), config.poll) {
        (OperationKind::Subscription, _) => ExecutionPath::Subscription,
        (_, Some(interval)) => ExecutionPath::Poll(interval),
        (_, None) => ExecutionPath::Fetch,
    }
}
