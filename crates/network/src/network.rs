use crate::ResponseObservable;
use crate::classify::{ExecutionPath, classify};
use crate::config::CacheConfig;
use crate::convert::{
    ExecuteFunction, FetchFunction, SubscribeExecuteFunction, SubscribeFunction, convert_fetch,
    convert_subscribe,
};
use crate::error::{Error, Result};
use crate::operation::{RequestParameters, Variables};
use crate::uploadable::{UploadableMap, has_uploadables};

use std::fmt;

use tracing::{debug, instrument};

/// Network layer built from a fetch function and an optional subscribe
/// function.
///
/// Instances hold no shared state; cloning is cheap and several networks
/// (for example one per endpoint) can coexist.
#[derive(Clone)]
pub struct Network {
    fetch: ExecuteFunction,
    subscribe: Option<SubscribeExecuteFunction>,
}

impl Network {
    /// Creates a network that can execute queries and mutations.
    pub fn create<F>(fetch: F) -> Self
    where
        F: FetchFunction,
    {
        Self {
            fetch: convert_fetch(fetch),
            subscribe: None,
        }
    }

    /// Adds subscription support.
    #[must_use]
    pub fn with_subscribe<S>(mut self, subscribe: S) -> Self
    where
        S: SubscribeFunction,
    {
        self.subscribe = Some(convert_subscribe(subscribe));
        self
    }

    /// Whether a subscribe function was supplied.
    #[must_use]
    pub const fn supports_subscriptions(&self) -> bool {
        self.subscribe.is_some()
    }

    /// Executes an operation.
    ///
    /// Nothing is sent until the returned observable is subscribed; every
    /// subscription starts its own request. Transport failures arrive as the
    /// stream's error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedOperation`] for a subscription when no
    /// subscribe function was supplied, and [`Error::InvalidUsage`] when
    /// uploadables are combined with a subscription or with polling.
    ///
    /// # Panics
    ///
    /// Subscribing to a polling stream panics outside a tokio runtime, since
    /// every cycle is scheduled on a spawned timer task. The same holds for
    /// fetch functions returning a future or a stream.
    #[instrument(
        skip_all,
        fields(operation = %params.name, kind = %params.kind())
    )]
    pub fn execute(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        config: &CacheConfig,
        uploadables: Option<&UploadableMap>,
    ) -> Result<ResponseObservable> {
        let uploading = has_uploadables(uploadables);

        match classify(params, config) {
            ExecutionPath::Subscription => {
                let Some(subscribe) = &self.subscribe else {
                    return Err(Error::UnsupportedOperation(
                        "this network layer does not support subscriptions".to_string(),
                    ));
                };
                if uploading {
                    return Err(Error::InvalidUsage(
                        "uploadables cannot be used with subscriptions".to_string(),
                    ));
                }
                debug!("executing as subscription");
                Ok(subscribe(params, variables, config))
            }
            ExecutionPath::Poll(interval) => {
                if uploading {
                    return Err(Error::InvalidUsage(
                        "uploadables cannot be used with polling".to_string(),
                    ));
                }
                debug!(?interval, "executing as polling fetch");
                let forced = config.clone().with_force(true);
                Ok((self.fetch)(params, variables, &forced, None).poll(interval))
            }
            ExecutionPath::Fetch => {
                debug!("executing as fetch");
                Ok((self.fetch)(params, variables, config, uploadables))
            }
        }
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("subscriptions", &self.supports_subscriptions())
            .finish_non_exhaustive()
    }
}
