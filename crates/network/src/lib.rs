//! Network adapter for executing queries, mutations and subscriptions as
//! [`Observable`] streams.
//!
//! A [`Network`] is built from a caller-supplied [`FetchFunction`] and an
//! optional [`SubscribeFunction`]. [`Network::execute`] is the single entry
//! point: it classifies the request and routes it to the subscription path,
//! the polling path or a plain fetch. Structural misuse (uploads combined with
//! polling or subscriptions, subscriptions without a subscribe function) is
//! returned synchronously as an [`Error`]; transport failures are delivered
//! as the stream's [`TransportError`].
//!
//! Every subscriber must install an error callback: a transport failure that
//! reaches an observer without one is only logged.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod cache;
mod classify;
mod config;
mod convert;
mod dedupe;
mod error;
mod network;
mod operation;
mod response;
mod uploadable;

pub use cache::{CachedFetch, QueryResponseCache, QueryResponseCacheConfig};
pub use classify::{ExecutionPath, classify};
pub use config::CacheConfig;
pub use convert::{
    ExecuteFunction, FetchFunction, ObservableFromValue, SubscribeExecuteFunction,
    SubscribeFunction, convert_fetch, convert_subscribe, fetch_fn, subscribe_fn,
};
pub use dedupe::RequestDeduper;
pub use error::{Error, Result, TransportError};
pub use network::Network;
pub use operation::{OperationKind, RequestParameters, Variables, request_identifier};
pub use response::{GraphQlResponse, PayloadError, SourceLocation};
pub use uploadable::{Uploadable, UploadableMap, has_uploadables};

pub use ferry_observable::{Observable, Observer, Subscription};

/// Stream type produced by [`Network::execute`].
pub type ResponseObservable = Observable<GraphQlResponse, TransportError>;
