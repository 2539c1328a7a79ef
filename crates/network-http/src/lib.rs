//! HTTP and WebSocket transports for `ferry-network`.
//!
//! [`HttpFetch`] is a fetch function that posts operations as JSON, or as a
//! multipart request when files are attached. [`WsSubscribe`] is a subscribe
//! function speaking the `graphql-transport-ws` protocol, one socket per
//! subscription.
//!
//! ```no_run
//! use ferry_network::Network;
//! use ferry_network_http::{HttpFetch, WsSubscribe};
//!
//! # fn main() -> Result<(), ferry_network_http::Error> {
//! let network = Network::create(HttpFetch::builder().endpoint("https://api.example.com/graphql").build()?)
//!     .with_subscribe(WsSubscribe::builder().endpoint("wss://api.example.com/graphql").build()?);
//! # drop(network);
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod body;
mod error;
mod fetch;
mod protocol;
mod subscribe;

pub use error::{Error, Result};
pub use fetch::{DEFAULT_REQUEST_TIMEOUT, HttpFetch, HttpFetchBuilder, HttpFetchConfig};
pub use subscribe::{DEFAULT_ACK_TIMEOUT, WsSubscribe, WsSubscribeBuilder, WsSubscribeConfig};
