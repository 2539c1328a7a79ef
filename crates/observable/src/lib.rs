//! Single-subscriber observables for network operations.
//!
//! An [`Observable`] is a lazy factory around a producer function. Every call
//! to [`Observable::subscribe`] runs the producer again for exactly one
//! [`Observer`]; there is no implicit multicast. Producers emit through a
//! [`Sink`] and return a [`Cleanup`] that is run exactly once, when the
//! subscription completes, errors, or is cancelled through its
//! [`Subscription`] handle.
//!
//! Consumers are expected to install an error callback on every observer.
//! Errors that reach an observer without one are logged at `error` level and
//! otherwise dropped.
//!
//! # Example
//!
//! ```
//! use ferry_observable::{Cleanup, Observable, Observer};
//!
//! let numbers: Observable<u32, String> = Observable::create(|sink| {
//!     sink.next(1);
//!     sink.next(2);
//!     sink.complete();
//!     Ok(Cleanup::none())
//! });
//!
//! let subscription = numbers
//!     .map(|n| n * 10)
//!     .subscribe(Observer::new().on_next(|n| println!("got {n}")).on_error(|e| eprintln!("{e}")));
//!
//! assert!(subscription.is_closed());
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod cleanup;
mod observable;
mod observer;
mod operators;
mod sink;
mod stream;
mod subject;
mod subscription;

pub use cleanup::Cleanup;
pub use observable::Observable;
pub use observer::Observer;
pub use sink::Sink;
pub use stream::ObservableStream;
pub use subject::ReplaySubject;
pub use subscription::Subscription;
