#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::Arc;

use ferry_network::{
    GraphQlResponse, Observer, OperationKind, RequestParameters, TransportError, Variables,
};
use parking_lot::Mutex;
use serde_json::Value;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event<T> {
    Next(T),
    Error(TransportError),
    Complete,
    Unsubscribe,
}

/// Records every event an observer receives.
#[derive(Clone, Debug)]
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<Event<T>>>>,
}

impl<T> Recorder<T>
where
    T: Clone + Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn observer(&self) -> Observer<T, TransportError> {
        let (next, error, complete, unsubscribe) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );
        Observer::new()
            .on_next(move |value| next.push(Event::Next(value)))
            .on_error(move |err| error.push(Event::Error(err)))
            .on_complete(move || complete.push(Event::Complete))
            .on_unsubscribe(move |_| unsubscribe.push(Event::Unsubscribe))
    }

    pub fn events(&self) -> Vec<Event<T>> {
        self.events.lock().clone()
    }

    fn push(&self, event: Event<T>) {
        self.events.lock().push(event);
    }
}

pub fn operation(kind: OperationKind) -> RequestParameters {
    RequestParameters::new("TestOperation", kind, "query TestOperation { node { id } }")
}

pub fn variables(value: Value) -> Variables {
    match value {
        Value::Object(map) => map,
        _ => panic!("variables must be an object"),
    }
}

pub fn payload(data: Value) -> GraphQlResponse {
    GraphQlResponse::from_data(data)
}
