#![allow(dead_code)]

use std::fmt::Debug;
use std::sync::Arc;

use ferry_observable::Observer;
use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<T, E> {
    Next(T),
    Error(E),
    Complete,
    Unsubscribe,
}

/// Records every event an observer receives.
#[derive(Clone, Debug)]
pub struct Recorder<T, E> {
    events: Arc<Mutex<Vec<Event<T, E>>>>,
}

impl<T, E> Recorder<T, E>
where
    T: Clone + Debug + Send + 'static,
    E: Clone + Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn observer(&self) -> Observer<T, E> {
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

    pub fn events(&self) -> Vec<Event<T, E>> {
        self.events.lock().clone()
    }

    fn push(&self, event: Event<T, E>) {
        self.events.lock().push(event);
    }
}
