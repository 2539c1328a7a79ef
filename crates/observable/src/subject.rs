use crate::cleanup::Cleanup;
use crate::observable::Observable;
use crate::observer::Observer;
use crate::sink::Sink;

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

#[derive(Clone)]
enum Event<T, E> {
    Next(T),
    Error(E),
    Complete,
}

struct SubjectState<T, E> {
    events: VecDeque<Event<T, E>>,
    limit: Option<usize>,
    terminated: bool,
    sinks: Vec<(u64, Sink<T, E>)>,
    next_id: u64,
}

struct Inner<T, E> {
    gate: ReentrantMutex<()>,
    state: Mutex<SubjectState<T, E>>,
}

/// An explicit multicast point that records every event and replays it to
/// each new subscriber before forwarding live events.
///
/// Plain [`Observable`]s never share executions; this type exists for
/// callers that opt into sharing one, such as request deduplication.
///
/// By default every value is kept until the subject is dropped. Use
/// [`with_replay_limit`](Self::with_replay_limit) for long-lived sources.
pub struct ReplaySubject<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> ReplaySubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates an empty subject that replays every value.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Creates an empty subject that replays only the latest `limit`
    /// values. The terminal event is always replayed.
    #[must_use]
    pub fn with_replay_limit(limit: usize) -> Self {
        Self::with_limit(Some(limit))
    }

    fn with_limit(limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                gate: ReentrantMutex::new(()),
                state: Mutex::new(SubjectState {
                    events: VecDeque::new(),
                    limit,
                    terminated: false,
                    sinks: Vec::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Records and forwards a value.
    pub fn next(&self, value: T) {
        self.emit(Event::Next(value));
    }

    /// Records and forwards an error, terminating the subject.
    pub fn error(&self, error: E) {
        self.emit(Event::Error(error));
    }

    /// Records and forwards completion, terminating the subject.
    pub fn complete(&self) {
        self.emit(Event::Complete);
    }

    /// Whether `error` or `complete` has been recorded.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.inner.state.lock().terminated
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.state.lock().sinks.len()
    }

    /// An observer that feeds this subject.
    #[must_use]
    pub fn observer(&self) -> Observer<T, E> {
        let (next, error, complete) = (self.clone(), self.clone(), self.clone());
        Observer::new()
            .on_next(move |value| next.next(value))
            .on_error(move |err| error.error(err))
            .on_complete(move || complete.complete())
    }

    /// An observable replaying recorded events, then forwarding live ones.
    #[must_use]
    pub fn observable(&self) -> Observable<T, E> {
        let inner = Arc::clone(&self.inner);
        Observable::create(move |sink| {
            let _gate = inner.gate.lock();
            let (events, id) = {
                let mut state = inner.state.lock();
                let id = if state.terminated {
                    None
                } else {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.sinks.push((id, sink.clone()));
                    Some(id)
                };
                (state.events.clone(), id)
            };

            for event in events {
                deliver(&sink, event);
            }

            let Some(id) = id else {
                return Ok(Cleanup::none());
            };
            let inner = Arc::clone(&inner);
            Ok(Cleanup::from_fn(move || {
                inner.state.lock().sinks.retain(|(sink_id, _)| *sink_id != id);
            }))
        })
    }

    fn emit(&self, event: Event<T, E>) {
        let _gate = self.inner.gate.lock();
        let sinks = {
            let mut state = self.inner.state.lock();
            if state.terminated {
                return;
            }
            state.record(event.clone());
            if matches!(event, Event::Next(_)) {
                state.sinks.clone()
            } else {
                state.terminated = true;
                std::mem::take(&mut state.sinks)
            }
        };
        for (_, sink) in sinks {
            deliver(&sink, event.clone());
        }
    }
}

impl<T, E> SubjectState<T, E> {
    fn record(&mut self, event: Event<T, E>) {
        if matches!(event, Event::Next(_)) {
            match self.limit {
                Some(0) => return,
                Some(limit) if self.events.len() >= limit => {
                    self.events.pop_front();
                }
                _ => {}
            }
        }
        self.events.push_back(event);
    }
}

fn deliver<T, E>(sink: &Sink<T, E>, event: Event<T, E>)
where
    T: Send + 'static,
    E: Send + 'static,
{
    match event {
        Event::Next(value) => sink.next(value),
        Event::Error(err) => sink.error(err),
        Event::Complete => sink.complete(),
    }
}

impl<T, E> Clone for ReplaySubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for ReplaySubject<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for ReplaySubject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ReplaySubject")
            .field("events", &state.events.len())
            .field("terminated", &state.terminated)
            .field("observers", &state.sinks.len())
            .finish()
    }
}
