//! Sharing of identical in-flight requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ferry_observable::{Cleanup, Observable, ReplaySubject, Subscription};
use parking_lot::Mutex;
use tracing::debug;

struct InflightRequest<T, E> {
    generation: u64,
    subject: ReplaySubject<T, E>,
    subscribers: usize,
    source: Option<Subscription>,
}

struct Inflight<T, E> {
    requests: HashMap<String, InflightRequest<T, E>>,
    next_generation: u64,
}

/// Lets concurrent executions of the same request share one underlying
/// subscription.
///
/// Subscribers joining late receive every event seen so far. The shared
/// request is cancelled once its last subscriber unsubscribes and forgotten
/// once it terminates, after which the next subscriber starts a new one.
///
/// Each shared request keeps its values for replay until it terminates, so a
/// long-lived source grows without bound unless the deduper is built with
/// [`with_replay_limit`](Self::with_replay_limit).
pub struct RequestDeduper<T, E> {
    inflight: Arc<Mutex<Inflight<T, E>>>,
    replay_limit: Option<usize>,
}

impl<T, E> RequestDeduper<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates a deduper with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(Inflight {
                requests: HashMap::new(),
                next_generation: 0,
            })),
            replay_limit: None,
        }
    }

    /// Creates a deduper whose late joiners only receive the latest `limit`
    /// values of a shared request.
    #[must_use]
    pub fn with_replay_limit(limit: usize) -> Self {
        Self {
            replay_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Returns an observable that joins the in-flight request registered under
    /// `identifier`, or starts `factory()` when there is none.
    pub fn dedupe<F>(&self, identifier: impl Into<String>, factory: F) -> Observable<T, E>
    where
        F: Fn() -> Observable<T, E> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        let inflight = Arc::clone(&self.inflight);
        let replay_limit = self.replay_limit;

        Observable::create(move |sink| {
            let (generation, subject, started) = join(&inflight, &identifier, replay_limit);

            if started {
                debug!(identifier = %identifier, "starting shared request");
                let finished = Arc::clone(&inflight);
                let key = identifier.clone();
                let source = factory()
                    .finally(move || forget(&finished, &key, generation))
                    .subscribe(subject.observer());

                let mut guard = inflight.lock();
                match guard.requests.get_mut(&identifier) {
                    Some(request) if request.generation == generation => {
                        request.source = Some(source);
                    }
                    _ => {}
                }
            } else {
                debug!(identifier = %identifier, "joining shared request");
            }

            let subscription = subject.observable().subscribe(sink.observer());
            let released = Arc::clone(&inflight);
            let key = identifier.clone();
            Ok(Cleanup::from_fn(move || {
                subscription.unsubscribe();
                release(&released, &key, generation);
            }))
        })
    }

    /// Number of shared requests currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().requests.len()
    }
}

fn join<T, E>(
    inflight: &Mutex<Inflight<T, E>>,
    identifier: &str,
    replay_limit: Option<usize>,
) -> (u64, ReplaySubject<T, E>, bool)
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let mut inflight = inflight.lock();
    if let Some(request) = inflight.requests.get_mut(identifier) {
        request.subscribers += 1;
        return (request.generation, request.subject.clone(), false);
    }

    let generation = inflight.next_generation;
    inflight.next_generation += 1;
    let subject = replay_limit.map_or_else(ReplaySubject::new, ReplaySubject::with_replay_limit);
    inflight.requests.insert(
        identifier.to_string(),
        InflightRequest {
            generation,
            subject: subject.clone(),
            subscribers: 1,
            source: None,
        },
    );
    (generation, subject, true)
}

fn forget<T, E>(inflight: &Mutex<Inflight<T, E>>, identifier: &str, generation: u64) {
    let mut inflight = inflight.lock();
    if inflight
        .requests
        .get(identifier)
        .is_some_and(|request| request.generation == generation)
    {
        inflight.requests.remove(identifier);
    }
}

fn release<T, E>(inflight: &Mutex<Inflight<T, E>>, identifier: &str, generation: u64) {
    let source = {
        let mut inflight = inflight.lock();
        let Some(request) = inflight.requests.get_mut(identifier) else {
            return;
        };
        if request.generation != generation {
            return;
        }
        request.subscribers = request.subscribers.saturating_sub(1);
        if request.subscribers > 0 {
            return;
        }
        inflight
            .requests
            .remove(identifier)
            .and_then(|request| request.source)
    };

    if let Some(source) = source {
        debug!(identifier, "last subscriber left, cancelling shared request");
        source.unsubscribe();
    }
}

impl<T, E> Clone for RequestDeduper<T, E> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
            replay_limit: self.replay_limit,
        }
    }
}

impl<T, E> Default for RequestDeduper<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for RequestDeduper<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDeduper")
            .field("in_flight", &self.inflight.lock().requests.len())
            .finish()
    }
}
