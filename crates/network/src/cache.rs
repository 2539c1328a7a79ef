//! Time-bounded response cache and a fetch function that consults it.

use crate::config::CacheConfig;
use crate::convert::{FetchFunction, ObservableFromValue};
use crate::operation::{OperationKind, RequestParameters, Variables, stable_variables};
use crate::response::GraphQlResponse;
use crate::uploadable::UploadableMap;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use ferry_observable::{Cleanup, Observable, Observer};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Limits of a [`QueryResponseCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueryResponseCacheConfig {
    /// Maximum number of cached responses. Zero disables the cache.
    pub size: usize,
    /// How long a response stays fresh. Zero disables the cache.
    pub ttl: Duration,
}

impl Default for QueryResponseCacheConfig {
    fn default() -> Self {
        Self {
            size: 250,
            ttl: Duration::from_secs(300),
        }
    }
}

impl QueryResponseCacheConfig {
    /// Sets the maximum number of entries.
    #[must_use]
    pub const fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets the freshness window.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

struct Entry {
    payloads: Vec<GraphQlResponse>,
    fetched_at: Instant,
}

/// Entries plus a counter bumped by every `clear`.
struct Store {
    lru: LruCache<String, Entry>,
    generation: u64,
}

/// Least-recently-used cache of query responses keyed by query identity and
/// variables.
#[derive(Clone)]
pub struct QueryResponseCache {
    entries: Option<Arc<Mutex<Store>>>,
    ttl: Duration,
}

impl QueryResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(config: QueryResponseCacheConfig) -> Self {
        let entries = NonZeroUsize::new(config.size)
            .filter(|_| !config.ttl.is_zero())
            .map(|size| {
                Arc::new(Mutex::new(Store {
                    lru: LruCache::new(size),
                    generation: 0,
                }))
            });

        Self {
            entries,
            ttl: config.ttl,
        }
    }

    /// Returns the payloads stored for `query_id` and `variables` if they are
    /// still fresh. Stale entries are evicted.
    #[must_use]
    pub fn get(&self, query_id: &str, variables: &Variables) -> Option<Vec<GraphQlResponse>> {
        let entries = self.entries.as_ref()?;
        let key = cache_key(query_id, variables);
        let mut store = entries.lock();

        let fresh = store
            .lru
            .get(&key)
            .map(|entry| entry.fetched_at.elapsed() < self.ttl)?;
        if fresh {
            store.lru.get(&key).map(|entry| entry.payloads.clone())
        } else {
            store.lru.pop(&key);
            None
        }
    }

    /// Stores `payloads` for `query_id` and `variables`.
    pub fn set(&self, query_id: &str, variables: &Variables, payloads: Vec<GraphQlResponse>) {
        if let Some(entries) = &self.entries {
            put(&mut entries.lock(), query_id, variables, payloads);
        }
    }

    /// Removes every entry. Writes started before the clear are dropped.
    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            let mut store = entries.lock();
            store.lru.clear();
            store.generation += 1;
        }
    }

    /// Current clear generation, paired with [`Self::set_if_current`].
    pub(crate) fn generation(&self) -> u64 {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.lock().generation)
    }

    /// Stores `payloads` unless the cache was cleared since `generation`.
    /// Returns `false` when the write was dropped as stale.
    pub(crate) fn set_if_current(
        &self,
        generation: u64,
        query_id: &str,
        variables: &Variables,
        payloads: Vec<GraphQlResponse>,
    ) -> bool {
        let Some(entries) = &self.entries else {
            return true;
        };
        let mut store = entries.lock();
        if store.generation != generation {
            return false;
        }
        put(&mut store, query_id, variables, payloads);
        true
    }

    /// Number of stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.lock().lru.len())
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for QueryResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResponseCache")
            .field("enabled", &self.entries.is_some())
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn put(store: &mut Store, query_id: &str, variables: &Variables, payloads: Vec<GraphQlResponse>) {
    store.lru.put(
        cache_key(query_id, variables),
        Entry {
            payloads,
            fetched_at: Instant::now(),
        },
    );
}

fn cache_key(query_id: &str, variables: &Variables) -> String {
    format!("{query_id}{}", stable_variables(variables))
}

/// A [`FetchFunction`] answering fresh queries from a [`QueryResponseCache`].
///
/// Queries without `force` are served from the cache when possible; every
/// successful query response is stored. A mutation clears the cache before
/// it runs.
pub struct CachedFetch<F> {
    inner: Arc<F>,
    cache: QueryResponseCache,
}

impl<F> CachedFetch<F>
where
    F: FetchFunction,
{
    /// Wraps `inner` with `cache`.
    pub fn new(inner: F, cache: QueryResponseCache) -> Self {
        Self {
            inner: Arc::new(inner),
            cache,
        }
    }

    /// The cache consulted by this fetch.
    pub const fn cache(&self) -> &QueryResponseCache {
        &self.cache
    }
}

impl<F> FetchFunction for CachedFetch<F>
where
    F: FetchFunction,
{
    fn fetch(
        &self,
        params: &RequestParameters,
        variables: &Variables,
        config: &CacheConfig,
        uploadables: Option<&UploadableMap>,
    ) -> ObservableFromValue<GraphQlResponse> {
        let query_id = params.identifier();

        match params.kind() {
            OperationKind::Mutation => {
                debug!(operation = %params.name, "mutation clears the response cache");
                self.cache.clear();
                return self.inner.fetch(params, variables, config, uploadables);
            }
            OperationKind::Subscription => {
                return self.inner.fetch(params, variables, config, uploadables);
            }
            OperationKind::Query => {}
        }

        if !config.force {
            if let Some(payloads) = self.cache.get(query_id, variables) {
                debug!(operation = %params.name, "response cache hit");
                return ObservableFromValue::Observable(Observable::from_values(payloads));
            }
        }
        debug!(operation = %params.name, force = config.force, "response cache miss");

        let source = self
            .inner
            .fetch(params, variables, config, uploadables)
            .into_observable();
        let cache = self.cache.clone();
        let generation = cache.generation();
        let query_id = query_id.to_string();
        let variables = variables.clone();

        ObservableFromValue::Observable(Observable::create(move |sink| {
            let received = Arc::new(Mutex::new(Vec::new()));
            let collect = Arc::clone(&received);
            let (cache, query_id, variables) = (cache.clone(), query_id.clone(), variables.clone());

            let subscription = source
                .tap(
                    Observer::new()
                        .on_next(move |payload: GraphQlResponse| collect.lock().push(payload))
                        .on_complete(move || {
                            let payloads = std::mem::take(&mut *received.lock());
                            let cacheable = !payloads.is_empty()
                                && !payloads.iter().any(GraphQlResponse::has_errors);
                            if cacheable
                                && !cache.set_if_current(generation, &query_id, &variables, payloads)
                            {
                                debug!("cache cleared while the query was in flight, dropping response");
                            }
                        }),
                )
                .subscribe(sink.observer());
            Ok(Cleanup::from(subscription))
        }))
    }
}

impl<F> fmt::Debug for CachedFetch<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFetch")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
