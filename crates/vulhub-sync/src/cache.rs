use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, trace, warn};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vulhub_api::ApiError;

use crate::config::{QueryOptions, SyncConfig};
use crate::key::QueryKey;
use crate::poll::PollingScheduler;

type AnyValue = Arc<dyn Any + Send + Sync>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyValue, ApiError>> + Send + Sync>;

/// What subscribers of one key observe. Values are type-erased here and
/// downcast by [`Subscription`].
#[derive(Clone, Default)]
struct Snapshot {
    value: Option<AnyValue>,
    error: Option<ApiError>,
    is_fetching: bool,
    invalidated: bool,
    updated_at: Option<Instant>,
    stale_at: Option<Instant>,
    completed: u64,
}

struct Entry {
    fetcher: Fetcher,
    options: QueryOptions,
    subscribers: usize,
    /// Generation of the most recently dispatched fetch.
    dispatched: u64,
    in_flight: bool,
    idle_since: Option<Instant>,
    state: watch::Sender<Snapshot>,
}

impl Entry {
    fn new(fetcher: Fetcher, options: QueryOptions) -> Self {
        let (state, _) = watch::channel(Snapshot::default());
        Self {
            fetcher,
            options,
            subscribers: 0,
            dispatched: 0,
            in_flight: false,
            idle_since: Some(Instant::now()),
            state,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        let snapshot = self.state.borrow();
        snapshot.invalidated || snapshot.stale_at.is_none_or(|stale_at| now >= stale_at)
    }

    fn begin_fetch(&mut self) -> (u64, Fetcher) {
        self.dispatched += 1;
        self.in_flight = true;
        self.state.send_modify(|snapshot| snapshot.is_fetching = true);
        (self.dispatched, Arc::clone(&self.fetcher))
    }
}

/// Point-in-time view of one entry, independent of its value type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub subscribers: usize,
    pub has_value: bool,
    pub is_stale: bool,
    pub is_fetching: bool,
    pub error: Option<ApiError>,
    pub generation: u64,
    pub polling: bool,
}

struct CacheInner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    poller: PollingScheduler,
    config: SyncConfig,
    shutdown: CancellationToken,
}

impl CacheInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A shut down cache serves what it holds but never dispatches again.
    fn accepts_fetches(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    fn spawn_fetch(self: &Arc<Self>, key: QueryKey, generation: u64, fetcher: &Fetcher) {
        if !self.accepts_fetches() {
            return;
        }
        trace!("Fetching {key} (generation {generation})");

        let future = fetcher();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = future.await;
            if let Some(inner) = weak.upgrade() {
                inner.complete(&key, generation, result);
            }
        });
    }

    fn complete(&self, key: &QueryKey, generation: u64, result: Result<AnyValue, ApiError>) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            debug!("Dropping response for evicted entry {key}");
            return;
        };

        if generation != entry.dispatched {
            debug!(
                "Ignoring stale response for {key}: generation={generation} latest={}",
                entry.dispatched
            );
            return;
        }

        entry.in_flight = false;
        let stale_time = entry.options.stale_time;
        match result {
            Ok(value) => {
                let now = Instant::now();
                entry.state.send_modify(|snapshot| {
                    snapshot.value = Some(value);
                    snapshot.error = None;
                    snapshot.is_fetching = false;
                    snapshot.invalidated = false;
                    snapshot.updated_at = Some(now);
                    snapshot.stale_at = Some(now + stale_time);
                    snapshot.completed = generation;
                });
            }
            Err(error) => {
                warn!("Fetch for {key} failed: {error}");
                entry.state.send_modify(|snapshot| {
                    snapshot.error = Some(error);
                    snapshot.is_fetching = false;
                    snapshot.completed = generation;
                });
            }
        }
    }

    fn poll_tick(self: &Arc<Self>, key: &QueryKey) {
        let dispatch = {
            let mut entries = self.entries();
            match entries.get_mut(key) {
                Some(entry)
                    if entry.subscribers > 0 && entry.options.enabled && self.accepts_fetches() =>
                {
                    if entry.in_flight {
                        trace!("Skipping poll of {key}, fetch already in flight");
                        None
                    } else {
                        Some(entry.begin_fetch())
                    }
                }
                _ => None,
            }
        };

        if let Some((generation, fetcher)) = dispatch {
            self.spawn_fetch(key.clone(), generation, &fetcher);
        }
    }

    fn arm_polling(self: &Arc<Self>, key: &QueryKey, options: QueryOptions) {
        let Some(period) = options.poll_interval else {
            return;
        };
        if !options.enabled {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        self.poller
            .arm(key.clone(), period, move |key| match weak.upgrade() {
                Some(inner) => {
                    inner.poll_tick(key);
                    true
                }
                None => false,
            });
    }

    fn release(&self, key: &QueryKey) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };

        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers == 0 {
            entry.idle_since = Some(Instant::now());
            self.poller.disarm(key);
        }
    }

    fn prune_idle(&self, entries: &mut HashMap<QueryKey, Entry>, now: Instant) -> usize {
        let retention = self.config.idle_retention;
        let before = entries.len();
        entries.retain(|key, entry| {
            let expired = entry.subscribers == 0
                && entry
                    .idle_since
                    .is_some_and(|since| now.duration_since(since) >= retention);
            if expired {
                debug!("Evicting idle entry {key}");
            }
            !expired
        });
        before - entries.len()
    }
}

/// Keyed store of remote snapshots shared by every subscriber.
///
/// Fetches are spawned onto the current tokio runtime, so subscribing and
/// invalidating must happen from within one.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                poller: PollingScheduler::new(shutdown.clone()),
                config,
                shutdown,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Register interest in `key`, fetching it unless a fresh value is cached
    /// or a fetch is already outstanding.
    ///
    /// A key must always be subscribed with the same value type `T`.
    pub fn subscribe<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetch: F,
    ) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let fetcher: Fetcher = Arc::new(move || {
            let future = fetch();
            async move { future.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
        });

        let now = Instant::now();
        let (receiver, dispatch, first) = {
            let mut entries = self.inner.entries();
            self.inner.prune_idle(&mut entries, now);

            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(Arc::clone(&fetcher), options));
            entry.fetcher = fetcher;
            entry.options = options;
            entry.subscribers += 1;
            entry.idle_since = None;

            let dispatch = (options.enabled
                && self.inner.accepts_fetches()
                && !entry.in_flight
                && entry.is_stale(now))
            .then(|| entry.begin_fetch());
            (entry.state.subscribe(), dispatch, entry.subscribers == 1)
        };

        if first {
            self.inner.arm_polling(&key, options);
        }
        if let Some((generation, fetcher)) = dispatch {
            self.inner.spawn_fetch(key.clone(), generation, &fetcher);
        }

        Subscription {
            key,
            cache: self.clone(),
            receiver,
            _value: PhantomData,
        }
    }

    /// Mark `key` stale. Subscribed keys refetch immediately and supersede
    /// any fetch already in flight; unsubscribed keys refetch on next use.
    pub fn invalidate(&self, key: &QueryKey) {
        let dispatch = {
            let mut entries = self.inner.entries();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };

            entry
                .state
                .send_modify(|snapshot| snapshot.invalidated = true);
            (entry.subscribers > 0 && entry.options.enabled && self.inner.accepts_fetches())
                .then(|| entry.begin_fetch())
        };

        debug!("Invalidated {key}");
        if let Some((generation, fetcher)) = dispatch {
            self.inner.spawn_fetch(key.clone(), generation, &fetcher);
        }
    }

    pub fn invalidate_all<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a QueryKey>,
    {
        for key in keys {
            self.invalidate(key);
        }
    }

    /// The cached value for `key`, without triggering a fetch.
    #[must_use]
    pub fn get_snapshot<T>(&self, key: &QueryKey) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let entries = self.inner.entries();
        let value = entries.get(key)?.state.borrow().value.clone()?;
        value.downcast::<T>().ok()
    }

    #[must_use]
    pub fn inspect(&self, key: &QueryKey) -> Option<EntryInfo> {
        let now = Instant::now();
        let entries = self.inner.entries();
        let entry = entries.get(key)?;
        let is_stale = entry.is_stale(now);
        let snapshot = entry.state.borrow();
        Some(EntryInfo {
            subscribers: entry.subscribers,
            has_value: snapshot.value.is_some(),
            is_stale,
            is_fetching: snapshot.is_fetching,
            error: snapshot.error.clone(),
            generation: entry.dispatched,
            polling: self.inner.poller.is_armed(key),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries().is_empty()
    }

    /// Drop entries that have had no subscribers for the idle retention
    /// window. Returns how many were evicted.
    pub fn prune_idle(&self) -> usize {
        let mut entries = self.inner.entries();
        self.inner.prune_idle(&mut entries, Instant::now())
    }

    /// Stop every poll timer and discard all entries. Fetches still in flight
    /// complete into nothing.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.poller.disarm_all();
        self.inner.entries().clear();
        debug!("Query cache shut down");
    }
}

/// Typed view of a subscribed entry.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<ApiError>,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
    invalidated: bool,
    stale_at: Option<Instant>,
    settled: bool,
}

impl<T: Send + Sync + 'static> QueryState<T> {
    fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            data: snapshot
                .value
                .clone()
                .and_then(|value| value.downcast::<T>().ok()),
            error: snapshot.error.clone(),
            is_fetching: snapshot.is_fetching,
            updated_at: snapshot.updated_at,
            invalidated: snapshot.invalidated,
            stale_at: snapshot.stale_at,
            settled: snapshot.completed > 0 && !snapshot.is_fetching,
        }
    }
}

impl<T> QueryState<T> {
    /// No value yet and the first fetch is outstanding.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.invalidated || self.stale_at.is_none_or(|stale_at| Instant::now() >= stale_at)
    }

    /// At least one fetch has completed and none is outstanding.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

/// Live interest in one key. Dropping it releases the key, which disarms
/// polling once the last subscriber is gone.
pub struct Subscription<T> {
    key: QueryKey,
    cache: QueryCache,
    receiver: watch::Receiver<Snapshot>,
    _value: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        QueryState::from_snapshot(&self.receiver.borrow())
    }

    #[must_use]
    pub fn data(&self) -> Option<Arc<T>> {
        self.state().data
    }

    /// Wait for the next change to this entry.
    pub async fn changed(&mut self) -> QueryState<T> {
        if self.receiver.changed().await.is_err() {
            trace!("Entry {} closed while waiting for a change", self.key);
        }
        QueryState::from_snapshot(&self.receiver.borrow_and_update())
    }

    /// Wait until a fetch has completed and nothing is in flight.
    ///
    /// Never resolves for a disabled subscription with no cached value.
    pub async fn settled(&mut self) -> QueryState<T> {
        let result = self
            .receiver
            .wait_for(|snapshot| snapshot.completed > 0 && !snapshot.is_fetching)
            .await
            .map(|snapshot| QueryState::from_snapshot(&snapshot));
        match result {
            Ok(state) => state,
            Err(_) => self.state(),
        }
    }

    pub fn refetch(&self) {
        self.cache.invalidate(&self.key);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cache.inner.release(&self.key);
    }
}
