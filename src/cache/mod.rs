//! Async result cache — fingerprint-keyed, stale-while-revalidate.
//!
//! One entry per [`CacheKey`]. Each entry holds the latest known value, the
//! latest error, an in-flight flag, and its listener set. A single recurring
//! scheduler tick ([`AsyncCache::tick`], driven by [`AsyncCache::run`]) scans
//! due entries instead of keeping one timer per entry.
//!
//! Consistency bound: with polling refresh, a value can be stale by up to one
//! refresh interval. Values are shared as `Arc`s and must be treated as
//! immutable by consumers.

pub mod key;
mod refresh;

pub use key::{CacheKey, KeyArg};
pub use refresh::TICK_INTERVAL;

use crate::error::EngineError;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tracing::{debug, warn};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Per-entry refresh policy.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// How often the entry is revalidated while it has subscribers.
    pub refresh_interval: Duration,
    /// Skip fetching while the connection gate reports disconnected.
    pub require_connection: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(1),
            require_connection: false,
        }
    }
}

impl CacheOptions {
    pub fn every(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            ..Self::default()
        }
    }

    /// Slow-changing data (market metadata, decimal counts).
    pub fn slow() -> Self {
        Self::every(Duration::from_secs(60))
    }

    /// Require an authenticated connection before fetching.
    pub fn gated(mut self) -> Self {
        self.require_connection = true;
        self
    }
}

// ─── Slot view ───────────────────────────────────────────────────────────────

/// Read-only view of one cache slot at a point in time.
#[derive(Debug)]
pub struct SlotView<T> {
    /// Last successfully fetched value, possibly stale.
    pub value: Option<Arc<T>>,
    /// Error from the most recent failed fetch. Cleared by the next success;
    /// a failure never clears `value`.
    pub error: Option<Arc<EngineError>>,
    /// Whether a fetch is currently in flight.
    pub is_fetching: bool,
}

impl<T> SlotView<T> {
    fn empty() -> Self {
        Self {
            value: None,
            error: None,
            is_fetching: false,
        }
    }

    /// No value yet and one is on the way.
    pub fn is_loading(&self) -> bool {
        self.value.is_none() && self.is_fetching
    }
}

impl<T> Clone for SlotView<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
        }
    }
}

// ─── Internals ───────────────────────────────────────────────────────────────

type ErasedValue = Arc<dyn Any + Send + Sync>;
type ErasedFetcher =
    Arc<dyn Fn() -> BoxFuture<'static, Result<ErasedValue, EngineError>> + Send + Sync>;
type Listener = Arc<dyn Fn() + Send + Sync>;
type Gate = Arc<dyn Fn() -> bool + Send + Sync>;

struct Entry {
    value: Option<ErasedValue>,
    error: Option<Arc<EngineError>>,
    is_fetching: bool,
    /// Latest issued fetch generation; completions carrying an older
    /// generation are discarded so a slow early fetch cannot overwrite a
    /// newer value.
    generation: u64,
    last_fetch_started: Option<Instant>,
    last_success: Option<Instant>,
    /// Set by `refresh` and first `subscribe`; overrides the interval once.
    force: bool,
    options: CacheOptions,
    fetcher: ErasedFetcher,
    listeners: HashMap<u64, Listener>,
    /// When the listener set last became empty; drives idle reclamation.
    idle_since: Option<Instant>,
}

impl Entry {
    fn new(fetcher: ErasedFetcher, options: CacheOptions) -> Self {
        Self {
            value: None,
            error: None,
            is_fetching: false,
            generation: 0,
            last_fetch_started: None,
            last_success: None,
            force: false,
            options,
            fetcher,
            listeners: HashMap::new(),
            idle_since: None,
        }
    }

    fn due(&self, now: Instant) -> bool {
        if self.is_fetching {
            return false;
        }
        if self.force {
            return true;
        }
        if self.listeners.is_empty() {
            return false;
        }
        match self.last_fetch_started {
            None => true,
            Some(started) => now.duration_since(started) >= self.options.refresh_interval,
        }
    }

    fn view<T: Send + Sync + 'static>(&self) -> SlotView<T> {
        SlotView {
            value: self
                .value
                .clone()
                .and_then(|v| v.downcast::<T>().ok()),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
        }
    }
}

struct Shared {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    /// Wakes the scheduler loop early on `subscribe`/`refresh`.
    wake: Notify,
    next_listener: AtomicU64,
    gate: Mutex<Option<Gate>>,
    idle_ttl: Duration,
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Process-wide async result cache.
///
/// Constructed once at startup and passed by reference (or cheap clone —
/// clones share state) to every consumer; tests construct their own instance
/// for isolation. Bookkeeping mutations are synchronous and run to completion
/// under one short lock, never held across an await.
#[derive(Clone)]
pub struct AsyncCache {
    shared: Arc<Shared>,
}

impl Default for AsyncCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncCache {
    pub fn new() -> Self {
        Self::with_idle_ttl(Duration::from_secs(60))
    }

    /// `idle_ttl` controls how long an unsubscribed entry's value lingers
    /// before it is reclaimed.
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                wake: Notify::new(),
                next_listener: AtomicU64::new(0),
                gate: Mutex::new(None),
                idle_ttl,
            }),
        }
    }

    /// Install the connection gate consulted for `require_connection`
    /// entries. With no gate installed, gated entries never fetch.
    pub fn set_connection_gate(&self, gate: impl Fn() -> bool + Send + Sync + 'static) {
        *self.shared.gate.lock() = Some(Arc::new(gate));
    }

    /// Subscribe to the slot for `key`.
    ///
    /// Returns the last known view immediately (possibly stale, possibly
    /// empty on first call) and schedules a fetch if none is fresh or in
    /// flight. `listener` is invoked after every completed fetch for this
    /// key, success or failure, within the completing resumption; re-read the
    /// slot with [`AsyncCache::load`] from inside it.
    ///
    /// The latest subscriber's `fetcher` and `options` win for the entry.
    /// Dropping the returned [`Subscription`] unsubscribes.
    pub fn subscribe<T, L, F, Fut>(
        &self,
        key: CacheKey,
        options: CacheOptions,
        listener: L,
        fetcher: F,
    ) -> (SlotView<T>, Subscription)
    where
        T: Send + Sync + 'static,
        L: Fn() + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, EngineError>> + Send + 'static,
    {
        let erased: ErasedFetcher =
            Arc::new(move || -> BoxFuture<'static, Result<ErasedValue, EngineError>> {
                let fut = fetcher();
                Box::pin(async move { fut.await.map(|v| Arc::new(v) as ErasedValue) })
            });

        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        let view = {
            let mut entries = self.shared.entries.lock();
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| Entry::new(erased.clone(), options.clone()));
            entry.fetcher = erased;
            entry.options = options;
            entry.idle_since = None;
            entry.listeners.insert(id, Arc::new(listener));
            entry.view::<T>()
        };
        self.shared.wake.notify_one();

        (
            view,
            Subscription {
                shared: self.shared.clone(),
                key,
                id,
            },
        )
    }

    /// Read the current view of `key` without subscribing.
    pub fn load<T: Send + Sync + 'static>(&self, key: &CacheKey) -> SlotView<T> {
        let entries = self.shared.entries.lock();
        match entries.get(key) {
            Some(entry) => entry.view::<T>(),
            None => SlotView::empty(),
        }
    }

    /// Force an immediate fetch for `key`, regardless of its interval.
    ///
    /// A fetch already in flight is reused, never duplicated.
    pub fn refresh(&self, key: &CacheKey) {
        {
            let mut entries = self.shared.entries.lock();
            if let Some(entry) = entries.get_mut(key) {
                if !entry.is_fetching {
                    entry.force = true;
                }
            }
        }
        self.shared.wake.notify_one();
    }

    /// One scheduler pass: reap idle entries, then start a fetch for every
    /// due entry. Normally driven by [`AsyncCache::run`]; tests and embedders
    /// with their own loop may call it directly. Must run inside a tokio
    /// runtime — fetches are spawned as tasks.
    pub fn tick(&self) {
        let now = Instant::now();
        let gate = self.shared.gate.lock().clone();
        let connected = gate.map(|g| g()).unwrap_or(false);

        let mut started = Vec::new();
        {
            let mut entries = self.shared.entries.lock();
            let idle_ttl = self.shared.idle_ttl;
            entries.retain(|_, entry| {
                !(entry.listeners.is_empty()
                    && !entry.is_fetching
                    && !entry.force
                    && entry
                        .idle_since
                        .is_some_and(|t| now.duration_since(t) >= idle_ttl))
            });

            for (key, entry) in entries.iter_mut() {
                if !entry.due(now) {
                    continue;
                }
                if entry.options.require_connection && !connected {
                    continue;
                }
                entry.force = false;
                entry.is_fetching = true;
                entry.generation += 1;
                entry.last_fetch_started = Some(now);
                started.push((key.clone(), entry.generation, entry.fetcher.clone()));
            }
        }

        for (key, generation, fetcher) in started {
            debug!(key = %key, generation, "fetch started");
            let cache = self.clone();
            tokio::spawn(async move {
                let result = fetcher().await;
                cache.apply_completion(&key, generation, result);
            });
        }
    }

    /// Write back one fetch outcome. Completions from superseded generations
    /// are discarded without touching the entry.
    fn apply_completion(
        &self,
        key: &CacheKey,
        generation: u64,
        result: Result<ErasedValue, EngineError>,
    ) {
        let listeners: Vec<Listener> = {
            let mut entries = self.shared.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            if generation != entry.generation {
                debug!(key = %key, generation, latest = entry.generation, "stale completion discarded");
                return;
            }
            entry.is_fetching = false;
            match result {
                Ok(value) => {
                    entry.value = Some(value);
                    entry.error = None;
                    entry.last_success = Some(Instant::now());
                    debug!(key = %key, generation, "fetch succeeded");
                }
                Err(err) => {
                    // Stale-but-available beats empty: the previous value stays.
                    warn!(key = %key, generation, error = %err, "fetch failed");
                    entry.error = Some(Arc::new(err));
                }
            }
            entry.listeners.values().cloned().collect()
        };
        // Listeners run outside the lock so they can re-read the cache.
        for listener in listeners {
            listener();
        }
    }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// RAII subscription handle.
///
/// Dropping the last handle for a key stops its scheduled refreshes (lazily —
/// an in-flight fetch completes and writes back for any late subscriber) and
/// makes the entry eligible for idle reclamation. The stored value is not
/// evicted immediately.
pub struct Subscription {
    shared: Arc<Shared>,
    key: CacheKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut entries = self.shared.entries.lock();
        if let Some(entry) = entries.get_mut(&self.key) {
            entry.listeners.remove(&self.id);
            if entry.listeners.is_empty() {
                entry.idle_since = Some(Instant::now());
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
