//! Deferred batch coalescing.
//!
//! A [`Coalescer`] accepts single-key `load` calls and turns every key
//! requested within one scheduling window into a single call of its
//! [`BatchLoad`] function.
//!
//! # Scheduling
//!
//! The first `load` that queues a key while no window is open becomes the
//! window's leader. Inside its own future the leader yields to the
//! scheduler once (or sleeps for the configured delay), then takes every
//! pending key and hands them to a dispatch task. Futures polled together
//! with the leader, e.g. through `join_all`, register their keys before the
//! leader is polled again, so they land in the same batch on any runtime
//! flavor. Keys registered after the leader closed its window open the next
//! one.
//!
//! A leader dropped before closing its window still closes it on drop, so
//! followers never wait on a window nobody will dispatch.
//!
//! # Caching
//!
//! Each normalized key has at most one entry: either a broadcast channel
//! for a dispatch in flight, which later callers subscribe to, or a resolved
//! value. Errors and absent results are never cached.
//!
//! # Failure isolation
//!
//! - An `Err` at position `i` of the batch result resolves key `i` as absent
//!   and is logged; other keys are unaffected.
//! - A failed batch call, or one that returns the wrong number of results,
//!   fails every key of that call.
//! - If the dispatch task dies (a panicking fetch function), its waiters get
//!   [`LoadError::DispatchAborted`] instead of hanging.

mod config;
mod guard;


use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{LoadError, LoadResult, RecordError};
use crate::key::{KeyIdentity, NormalizedKey};

pub use config::CoalescerConfig;
use guard::{DispatchGuard, WindowLeader};

/// Outcome for one key position of a batch result.
pub type KeyOutcome<V> = Result<V, RecordError>;

/// Batch fetch function driven by a [`Coalescer`].
///
/// The returned vector must be positionally aligned with `keys`: element `i`
/// is the outcome for `keys[i]`.
#[async_trait]
pub trait BatchLoad<K, V>: Send + Sync + 'static {
    async fn load_batch(&self, keys: &[K]) -> LoadResult<Vec<KeyOutcome<V>>>;
}

/// [`BatchLoad`] adapter for async closures.
pub struct BatchFn<F>(F);

/// Wraps an async closure taking the batch keys as a [`BatchLoad`].
pub fn batch_fn<K, V, F, Fut>(f: F) -> BatchFn<F>
where
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<Vec<KeyOutcome<V>>>> + Send + 'static,
{
    BatchFn(f)
}

#[async_trait]
impl<K, V, F, Fut> BatchLoad<K, V> for BatchFn<F>
where
    K: Clone + Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<Vec<KeyOutcome<V>>>> + Send + 'static,
{
    async fn load_batch(&self, keys: &[K]) -> LoadResult<Vec<KeyOutcome<V>>> {
        (self.0)(keys.to_vec()).await
    }
}

type Waiters<V> = broadcast::Sender<LoadResult<Option<V>>>;

enum Entry<V> {
    Waiting(Waiters<V>),
    Ready(V),
}

struct State<K, V> {
    entries: HashMap<NormalizedKey, Entry<V>>,
    /// Keys waiting for the next dispatch, in first-registration order.
    queue: Vec<(NormalizedKey, K)>,
    scheduled: bool,
}

impl<K, V> State<K, V> {
    fn take_waiters(&mut self, key: &NormalizedKey) -> Option<Waiters<V>> {
        match self.entries.remove(key)? {
            Entry::Waiting(sender) => Some(sender),
            ready @ Entry::Ready(_) => {
                self.entries.insert(key.clone(), ready);
                None
            }
        }
    }
}

struct Inner<K, V> {
    batch: Arc<dyn BatchLoad<K, V>>,
    config: CoalescerConfig,
    state: Mutex<State<K, V>>,
}

/// Request-scoped batch coalescer.
///
/// Cloning is cheap and yields a handle to the same pending set and cache.
pub struct Coalescer<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for Coalescer<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for Coalescer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Coalescer")
            .field("config", &self.inner.config)
            .field("entries", &state.entries.len())
            .field("queued", &state.queue.len())
            .field("scheduled", &state.scheduled)
            .finish()
    }
}

impl<K, V> Coalescer<K, V>
where
    K: KeyIdentity + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a coalescer with the default configuration.
    pub fn new(batch: impl BatchLoad<K, V>) -> Self {
        Self::with_config(batch, CoalescerConfig::default())
    }

    /// Creates a coalescer with the given configuration.
    pub fn with_config(batch: impl BatchLoad<K, V>, config: CoalescerConfig) -> Self {
        Self::from_shared(Arc::new(batch), config)
    }

    /// Creates a coalescer around an already shared batch function.
    pub fn from_shared(batch: Arc<dyn BatchLoad<K, V>>, config: CoalescerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                batch,
                config,
                state: Mutex::new(State {
                    entries: HashMap::new(),
                    queue: Vec::new(),
                    scheduled: false,
                }),
            }),
        }
    }

    pub fn config(&self) -> &CoalescerConfig {
        &self.inner.config
    }

    /// Loads one key, joining the current dispatch window.
    ///
    /// Returns `Ok(None)` when the batch result carried an error for this
    /// key's position.
    pub async fn load(&self, key: K) -> LoadResult<Option<V>> {
        let normalized = key.normalize();
        let (mut receiver, leader) = {
            let mut state = self.inner.state.lock();
            match state.entries.get(&normalized) {
                Some(Entry::Ready(value)) => {
                    metrics::counter!("relbatch_cache_hits_total").increment(1);
                    return Ok(Some(value.clone()));
                }
                Some(Entry::Waiting(sender)) => (sender.subscribe(), None),
                None => {
                    metrics::counter!("relbatch_cache_misses_total").increment(1);
                    let (sender, receiver) = broadcast::channel(1);
                    state
                        .entries
                        .insert(normalized.clone(), Entry::Waiting(sender));
                    state.queue.push((normalized.clone(), key));
                    let leader = (!state.scheduled).then(|| {
                        state.scheduled = true;
                        WindowLeader::new(Arc::clone(&self.inner))
                    });
                    (receiver, leader)
                }
            }
        };

        if let Some(leader) = leader {
            match self.inner.config.delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            leader.close();
        }

        match receiver.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(LoadError::DispatchAborted {
                key: normalized.to_string(),
            }),
        }
    }

    /// Loads several keys; outcomes are returned in input order.
    pub async fn load_many<I>(&self, keys: I) -> Vec<LoadResult<Option<V>>>
    where
        I: IntoIterator<Item = K>,
    {
        join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Seeds the cache for `key`. Returns false if the key is already known.
    pub fn prime(&self, key: &K, value: V) -> bool {
        let mut state = self.inner.state.lock();
        let normalized = key.normalize();
        if state.entries.contains_key(&normalized) {
            return false;
        }
        state.entries.insert(normalized, Entry::Ready(value));
        true
    }

    /// Drops the resolved value for `key`, if any.
    ///
    /// A key with a dispatch in flight is left alone.
    pub fn clear(&self, key: &K) {
        let mut state = self.inner.state.lock();
        let normalized = key.normalize();
        if matches!(state.entries.get(&normalized), Some(Entry::Ready(_))) {
            state.entries.remove(&normalized);
        }
    }

    /// Drops every resolved value.
    pub fn clear_all(&self) {
        self.inner
            .state
            .lock()
            .entries
            .retain(|_, entry| matches!(entry, Entry::Waiting(_)));
    }

    /// Returns true if a resolved value is cached for `key`.
    pub fn is_cached(&self, key: &K) -> bool {
        matches!(
            self.inner.state.lock().entries.get(&key.normalize()),
            Some(Entry::Ready(_))
        )
    }
}

impl<K, V> Inner<K, V>
where
    K: KeyIdentity + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Closes the open window and returns its keys.
    fn take_window(&self) -> Vec<(NormalizedKey, K)> {
        let mut state = self.state.lock();
        state.scheduled = false;
        std::mem::take(&mut state.queue)
    }

    async fn dispatch(&self, pending: Vec<(NormalizedKey, K)>) {
        if pending.is_empty() {
            return;
        }

        let total = pending.len();
        let chunk_size = self.config.max_batch_size.unwrap_or(total).max(1);
        let mut chunks = Vec::with_capacity(total.div_ceil(chunk_size));
        let mut rest = pending;
        while rest.len() > chunk_size {
            let tail = rest.split_off(chunk_size);
            chunks.push(rest);
            rest = tail;
        }
        chunks.push(rest);

        debug!(keys = total, chunks = chunks.len(), "dispatching batch");
        join_all(chunks.into_iter().map(|chunk| self.dispatch_chunk(chunk))).await;
    }

    async fn dispatch_chunk(&self, chunk: Vec<(NormalizedKey, K)>) {
        let (normalized, keys): (Vec<NormalizedKey>, Vec<K>) = chunk.into_iter().unzip();
        let guard = DispatchGuard::new(&self.state, normalized);

        metrics::counter!("relbatch_dispatches_total").increment(1);
        metrics::counter!("relbatch_dispatched_keys_total").increment(keys.len() as u64);

        let outcome = self.batch.load_batch(&keys).await;
        self.resolve(guard.keys(), outcome);
        guard.complete();
    }

    fn resolve(&self, keys: &[NormalizedKey], outcome: LoadResult<Vec<KeyOutcome<V>>>) {
        let outcome = outcome.and_then(|values| {
            if values.len() == keys.len() {
                Ok(values)
            } else {
                Err(LoadError::ResultCountMismatch {
                    expected: keys.len(),
                    actual: values.len(),
                })
            }
        });

        let mut state = self.state.lock();
        match outcome {
            Err(err) => {
                metrics::counter!("relbatch_dispatch_failures_total").increment(1);
                warn!(keys = keys.len(), error = %err, "batch fetch failed");
                for key in keys {
                    if let Some(sender) = state.take_waiters(key) {
                        let _ = sender.send(Err(err.clone()));
                    }
                }
            }
            Ok(values) => {
                for (key, value) in keys.iter().zip(values) {
                    let Some(sender) = state.take_waiters(key) else {
                        continue;
                    };
                    match value {
                        Ok(value) => {
                            if self.config.cache_enabled {
                                state.entries.insert(key.clone(), Entry::Ready(value.clone()));
                            }
                            let _ = sender.send(Ok(Some(value)));
                        }
                        Err(err) => {
                            metrics::counter!("relbatch_record_errors_total").increment(1);
                            warn!(key = %key, error = %err, "batch fetch returned an error for key");
                            let _ = sender.send(Ok(None));
                        }
                    }
                }
            }
        }
    }
}

/// Registers loader metric descriptions.
///
/// Call once at startup, after installing a metrics recorder.
pub fn register_loader_metrics() {
    metrics::describe_counter!(
        "relbatch_dispatches_total",
        "Total number of batch fetch calls issued by coalescers"
    );
    metrics::describe_counter!(
        "relbatch_dispatched_keys_total",
        "Total number of keys passed to batch fetch calls"
    );
    metrics::describe_counter!(
        "relbatch_cache_hits_total",
        "Total number of loads served from a coalescer cache"
    );
    metrics::describe_counter!(
        "relbatch_cache_misses_total",
        "Total number of loads that queued a key for dispatch"
    );
    metrics::describe_counter!(
        "relbatch_record_errors_total",
        "Total number of per-key errors returned by batch fetch calls"
    );
    metrics::describe_counter!(
        "relbatch_dispatch_failures_total",
        "Total number of batch fetch calls that failed as a whole"
    );
}
