//! Guards for open windows and in-flight dispatches.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::{Entry, Inner, State};
use crate::key::{KeyIdentity, NormalizedKey};

/// Held by the `load` that opened the current window.
///
/// Closing the window, explicitly or by dropping the leader, takes every
/// queued key and spawns one dispatch task for them. Outside a tokio
/// runtime the keys cannot be dispatched, so their waiters are released
/// and report `DispatchAborted`.
pub(super) struct WindowLeader<K, V>
where
    K: KeyIdentity + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Option<Arc<Inner<K, V>>>,
}

impl<K, V> WindowLeader<K, V>
where
    K: KeyIdentity + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(super) fn new(inner: Arc<Inner<K, V>>) -> Self {
        Self { inner: Some(inner) }
    }

    pub(super) fn close(mut self) {
        if let Some(inner) = self.inner.take() {
            close_window(inner);
        }
    }
}

impl<K, V> Drop for WindowLeader<K, V>
where
    K: KeyIdentity + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            close_window(inner);
        }
    }
}

fn close_window<K, V>(inner: Arc<Inner<K, V>>)
where
    K: KeyIdentity + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let pending = inner.take_window();
    if pending.is_empty() {
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move { inner.dispatch(pending).await });
        }
        Err(_) => {
            warn!(keys = pending.len(), "no runtime to dispatch window, releasing waiters");
            let mut state = inner.state.lock();
            for (key, _) in pending {
                if matches!(state.entries.get(&key), Some(Entry::Waiting(_))) {
                    state.entries.remove(&key);
                }
            }
        }
    }
}

/// RAII guard that releases the waiters of a dispatch chunk if the chunk
/// never resolves (the fetch function panicked or the task was dropped).
///
/// Dropping the broadcast senders wakes every subscriber with a closed
/// channel, which `load` reports as `DispatchAborted`.
pub(super) struct DispatchGuard<'a, K, V> {
    state: &'a Mutex<State<K, V>>,
    keys: Vec<NormalizedKey>,
    completed: bool,
}

impl<'a, K, V> DispatchGuard<'a, K, V> {
    pub(super) fn new(state: &'a Mutex<State<K, V>>, keys: Vec<NormalizedKey>) -> Self {
        Self {
            state,
            keys,
            completed: false,
        }
    }

    pub(super) fn keys(&self) -> &[NormalizedKey] {
        &self.keys
    }

    /// Marks the chunk as resolved (normal path).
    pub(super) fn complete(mut self) {
        self.completed = true;
    }
}

impl<K, V> Drop for DispatchGuard<'_, K, V> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut state = self.state.lock();
        for key in &self.keys {
            if matches!(state.entries.get(key), Some(Entry::Waiting(_))) {
                state.entries.remove(key);
            }
        }
    }
}
