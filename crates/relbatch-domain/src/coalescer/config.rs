//! Configuration for batch coalescers.

use std::time::Duration;

/// Configuration for a [`Coalescer`](super::Coalescer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// Whether resolved results are kept for the coalescer's lifetime.
    ///
    /// When disabled, keys are still deduplicated within one dispatch but
    /// every later `load` goes back to the batch fetch function.
    pub cache_enabled: bool,
    /// Upper bound on keys passed to one batch fetch call.
    ///
    /// `None` sends every pending key in a single call. When set, a dispatch
    /// is split into chunks that are fetched concurrently.
    pub max_batch_size: Option<usize>,
    /// Extra time to collect keys before dispatching.
    ///
    /// `None` closes the window after a single scheduler yield of the load
    /// that opened it, which covers every load polled together with it.
    pub delay: Option<Duration>,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            max_batch_size: None,
            delay: None,
        }
    }
}

impl CoalescerConfig {
    /// Enables or disables the resolved-result cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Sets the maximum number of keys per batch fetch call.
    pub fn with_max_batch_size(mut self, max: usize) -> Self {
        self.max_batch_size = Some(max.max(1));
        self
    }

    /// Sets the coalescing delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}
