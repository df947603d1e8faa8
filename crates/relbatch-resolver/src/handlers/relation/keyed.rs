//! One-to-one relation loader.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use relbatch_domain::coalescer::{BatchLoad, Coalescer, CoalescerConfig, KeyOutcome};
use relbatch_domain::context::ExecutionContext;
use relbatch_domain::error::{LoadError, LoadResult};
use relbatch_domain::key::KeyIdentity;
use relbatch_domain::mapper::{index_by_key, DuplicateKeyPolicy};
use tracing::debug;

use super::types::{KeyAccessor, RecordFetcher, RelationRequest};
use crate::config::RelbatchConfig;

struct IndexedBatch<K, R> {
    loader: Arc<str>,
    fetcher: Arc<dyn RecordFetcher<K, R>>,
    lookup_key: KeyAccessor<K, R>,
    policy: DuplicateKeyPolicy,
}

#[async_trait]
impl<K, R> BatchLoad<K, Option<R>> for IndexedBatch<K, R>
where
    K: KeyIdentity + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    async fn load_batch(&self, keys: &[K]) -> LoadResult<Vec<KeyOutcome<Option<R>>>> {
        let records = self.fetcher.fetch(keys).await?;
        debug!(
            loader = %self.loader,
            keys = keys.len(),
            records = records.len(),
            "fetched keyed records"
        );
        let lookup_key = &self.lookup_key;
        let found = index_by_key(records, |record: &R| lookup_key(record), keys, self.policy);
        Ok(found.into_iter().map(Ok).collect())
    }
}

/// Loads at most one related record per key with one fetch per dispatch.
///
/// `lookup_key` reads the key a record answers to: its own identifier for a
/// reference lookup (`comment.authorId -> user.id`), or its parent reference
/// for a single-child relation (`user.id -> profile.userId`).
pub struct KeyedLoader<K, R> {
    name: Arc<str>,
    batch: Arc<dyn BatchLoad<K, Option<R>>>,
    coalescer: CoalescerConfig,
}

impl<K, R> KeyedLoader<K, R>
where
    K: KeyIdentity + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn builder<F>(name: impl Into<String>, lookup_key: F) -> KeyedLoaderBuilder<K, R>
    where
        F: Fn(&R) -> Option<K> + Send + Sync + 'static,
    {
        KeyedLoaderBuilder {
            name: name.into(),
            lookup_key: Arc::new(lookup_key),
            fetcher: None,
            policy: DuplicateKeyPolicy::default(),
            coalescer: CoalescerConfig::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads the record for one key.
    ///
    /// Returns `Ok(None)` for an absent key (without dispatching), for a key
    /// with no matching record and for a key whose record failed to load.
    pub async fn load_one<C>(&self, ctx: &C, request: RelationRequest<K>) -> LoadResult<Option<R>>
    where
        C: ExecutionContext + ?Sized,
    {
        let Some((key, traversal, ())) = request.into_parts(&self.name)? else {
            debug!(loader = %self.name, "key absent, skipping load");
            return Ok(None);
        };
        let coalescer = ctx.request_scope().loaders().coalescer(&traversal, || {
            Coalescer::from_shared(Arc::clone(&self.batch), self.coalescer.clone())
        })?;
        Ok(coalescer.load(key).await?.flatten())
    }
}

impl<K, R> fmt::Debug for KeyedLoader<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLoader")
            .field("name", &self.name)
            .field("coalescer", &self.coalescer)
            .finish()
    }
}

/// Builder for [`KeyedLoader`].
pub struct KeyedLoaderBuilder<K, R> {
    name: String,
    lookup_key: KeyAccessor<K, R>,
    fetcher: Option<Arc<dyn RecordFetcher<K, R>>>,
    policy: DuplicateKeyPolicy,
    coalescer: CoalescerConfig,
}

impl<K, R> KeyedLoaderBuilder<K, R>
where
    K: KeyIdentity + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn fetcher(mut self, fetcher: impl RecordFetcher<K, R>) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// How several records answering to one key are resolved.
    pub fn duplicate_policy(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Applies the `batch` section of a loaded config.
    pub fn config(mut self, config: &RelbatchConfig) -> Self {
        self.coalescer = config.coalescer_config();
        self
    }

    pub fn coalescer_config(mut self, config: CoalescerConfig) -> Self {
        self.coalescer = config;
        self
    }

    /// Fails with [`LoadError::MissingFetcher`] when no fetcher was set.
    pub fn build(self) -> LoadResult<KeyedLoader<K, R>> {
        let name: Arc<str> = Arc::from(self.name);
        let Some(fetcher) = self.fetcher else {
            return Err(LoadError::MissingFetcher {
                loader: name.to_string(),
            });
        };
        let batch = IndexedBatch {
            loader: Arc::clone(&name),
            fetcher,
            lookup_key: self.lookup_key,
            policy: self.policy,
        };
        Ok(KeyedLoader {
            name,
            batch: Arc::new(batch),
            coalescer: self.coalescer,
        })
    }
}
