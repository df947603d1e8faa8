//! One-to-many relation loader.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use relbatch_domain::coalescer::{BatchLoad, Coalescer, CoalescerConfig, KeyOutcome};
use relbatch_domain::context::{ExecutionContext, TraversalId};
use relbatch_domain::error::{LoadError, LoadResult};
use relbatch_domain::key::KeyIdentity;
use relbatch_domain::mapper::group_by_key;
use relbatch_domain::window::{
    paginate, slice_offset_limit, validate_per_page, OffsetLimit, Page, PageArgs,
};
use tracing::debug;

use super::types::{KeyAccessor, RecordFetcher, RelationRequest};
use crate::config::{PaginationSettings, RelbatchConfig};

/// Batch function that groups fetched children under their parent key.
struct GroupedBatch<K, R> {
    loader: Arc<str>,
    fetcher: Arc<dyn RecordFetcher<K, R>>,
    parent_key: KeyAccessor<K, R>,
}

#[async_trait]
impl<K, R> BatchLoad<K, Vec<R>> for GroupedBatch<K, R>
where
    K: KeyIdentity + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    async fn load_batch(&self, keys: &[K]) -> LoadResult<Vec<KeyOutcome<Vec<R>>>> {
        let records = self.fetcher.fetch(keys).await?;
        debug!(
            loader = %self.loader,
            keys = keys.len(),
            records = records.len(),
            "fetched child records"
        );
        let parent_key = &self.parent_key;
        let groups = group_by_key(records, |record: &R| parent_key(record), keys);
        Ok(groups.into_iter().map(Ok).collect())
    }
}

/// Loads the children of many parents with one fetch per dispatch.
///
/// Each parent's children are found by `parent_key`, the accessor returning
/// the parent reference stored on a child record. Windows are applied per
/// parent after grouping.
///
/// # Example
///
/// ```ignore
/// let comments = ChildLoader::builder("post.comments", field_path("postId"))
///     .fetcher(fetcher_fn(|post_ids: Vec<Value>| async move { store.comments_for(post_ids).await }))
///     .build()?;
///
/// let page = comments
///     .load_many_paged(&scope, RelationRequest::new(post.get("id").cloned(), path).with_args(args))
///     .await?;
/// ```
pub struct ChildLoader<K, R> {
    name: Arc<str>,
    batch: Arc<dyn BatchLoad<K, Vec<R>>>,
    coalescer: CoalescerConfig,
    pagination: PaginationSettings,
}

impl<K, R> ChildLoader<K, R>
where
    K: KeyIdentity + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    /// Starts building a loader named `name` (used in logs and errors).
    pub fn builder<F>(name: impl Into<String>, parent_key: F) -> ChildLoaderBuilder<K, R>
    where
        F: Fn(&R) -> Option<K> + Send + Sync + 'static,
    {
        ChildLoaderBuilder {
            name: name.into(),
            parent_key: Arc::new(parent_key),
            fetcher: None,
            coalescer: CoalescerConfig::default(),
            pagination: PaginationSettings::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads the children of one parent, windowed by offset/limit.
    ///
    /// An absent parent key yields an empty list without dispatching.
    pub async fn load_many<C>(&self, ctx: &C, request: RelationRequest<K, OffsetLimit>) -> LoadResult<Vec<R>>
    where
        C: ExecutionContext + ?Sized,
    {
        let Some((key, traversal, window)) = request.into_parts(&self.name)? else {
            debug!(loader = %self.name, "parent key absent, skipping load");
            return Ok(Vec::new());
        };
        let group = self.group(ctx, &traversal, key).await?;
        let window = window.with_default_limit(self.pagination.default_limit);
        Ok(slice_offset_limit(group.as_deref(), window))
    }

    /// Loads one page of the children of one parent.
    ///
    /// The page size is checked before anything is queued, so a zero
    /// `perPage` never reaches the store. An absent parent key yields an
    /// empty page without dispatching.
    pub async fn load_many_paged<C>(
        &self,
        ctx: &C,
        request: RelationRequest<K, PageArgs>,
    ) -> LoadResult<Page<R>>
    where
        C: ExecutionContext + ?Sized,
    {
        let default_per_page = self.pagination.default_per_page;
        validate_per_page(request.args, default_per_page)?;
        let requested = request.args;
        let Some((key, traversal, args)) = request.into_parts(&self.name)? else {
            debug!(loader = %self.name, "parent key absent, skipping load");
            return paginate(None, requested, default_per_page);
        };
        let group = self.group(ctx, &traversal, key).await?;
        paginate(group.as_deref(), args, default_per_page)
    }

    async fn group<C>(&self, ctx: &C, traversal: &TraversalId, key: K) -> LoadResult<Option<Vec<R>>>
    where
        C: ExecutionContext + ?Sized,
    {
        let coalescer = ctx.request_scope().loaders().coalescer(traversal, || {
            Coalescer::from_shared(Arc::clone(&self.batch), self.coalescer.clone())
        })?;
        coalescer.load(key).await
    }
}

impl<K, R> fmt::Debug for ChildLoader<K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildLoader")
            .field("name", &self.name)
            .field("coalescer", &self.coalescer)
            .field("pagination", &self.pagination)
            .finish()
    }
}

/// Builder for [`ChildLoader`].
pub struct ChildLoaderBuilder<K, R> {
    name: String,
    parent_key: KeyAccessor<K, R>,
    fetcher: Option<Arc<dyn RecordFetcher<K, R>>>,
    coalescer: CoalescerConfig,
    pagination: PaginationSettings,
}

impl<K, R> ChildLoaderBuilder<K, R>
where
    K: KeyIdentity + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn fetcher(mut self, fetcher: impl RecordFetcher<K, R>) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Applies the `batch` and `pagination` sections of a loaded config.
    pub fn config(mut self, config: &RelbatchConfig) -> Self {
        self.coalescer = config.coalescer_config();
        self.pagination = config.pagination.clone();
        self
    }

    pub fn coalescer_config(mut self, config: CoalescerConfig) -> Self {
        self.coalescer = config;
        self
    }

    /// Fails with [`LoadError::MissingFetcher`] when no fetcher was set.
    pub fn build(self) -> LoadResult<ChildLoader<K, R>> {
        let name: Arc<str> = Arc::from(self.name);
        let Some(fetcher) = self.fetcher else {
            return Err(LoadError::MissingFetcher {
                loader: name.to_string(),
            });
        };
        let batch = GroupedBatch {
            loader: Arc::clone(&name),
            fetcher,
            parent_key: self.parent_key,
        };
        Ok(ChildLoader {
            name,
            batch: Arc::new(batch),
            coalescer: self.coalescer,
            pagination: self.pagination,
        })
    }
}
