//! Types for relation loaders.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use relbatch_domain::context::TraversalId;
use relbatch_domain::error::{LoadError, LoadResult};
use relbatch_domain::mapper::FetchedRecord;

/// Backing-store query for one relationship.
///
/// Receives every key of one dispatch and returns the matching records as a
/// flat list in any order; the loaders re-associate records with keys using
/// their key accessor. Per-record failures are returned as `Err` elements,
/// a failed query as the outer `Err`.
#[async_trait]
pub trait RecordFetcher<K, R>: Send + Sync + 'static {
    async fn fetch(&self, keys: &[K]) -> LoadResult<Vec<FetchedRecord<R>>>;
}

/// [`RecordFetcher`] adapter for async closures.
pub struct FetcherFn<F>(F);

/// Wraps an async closure taking the dispatch keys as a [`RecordFetcher`].
pub fn fetcher_fn<K, R, F, Fut>(f: F) -> FetcherFn<F>
where
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<Vec<FetchedRecord<R>>>> + Send + 'static,
{
    FetcherFn(f)
}

#[async_trait]
impl<K, R, F, Fut> RecordFetcher<K, R> for FetcherFn<F>
where
    K: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult<Vec<FetchedRecord<R>>>> + Send + 'static,
{
    async fn fetch(&self, keys: &[K]) -> LoadResult<Vec<FetchedRecord<R>>> {
        (self.0)(keys.to_vec()).await
    }
}

#[async_trait]
impl<K, R, T> RecordFetcher<K, R> for Arc<T>
where
    K: Sync + 'static,
    R: 'static,
    T: RecordFetcher<K, R> + ?Sized,
{
    async fn fetch(&self, keys: &[K]) -> LoadResult<Vec<FetchedRecord<R>>> {
        (**self).fetch(keys).await
    }
}

/// Reads the relation key out of a record.
pub type KeyAccessor<K, R> = Arc<dyn Fn(&R) -> Option<K> + Send + Sync>;

/// One field resolution against a relation loader.
///
/// `key` is the parent's value for the relation (absent for a null
/// relationship), `traversal` the identity of this field selection in the
/// request, and `args` the window to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRequest<K, A = ()> {
    pub key: Option<K>,
    pub traversal: Option<String>,
    pub args: A,
}

impl<K> RelationRequest<K> {
    pub fn new(key: Option<K>, traversal: impl Into<String>) -> Self {
        Self {
            key,
            traversal: Some(traversal.into()),
            args: (),
        }
    }
}

impl<K, A> RelationRequest<K, A> {
    /// Replaces the window arguments.
    pub fn with_args<B>(self, args: B) -> RelationRequest<K, B> {
        RelationRequest {
            key: self.key,
            traversal: self.traversal,
            args,
        }
    }

    /// Drops the traversal identity, as a context without one would.
    pub fn without_traversal(mut self) -> Self {
        self.traversal = None;
        self
    }

    /// Splits the request into its key and validated traversal identity.
    ///
    /// Returns `Ok(None)` for an absent key without looking at the traversal.
    pub(crate) fn into_parts(self, loader: &str) -> LoadResult<Option<(K, TraversalId, A)>> {
        let Some(key) = self.key else {
            return Ok(None);
        };
        let traversal = match self.traversal.as_deref() {
            Some(id) => TraversalId::new(id)?,
            None => {
                return Err(LoadError::MissingTraversalId {
                    reason: format!("{loader} was called without a traversal identity"),
                })
            }
        };
        Ok(Some((key, traversal, self.args)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_short_circuits_before_traversal_check() {
        let request: RelationRequest<u32> = RelationRequest::new(None, "").without_traversal();

        let parts = request.into_parts("posts.author").unwrap();

        assert!(parts.is_none());
    }

    #[test]
    fn test_missing_traversal_is_configuration_error() {
        let request = RelationRequest::new(Some(1u32), "x").without_traversal();

        let err = request.into_parts("posts.author").unwrap_err();

        assert!(err.is_configuration());
        assert!(err.to_string().contains("posts.author"));
    }

    #[test]
    fn test_empty_traversal_is_configuration_error() {
        let request = RelationRequest::new(Some(1u32), "");

        let err = request.into_parts("posts.author").unwrap_err();

        assert!(matches!(err, LoadError::MissingTraversalId { .. }));
    }

    #[test]
    fn test_with_args_keeps_key_and_traversal() {
        let request = RelationRequest::new(Some(1u32), "posts/0/author").with_args(5usize);

        let (key, traversal, args) = request.into_parts("posts.author").unwrap().unwrap();

        assert_eq!(key, 1);
        assert_eq!(traversal.as_str(), "posts/0/author");
        assert_eq!(args, 5);
    }
}
