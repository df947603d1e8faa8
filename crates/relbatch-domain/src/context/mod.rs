//! Request and traversal scoping.
//!
//! Every related-field selection in a request gets its own [`Coalescer`],
//! found through the selection's [`TraversalId`]. The association lives in a
//! [`LoaderRegistry`] owned by the request's [`RequestScope`]: it is created
//! on first use and dropped together with the request, so no coalescer or
//! cached record outlives the request that loaded it.
//!
//! Every item of a list shares its parent selection, so the identity leaves
//! list indices out: `posts/0/author` and `posts/1/author` both resolve to
//! `posts/author` and batch together.
//!
//! ```text
//! RequestScope ──owns──▶ LoaderRegistry
//!                            │
//!        TraversalId("posts/author") ──▶ Coalescer<K, V>
//!        TraversalId("posts/editor") ──▶ Coalescer<K, V>
//! ```

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use crate::coalescer::Coalescer;
use crate::error::{LoadError, LoadResult};
use crate::key::KeyIdentity;

/// Identity of one occurrence of a related-field selection in a request.
///
/// Two selections of the same field (aliases, or the same field under
/// different parents) must carry different identities.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TraversalId(Arc<str>);

impl TraversalId {
    /// Creates a traversal identity, rejecting blank tokens.
    pub fn new(id: impl AsRef<str>) -> LoadResult<Self> {
        let id = id.as_ref();
        if id.trim().is_empty() {
            return Err(LoadError::MissingTraversalId {
                reason: "traversal identity is empty".to_string(),
            });
        }
        Ok(Self(Arc::from(id)))
    }

    /// Builds an identity from a response path such as `["posts", "0", "author"]`.
    ///
    /// Numeric list-index segments are dropped, so every item of a list maps
    /// to the same selection (`posts/author`). Field names and aliases never
    /// start with a digit, so no selection segment is lost.
    pub fn from_path<I, S>(segments: I) -> LoadResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .filter(|segment| !is_list_index(segment.as_ref()))
            .map(|segment| segment.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_list_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for TraversalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TraversalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraversalId({})", self.0)
    }
}

/// Traversal identity → coalescer association for one request.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: DashMap<TraversalId, Box<dyn Any + Send + Sync>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the coalescer registered for `traversal`, creating it with
    /// `make` on first use.
    ///
    /// Fails with [`LoadError::LoaderTypeMismatch`] when the identity was
    /// already used for a coalescer with different key or value types.
    pub fn coalescer<K, V, F>(&self, traversal: &TraversalId, make: F) -> LoadResult<Coalescer<K, V>>
    where
        K: KeyIdentity + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Coalescer<K, V>,
    {
        let entry = self.loaders.entry(traversal.clone()).or_insert_with(|| {
            debug!(traversal = %traversal, "creating coalescer");
            let loader: Box<dyn Any + Send + Sync> = Box::new(make());
            loader
        });
        entry
            .downcast_ref::<Coalescer<K, V>>()
            .cloned()
            .ok_or_else(|| LoadError::LoaderTypeMismatch {
                traversal: traversal.to_string(),
            })
    }

    pub fn contains(&self, traversal: &TraversalId) -> bool {
        self.loaders.contains_key(traversal)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("loaders", &self.loaders.len())
            .finish()
    }
}

/// Per-request owner of the traversal cache.
///
/// Create one per incoming request and drop it with the request.
#[derive(Debug, Default)]
pub struct RequestScope {
    loaders: OnceLock<LoaderRegistry>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The request's loader registry, created lazily.
    pub fn loaders(&self) -> &LoaderRegistry {
        self.loaders.get_or_init(LoaderRegistry::new)
    }

    /// Whether any loader was requested in this scope yet.
    pub fn is_initialized(&self) -> bool {
        self.loaders.get().is_some()
    }
}

/// Anything that can hand out the current request's [`RequestScope`].
///
/// Implement this on the resolver layer's own context type.
pub trait ExecutionContext: Send + Sync {
    fn request_scope(&self) -> &RequestScope;
}

impl ExecutionContext for RequestScope {
    fn request_scope(&self) -> &RequestScope {
        self
    }
}

impl<T: ExecutionContext + ?Sized> ExecutionContext for Arc<T> {
    fn request_scope(&self) -> &RequestScope {
        (**self).request_scope()
    }
}
