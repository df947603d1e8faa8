//! Relation loaders for field resolvers.
//!
//! A resolver for a related field hands the parent's key, the identity of
//! the field selection and the window arguments to a loader. Every call for
//! the same selection within one request joins one coalescer, so resolving
//! the field for N parents costs one backing-store query:
//!
//! 1. **Short-circuit**: an absent parent key resolves empty without dispatching
//! 2. **Coalesce**: keys from one scheduling window share one [`RecordFetcher`] call
//! 3. **Map**: fetched records are re-associated with keys by their accessor
//! 4. **Window**: offset/limit or page/perPage is applied per parent
//!
//! [`ChildLoader`] covers one-to-many relations, [`KeyedLoader`] one-to-one
//! lookups.

mod child;
mod keyed;
mod path;
mod types;

pub use child::{ChildLoader, ChildLoaderBuilder};
pub use keyed::{KeyedLoader, KeyedLoaderBuilder};
pub use path::field_path;
pub use types::{fetcher_fn, FetcherFn, KeyAccessor, RecordFetcher, RelationRequest};
