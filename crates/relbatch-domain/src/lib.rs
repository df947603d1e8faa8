//! relbatch-domain: Request-scoped relationship batching
//!
//! This crate contains the batching core used by field resolvers:
//! - Key identity normalization
//! - Deferred batch coalescing with a per-coalescer result cache
//! - One-to-many and one-to-one result mapping
//! - Offset/limit and page/perPage windowing
//! - Per-request, per-traversal coalescer scoping
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               relbatch-domain               │
//! ├─────────────────────────────────────────────┤
//! │  key/       - Key identity policy           │
//! │  coalescer/ - Deferred batch dispatch       │
//! │  mapper/    - Per-key result association    │
//! │  window/    - Post-fetch windowing          │
//! │  context/   - Request & traversal scoping   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod coalescer;
pub mod context;
pub mod error;
pub mod key;
pub mod mapper;
pub mod window;

// Re-export commonly used types at the crate root
pub use coalescer::{batch_fn, BatchLoad, Coalescer, CoalescerConfig, KeyOutcome};
pub use context::{ExecutionContext, LoaderRegistry, RequestScope, TraversalId};
pub use error::{LoadError, LoadResult, RecordError};
pub use key::{KeyIdentity, NormalizedKey, ObjectId};
pub use mapper::{DuplicateKeyPolicy, FetchedRecord};
pub use window::{OffsetLimit, Page, PageArgs, PageInfo};
