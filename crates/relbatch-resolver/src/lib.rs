//! relbatch-resolver: Relationship loaders for field resolvers
//!
//! This crate contains the resolver-facing layer including:
//! - One-to-many and one-to-one relation loaders
//! - The record fetcher boundary to the backing store
//! - Dotted-path key accessors for JSON documents
//! - Configuration management
//! - Logging setup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              relbatch-resolver              │
//! ├─────────────────────────────────────────────┤
//! │  config.rs      - Configuration management  │
//! │  handlers/      - Resolver-facing loaders   │
//! │    relation/      - Child & keyed loaders   │
//! │  observability/ - Logging setup             │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod handlers;
pub mod observability;

// Re-exports for convenience
pub use config::{ConfigLoadError, RelbatchConfig};
pub use handlers::relation::{
    fetcher_fn, field_path, ChildLoader, KeyedLoader, RecordFetcher, RelationRequest,
};
