//! Observability setup for relationship loaders.
//!
//! The loaders emit `tracing` events and `metrics` counters; this module
//! installs the subscriber that turns the events into text or JSON logs.
//! Metric counters are described by
//! [`register_loader_metrics`](relbatch_domain::coalescer::register_loader_metrics);
//! installing an exporter is left to the host application.

mod logging;

pub use logging::{create_json_layer, init_logging, LoggingConfig};
