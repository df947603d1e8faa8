//! Field-resolver facing handlers.

pub mod relation;
