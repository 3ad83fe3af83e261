//! Ward statistics bounded context.
//!
//! Owns the `WardStatistic` aggregate and its events, the command and query
//! handlers that read and write it through the event sourcing engine and the
//! cache, the derived views computed from it, and the background jobs that
//! keep those views warm.

pub mod application;
pub mod domain;
