//! Ward Statistics Core: shared event-sourcing abstractions.
//!
//! This crate defines the traits and types that the event store, the
//! sourcing engine, and the statistical aggregates depend on. It contains
//! no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod registry;
pub mod repository;
