//! Event record stores for the ward statistics core.
//!
//! [`pg_event_store::PgEventStore`] is the durable production store;
//! [`memory_event_store::InMemoryEventStore`] serves local runs and tests.

pub mod memory_event_store;
pub mod pg_event_store;
pub mod schema;
