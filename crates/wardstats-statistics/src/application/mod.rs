//! Application layer for the ward statistics context.

pub mod command_handlers;
pub mod computations;
pub mod jobs;
pub mod query_handlers;
