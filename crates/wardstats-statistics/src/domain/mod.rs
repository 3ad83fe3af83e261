//! Domain layer for the ward statistics context.

pub mod aggregates;
pub mod commands;
pub mod events;
