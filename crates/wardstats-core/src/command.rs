//! Command abstractions.

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// The entity the command targets.
    fn entity_id(&self) -> &str;

    /// The acting user, recorded on every event the command produces.
    fn actor_id(&self) -> Option<&str>;
}
