//! Statistical aggregate replay contract.

use crate::event::{DomainEvent, Recorded};
use crate::registry::EventRegistry;

/// An aggregate whose state is fully derivable from its ordered event stream.
///
/// Replay is a pure fold: starting from the zero-valued instance returned by
/// the caller, [`evolve`](Self::evolve) is applied once per event in
/// ascending sequence order. The result must depend only on the events
/// (fields derived from event timestamps included), never on wall-clock time
/// or external state.
pub trait StatisticalAggregate: Sized + Send + Sync {
    /// The event family this aggregate produces and consumes.
    type Event: DomainEvent + Clone + 'static;

    /// Aggregate type name stored alongside every event.
    fn entity_type() -> &'static str;

    /// Decoders for every event tag this aggregate has ever produced.
    fn event_registry() -> &'static EventRegistry<Self::Event>;

    /// Returns the entity identifier.
    fn entity_id(&self) -> &str;

    /// Returns the number of events applied so far.
    fn version(&self) -> i64;

    /// Pure state transition for one recorded event.
    #[must_use]
    fn evolve(self, event: &Recorded<Self::Event>) -> Self;

    /// Events produced by mutations since the last [`produce_events`](Self::produce_events).
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drains the uncommitted events, in the order the changes logically
    /// occurred.
    fn produce_events(&mut self) -> Vec<Self::Event>;

    /// Applies an ordered sequence of events.
    #[must_use]
    fn rebuild_from_events(self, events: &[Recorded<Self::Event>]) -> Self {
        events.iter().fold(self, Self::evolve)
    }
}
