//! Aggregate and domain event traits.

use serde::{Serialize, de::DeserializeOwned};

/// A domain event carrying a stable kind tag.
///
/// The kind tag is what the dispatch core routes on when replaying stored
/// history. It must equal the `"type"` value of the event's adjacently
/// tagged serde representation (`#[serde(tag = "type", content = "data")]`)
/// and must never change once events of that kind have been persisted.
///
/// # Contract
///
/// - [`KINDS`](DomainEvent::KINDS) lists every kind the aggregate binds a
///   handler for. A stored event whose tag is not in this list is *unbound*.
/// - [`kind`](DomainEvent::kind) returns one of the entries of `KINDS`.
pub trait DomainEvent:
    Serialize + DeserializeOwned + Clone + std::fmt::Debug + Send + Sync + 'static
{
    /// Every kind tag this event type declares.
    const KINDS: &'static [&'static str];

    /// The kind tag of this event.
    fn kind(&self) -> &'static str;

    /// Returns `true` if `kind` has a bound handler.
    fn is_bound(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }
}

/// A domain aggregate whose state is derived from its event history.
///
/// The implementing type itself serves as the aggregate's projected state.
/// Identity, versioning and the uncommitted buffer live in
/// [`AggregateRoot`](crate::AggregateRoot), which drives this trait.
///
/// # Associated Types
///
/// - `Command`: the set of commands this aggregate can handle.
/// - `DomainEvent`: the set of events this aggregate can produce and apply.
/// - `Error`: command rejection / validation error.
///
/// # Contract
///
/// - [`handle`](Aggregate::handle) must be a pure decision function: no I/O,
///   no side effects. It validates a command against the current state and
///   returns at most one event. Every precondition is checked here; an event
///   returned from `handle` is always safe to apply.
/// - [`apply`](Aggregate::apply) must be a pure, total function of the
///   current state and the event. It never fails, because events are facts.
pub trait Aggregate: Send + Sync + 'static {
    /// Identifies this aggregate type (e.g. "schema").
    const AGGREGATE_TYPE: &'static str;

    /// The set of commands this aggregate can handle.
    type Command: Send + 'static;

    /// The set of events this aggregate can produce and apply.
    type DomainEvent: DomainEvent;

    /// Command rejection / validation error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Validate a command against the current state and decide its event.
    ///
    /// Returns `Ok(None)` if the command is a no-op.
    /// Returns `Err` to reject the command.
    fn handle(&self, cmd: Self::Command) -> Result<Option<Self::DomainEvent>, Self::Error>;

    /// Apply a single event to the projected state.
    fn apply(&mut self, event: &Self::DomainEvent);
}
