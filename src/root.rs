//! Generic aggregate root: identity, version and the uncommitted buffer.
//!
//! [`AggregateRoot`] is the replay-and-apply engine shared by every
//! aggregate kind. State only ever moves forward: events are applied either
//! while replaying persisted history ([`AggregateRoot::load`]) or
//! immediately after a command has been fully validated
//! ([`AggregateRoot::execute`]). Nothing is raised speculatively, so nothing
//! ever needs to be rolled back.

use crate::aggregate::Aggregate;
use crate::error::DispatchError;
use crate::event::{EventRecord, decode_domain_event};

/// How replay treats a stored event whose kind tag has no bound handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Abort the load with [`DispatchError::UnboundEvent`].
    #[default]
    Reject,
    /// Log a warning and skip the event. The version still advances, so the
    /// aggregate stays aligned with the stored stream for concurrency checks.
    Skip,
}

/// An aggregate instance together with its identity, version and the events
/// raised since it was loaded.
///
/// # Invariants
///
/// - `version` starts at 0 and grows by exactly one per applied event, so
///   after replaying N stored events and raising M new ones it equals N + M.
/// - The uncommitted buffer holds exactly the events raised since load (or
///   since the last [`take_uncommitted`](AggregateRoot::take_uncommitted)).
#[derive(Debug)]
pub struct AggregateRoot<A: Aggregate> {
    id: String,
    version: u64,
    state: A,
    uncommitted: Vec<A::DomainEvent>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Create a root at version 0 with the given initial state.
    pub fn new(id: impl Into<String>, state: A) -> Self {
        Self {
            id: id.into(),
            version: 0,
            state,
            uncommitted: Vec::new(),
        }
    }

    /// Rebuild an aggregate by replaying its stored history, oldest first.
    ///
    /// The result is a pure function of `state` and `history`: loading the
    /// same history twice yields the same state and version.
    ///
    /// # Arguments
    ///
    /// * `id` - The aggregate instance identifier.
    /// * `state` - The initial (never-created) state to replay onto.
    /// * `history` - Stored records, ordered by stream version.
    /// * `policy` - What to do with records whose kind is not bound.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`]; the partially replayed state is discarded.
    pub fn load<'a>(
        id: impl Into<String>,
        state: A,
        history: impl IntoIterator<Item = &'a EventRecord>,
        policy: ReplayPolicy,
    ) -> Result<Self, DispatchError> {
        let mut root = Self::new(id, state);
        for record in history {
            root.replay_record(record, policy)?;
        }
        tracing::debug!(
            aggregate_type = A::AGGREGATE_TYPE,
            instance_id = %root.id,
            version = root.version,
            "history replayed"
        );
        Ok(root)
    }

    /// Rebuild an aggregate from already-typed events.
    ///
    /// Typed events are bound by construction, so this cannot fail.
    pub fn from_events<'a>(
        id: impl Into<String>,
        state: A,
        events: impl IntoIterator<Item = &'a A::DomainEvent>,
    ) -> Self {
        let mut root = Self::new(id, state);
        for event in events {
            root.state.apply(event);
            root.version += 1;
        }
        root
    }

    fn replay_record(
        &mut self,
        record: &EventRecord,
        policy: ReplayPolicy,
    ) -> Result<(), DispatchError> {
        if record.stream_version != self.version {
            return Err(DispatchError::OutOfOrder {
                expected: self.version,
                found: record.stream_version,
            });
        }
        if record.metadata.aggregate_type != A::AGGREGATE_TYPE {
            return Err(DispatchError::ForeignStream {
                expected: A::AGGREGATE_TYPE,
                found: record.metadata.aggregate_type.clone(),
                stream_version: record.stream_version,
            });
        }

        match decode_domain_event::<A>(record) {
            Ok(event) => self.state.apply(&event),
            Err(DispatchError::UnboundEvent { event_type, .. })
                if policy == ReplayPolicy::Skip =>
            {
                tracing::warn!(
                    aggregate_type = A::AGGREGATE_TYPE,
                    instance_id = %self.id,
                    event_type = %event_type,
                    stream_version = record.stream_version,
                    "skipping event with no bound handler"
                );
            }
            Err(e) => return Err(e),
        }
        self.version += 1;
        Ok(())
    }

    /// Validate a command and, if it is accepted, raise its event.
    ///
    /// # Returns
    ///
    /// The raised event, or `None` if the command was an accepted no-op.
    ///
    /// # Errors
    ///
    /// The aggregate's own error when the command is rejected. A rejected
    /// command leaves state, version and buffer untouched.
    pub fn execute(&mut self, cmd: A::Command) -> Result<Option<&A::DomainEvent>, A::Error> {
        match self.state.handle(cmd)? {
            Some(event) => Ok(Some(self.raise(event))),
            None => Ok(None),
        }
    }

    /// Apply an already-validated event and buffer it for persistence.
    ///
    /// Only ever called with the output of [`Aggregate::handle`].
    pub(crate) fn raise(&mut self, event: A::DomainEvent) -> &A::DomainEvent {
        self.state.apply(&event);
        self.version += 1;
        self.uncommitted.push(event);
        &self.uncommitted[self.uncommitted.len() - 1]
    }

    /// The aggregate instance identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of events applied so far, replayed and raised.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The version the store is expected to be at: [`version`](Self::version)
    /// minus the events still waiting in the buffer.
    pub fn committed_version(&self) -> u64 {
        self.version - self.uncommitted.len() as u64
    }

    /// The projected state.
    pub fn state(&self) -> &A {
        &self.state
    }

    /// Events raised but not yet handed to persistence.
    pub fn uncommitted(&self) -> &[A::DomainEvent] {
        &self.uncommitted
    }

    /// Drain the uncommitted buffer.
    pub fn take_uncommitted(&mut self) -> Vec<A::DomainEvent> {
        std::mem::take(&mut self.uncommitted)
    }

    /// Consume the root, returning its state.
    pub fn into_state(self) -> A {
        self.state
    }
}
