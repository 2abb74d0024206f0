//! Crate-level error types for replay, persistence and command execution.

/// A stored history could not be replayed.
///
/// Replay failures are fatal: they mean the running code and the persisted
/// data disagree, and continuing would produce a state silently missing a
/// mutation. They are never retried.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The event's kind tag has no bound handler on this aggregate type.
    ///
    /// Usually the stream was written by a newer build than the one
    /// replaying it. Only raised under [`ReplayPolicy::Reject`](crate::ReplayPolicy).
    #[error(
        "no handler bound for event '{event_type}' on aggregate '{aggregate_type}' \
         (stream version {stream_version})"
    )]
    UnboundEvent {
        /// The aggregate type being replayed.
        aggregate_type: &'static str,
        /// The unbound kind tag.
        event_type: String,
        /// Zero-based position of the record in its stream.
        stream_version: u64,
    },

    /// The kind tag is bound but its payload does not decode.
    #[error("malformed '{event_type}' event at stream version {stream_version}: {source}")]
    MalformedEvent {
        /// The kind tag of the record.
        event_type: String,
        /// Zero-based position of the record in its stream.
        stream_version: u64,
        /// The underlying decode failure.
        #[source]
        source: serde_json::Error,
    },

    /// A history record is not at the position the replay expected.
    #[error("history out of order: expected stream version {expected}, found {found}")]
    OutOfOrder {
        /// The version the aggregate had reached.
        expected: u64,
        /// The version stamped on the record.
        found: u64,
    },

    /// A history record was stamped with a different aggregate type.
    #[error(
        "event at stream version {stream_version} belongs to aggregate type '{found}', \
         not '{expected}'"
    )]
    ForeignStream {
        /// The aggregate type being replayed.
        expected: &'static str,
        /// The aggregate type stamped on the record.
        found: String,
        /// Zero-based position of the record in its stream.
        stream_version: u64,
    },
}

/// Error returned by an [`EventStore`](crate::EventStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The stream moved past the version the writer loaded.
    #[error("concurrency conflict: expected version {expected}, stream is at {actual}")]
    ConcurrencyConflict {
        /// The version the writer loaded the aggregate at.
        expected: u64,
        /// The version currently stored.
        actual: u64,
    },

    /// The version a backend reported does not match the number of records
    /// it returned.
    #[error("store reported version {reported} but its history replays to {replayed}")]
    InconsistentHistory { reported: u64, replayed: u64 },

    /// Backend-specific failure (I/O, connection loss, ...).
    #[error("event store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Error returned when executing a command against an aggregate fails.
///
/// Generic over `E`, the domain-specific error type that the aggregate's
/// command handler may produce.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError<E: std::error::Error + Send + Sync + 'static> {
    /// Command rejected by aggregate logic.
    #[error(transparent)]
    Domain(E),

    /// The aggregate's history could not be replayed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Optimistic concurrency check failed at commit time.
    ///
    /// The caller should reload and re-apply the command.
    #[error("optimistic concurrency conflict: expected version {expected}, stream is at {actual}")]
    Conflict {
        /// The version the aggregate was loaded at.
        expected: u64,
        /// The version found in the store.
        actual: u64,
    },

    /// A raised event could not be encoded into a record.
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    /// The event store failed for a reason other than a version conflict.
    #[error(transparent)]
    Store(StoreError),
}

impl<E: std::error::Error + Send + Sync + 'static> From<StoreError> for ExecuteError<E> {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConcurrencyConflict { expected, actual } => {
                ExecuteError::Conflict { expected, actual }
            }
            other => ExecuteError::Store(other),
        }
    }
}
