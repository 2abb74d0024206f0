//! Event-sourced aggregates and a content schema built on them.
//!
//! An aggregate's state is derived only from its ordered event history.
//! Commands are validated against the current state and, if accepted, raise
//! exactly one event which is applied immediately and buffered until an
//! [`EventStore`] commits it with an expected-version check.
//!
//! The [`schema`] module provides the concrete schema aggregate together
//! with the field type registry it validates fields against.

mod aggregate;
pub use aggregate::{Aggregate, DomainEvent};
mod command;
mod error;
mod event;
mod handler;
mod root;
pub mod schema;
mod store;

pub use command::CommandContext;
pub use error::{DispatchError, ExecuteError, StoreError};
pub use event::{EventMetadata, EventRecord, decode_domain_event, encode_domain_event, stream_uuid};
pub use handler::{CommandHandler, CommandHandlerBuilder};
pub use root::{AggregateRoot, ReplayPolicy};
pub use store::{EventStore, InMemoryEventStore};
