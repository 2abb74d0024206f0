//! Stored event records and the encode/decode bridge to domain events.
//!
//! [`EventRecord`] is the persistence-neutral envelope handed to and read
//! back from an [`EventStore`](crate::EventStore). It carries the kind tag
//! separately from the payload so that dispatch can route on the tag alone,
//! before any payload decoding is attempted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::command::CommandContext;
use crate::error::DispatchError;

/// Fixed namespace UUID for deterministic stream ID derivation.
const STREAM_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3c, 0x71, 0x0e, 0x9d, 0x52, 0xa4, 0x4f, 0x18, 0x8b, 0x27, 0xd6, 0x40, 0x1a, 0xe3, 0x95, 0x6f,
]);

/// Derive a deterministic stream UUID from aggregate type and instance ID.
///
/// Uses UUID v5 with a fixed namespace over `"{aggregate_type}/{instance_id}"`,
/// so the same aggregate identity always maps to the same stream.
///
/// # Examples
///
/// ```
/// use schemafold::stream_uuid;
/// let id = stream_uuid("schema", "blog");
/// assert_eq!(id, stream_uuid("schema", "blog"));
/// assert_ne!(id, stream_uuid("schema", "news"));
/// ```
pub fn stream_uuid(aggregate_type: &str, instance_id: &str) -> Uuid {
    let name = format!("{aggregate_type}/{instance_id}");
    Uuid::new_v5(&STREAM_NAMESPACE, name.as_bytes())
}

/// Infrastructure metadata stamped on every event record.
///
/// The `aggregate_type` and `instance_id` fields make each record
/// self-describing, so a replay can refuse records that belong to another
/// aggregate type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Aggregate type name (e.g., "schema").
    pub aggregate_type: String,
    /// Aggregate instance identifier.
    pub instance_id: String,
    /// Actor identity from the command context, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Correlation ID from the command context, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Free-form metadata from the command context, if provided.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// An immutable event as persisted in an aggregate's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Newly generated UUID v4 event ID.
    pub event_id: Uuid,
    /// Kind tag used for dispatch (e.g., "FieldAdded").
    pub event_type: String,
    /// Zero-based position of this event within its stream.
    pub stream_version: u64,
    /// JSON payload (the `"data"` portion of the adjacently tagged event).
    /// `Null` for fieldless variants.
    pub data: Value,
    /// Infrastructure metadata.
    pub metadata: EventMetadata,
}

/// Encode a domain event into an [`EventRecord`].
///
/// Serializes the adjacently tagged domain event, splits it into its kind
/// tag and payload, and stamps the record with the aggregate identity, the
/// stream position and the command context.
///
/// # Errors
///
/// Returns `serde_json::Error` if the domain event cannot be serialized, if
/// it does not serialize to an adjacently tagged object, or if its serde tag
/// differs from [`DomainEvent::kind`].
pub fn encode_domain_event<A: Aggregate>(
    event: &A::DomainEvent,
    ctx: &CommandContext,
    instance_id: &str,
    stream_version: u64,
) -> serde_json::Result<EventRecord> {
    // Adjacently tagged serde produces `{"type": "FieldHidden", "data": {...}}`,
    // or just `{"type": "SchemaPublished"}` for unit variants.
    let value = serde_json::to_value(event)?;
    let Value::Object(mut obj) = value else {
        return Err(serde::ser::Error::custom(
            "domain event must serialize to an adjacently tagged object",
        ));
    };

    let event_type = match obj.remove("type") {
        Some(Value::String(tag)) => tag,
        _ => {
            return Err(serde::ser::Error::custom(
                "domain event must carry a string 'type' tag",
            ));
        }
    };
    if event_type != event.kind() {
        return Err(serde::ser::Error::custom(format!(
            "domain event serialized with tag '{event_type}' but reports kind '{}'",
            event.kind()
        )));
    }
    let data = obj.remove("data").unwrap_or(Value::Null);

    Ok(EventRecord {
        event_id: Uuid::new_v4(),
        event_type,
        stream_version,
        data,
        metadata: ctx.event_metadata(A::AGGREGATE_TYPE, instance_id),
    })
}

/// Decode a stored record back into `A::DomainEvent`.
///
/// Routing happens on the record's kind tag first: a tag that
/// `A::DomainEvent` does not declare is reported as
/// [`DispatchError::UnboundEvent`] without looking at the payload. A bound
/// tag whose payload does not decode is [`DispatchError::MalformedEvent`].
///
/// # Errors
///
/// See above. Both variants are fatal during replay.
pub fn decode_domain_event<A: Aggregate>(
    record: &EventRecord,
) -> Result<A::DomainEvent, DispatchError> {
    if !A::DomainEvent::is_bound(&record.event_type) {
        return Err(DispatchError::UnboundEvent {
            aggregate_type: A::AGGREGATE_TYPE,
            event_type: record.event_type.clone(),
            stream_version: record.stream_version,
        });
    }

    let tagged = if record.data.is_null() {
        serde_json::json!({ "type": record.event_type })
    } else {
        serde_json::json!({ "type": record.event_type, "data": record.data })
    };

    serde_json::from_value(tagged).map_err(|source| DispatchError::MalformedEvent {
        event_type: record.event_type.clone(),
        stream_version: record.stream_version,
        source,
    })
}
