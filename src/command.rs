//! Who issued a command, and why.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::EventMetadata;

/// Audit data that travels with a command into every event it raises.
///
/// Commands and events stay free of audit concerns. The context is stamped
/// onto each [`EventRecord`](crate::EventRecord) as its [`EventMetadata`]
/// when the raised events are encoded.
///
/// # Examples
///
/// ```
/// use schemafold::CommandContext;
/// use serde_json::json;
///
/// let ctx = CommandContext::default()
///     .with_actor("editor-7")
///     .with_correlation_id("publish-blog-2024")
///     .with_metadata(json!({"client": "schema-designer"}));
///
/// assert_eq!(ctx.actor.as_deref(), Some("editor-7"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandContext {
    /// The editor or service issuing the command.
    pub actor: Option<String>,
    /// Groups the events of one request, possibly across several schemas.
    pub correlation_id: Option<String>,
    /// Free-form data copied to [`EventMetadata::extra`].
    pub metadata: Option<Value>,
}

impl CommandContext {
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, meta: Value) -> Self {
        self.metadata = Some(meta);
        self
    }

    /// Metadata for an event raised by this command on the given stream.
    pub(crate) fn event_metadata(&self, aggregate_type: &str, instance_id: &str) -> EventMetadata {
        EventMetadata {
            aggregate_type: aggregate_type.to_string(),
            instance_id: instance_id.to_string(),
            actor: self.actor.clone(),
            correlation_id: self.correlation_id.clone(),
            extra: self.metadata.clone(),
        }
    }
}
