//! The schema aggregate and its lifecycle state machine.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::field::{Field, FieldId, FieldKind, FieldProperties};
use super::registry::{FieldRegistry, RegistryError};
use crate::aggregate::{Aggregate, DomainEvent};

/// Editor-facing metadata of a schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaProperties {
    /// Display name shown instead of the slug.
    pub label: Option<String>,
    /// Help text for editors.
    pub hints: Option<String>,
}

/// Projected state of a created schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    properties: SchemaProperties,
    fields: BTreeMap<FieldId, Field>,
    next_field_id: u64,
    published: bool,
    deleted: bool,
}

impl Schema {
    fn new(name: String) -> Self {
        Self {
            name,
            properties: SchemaProperties::default(),
            fields: BTreeMap::new(),
            next_field_id: 0,
            published: false,
            deleted: false,
        }
    }

    /// The slug given at creation. Never changes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label and hints set by the last `SchemaUpdated`.
    pub fn properties(&self) -> &SchemaProperties {
        &self.properties
    }

    /// Active fields, ordered by id.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// An active field by id. Deleted fields are gone.
    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.fields.get(&id)
    }

    /// An active field by name. Names are unique among active fields.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.values().find(|f| f.name() == name)
    }

    /// The highest field id ever assigned. Never decreases.
    pub fn next_field_id(&self) -> u64 {
        self.next_field_id
    }

    /// Whether content can currently be created against this schema.
    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Whether `SchemaDeleted` has been applied. Terminal.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn existing_field(&self, id: FieldId) -> Result<&Field, SchemaError> {
        self.fields.get(&id).ok_or(SchemaError::NotFound(id))
    }
}

/// Coarse lifecycle phase of a schema aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaLifecycle {
    /// No `SchemaCreated` yet; only `Create` is accepted.
    Uninitialized,
    /// Created and not deleted; every command but `Create` is accepted.
    Created,
    /// Deleted; every command is rejected.
    Deleted,
}

/// Commands accepted by [`SchemaAggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SchemaCommand {
    /// Create the schema. Only valid once, on a never-created aggregate.
    Create {
        /// Slug such as `blog-posts`.
        name: String,
    },
    /// Replace the schema's label and hints.
    Update { properties: SchemaProperties },
    /// Add a field under the next unused id.
    AddField {
        /// Property name such as `publishedAt`; unique among active fields.
        name: String,
        /// Kind and settings, validated by the registered factory.
        properties: FieldProperties,
    },
    /// Replace a field's settings. The kind cannot change.
    UpdateField {
        field_id: FieldId,
        properties: FieldProperties,
    },
    /// Hide a field from content editors.
    HideField { field_id: FieldId },
    /// Undo [`HideField`](Self::HideField).
    ShowField { field_id: FieldId },
    /// Undo [`DisableField`](Self::DisableField).
    EnableField { field_id: FieldId },
    /// Make a field read-only for content editors.
    DisableField { field_id: FieldId },
    /// Remove a field. Its id is never handed out again.
    DeleteField { field_id: FieldId },
    /// Make the schema available for content.
    Publish,
    /// Withdraw the schema from content creation.
    Unpublish,
    /// Delete the schema for good.
    Delete,
}

/// Events raised by [`SchemaAggregate`].
///
/// The variant names are the persisted kind tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SchemaEvent {
    /// The schema was created with an empty field mapping.
    SchemaCreated { name: String },
    /// Label and hints were replaced.
    SchemaUpdated { properties: SchemaProperties },
    /// A field was added. Carries the full properties so replay needs no
    /// registry.
    FieldAdded {
        field_id: FieldId,
        name: String,
        properties: FieldProperties,
    },
    /// A field's settings were replaced.
    FieldUpdated {
        field_id: FieldId,
        properties: FieldProperties,
    },
    /// A field was hidden.
    FieldHidden { field_id: FieldId },
    /// A hidden field was shown again.
    FieldShown { field_id: FieldId },
    /// A disabled field was enabled again.
    FieldEnabled { field_id: FieldId },
    /// A field was disabled.
    FieldDisabled { field_id: FieldId },
    /// A field left the active mapping.
    FieldDeleted { field_id: FieldId },
    /// The schema was published.
    SchemaPublished,
    /// The schema was unpublished.
    SchemaUnpublished,
    /// The schema was deleted. Terminal.
    SchemaDeleted,
}

impl DomainEvent for SchemaEvent {
    const KINDS: &'static [&'static str] = &[
        "SchemaCreated",
        "SchemaUpdated",
        "FieldAdded",
        "FieldUpdated",
        "FieldHidden",
        "FieldShown",
        "FieldEnabled",
        "FieldDisabled",
        "FieldDeleted",
        "SchemaPublished",
        "SchemaUnpublished",
        "SchemaDeleted",
    ];

    fn kind(&self) -> &'static str {
        match self {
            SchemaEvent::SchemaCreated { .. } => "SchemaCreated",
            SchemaEvent::SchemaUpdated { .. } => "SchemaUpdated",
            SchemaEvent::FieldAdded { .. } => "FieldAdded",
            SchemaEvent::FieldUpdated { .. } => "FieldUpdated",
            SchemaEvent::FieldHidden { .. } => "FieldHidden",
            SchemaEvent::FieldShown { .. } => "FieldShown",
            SchemaEvent::FieldEnabled { .. } => "FieldEnabled",
            SchemaEvent::FieldDisabled { .. } => "FieldDisabled",
            SchemaEvent::FieldDeleted { .. } => "FieldDeleted",
            SchemaEvent::SchemaPublished => "SchemaPublished",
            SchemaEvent::SchemaUnpublished => "SchemaUnpublished",
            SchemaEvent::SchemaDeleted => "SchemaDeleted",
        }
    }
}

/// Rejection of a schema command. Nothing is raised when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The command's own data is invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The lifecycle phase forbids the command.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// The command names a field that is not in the active mapping.
    #[error("field {0} not found")]
    NotFound(FieldId),

    /// The properties kind has no registered factory.
    #[error("the field kind '{0}' is not supported")]
    UnsupportedFieldType(FieldKind),
}

impl From<RegistryError> for SchemaError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnsupportedFieldType(kind) => SchemaError::UnsupportedFieldType(kind),
            RegistryError::UnknownFieldType(name) => {
                SchemaError::Validation(format!("a field with type '{name}' is not known"))
            }
            RegistryError::InvalidProperties(msg) => SchemaError::Validation(msg),
            RegistryError::Serde(e) => SchemaError::Validation(e.to_string()),
        }
    }
}

/// Event-sourced schema.
///
/// Holds the shared, frozen [`FieldRegistry`] used to validate field
/// commands, and the projected [`Schema`] once a `SchemaCreated` event has
/// been applied. Replay never consults the registry: `FieldAdded` and
/// `FieldUpdated` carry the complete properties value.
#[derive(Debug, Clone)]
pub struct SchemaAggregate {
    registry: Arc<FieldRegistry>,
    schema: Option<Schema>,
}

impl SchemaAggregate {
    /// A never-created schema.
    pub fn new(registry: Arc<FieldRegistry>) -> Self {
        Self {
            registry,
            schema: None,
        }
    }

    /// The projected schema, once created. Still present after deletion.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// The current lifecycle phase.
    pub fn lifecycle(&self) -> SchemaLifecycle {
        match &self.schema {
            None => SchemaLifecycle::Uninitialized,
            Some(s) if s.deleted => SchemaLifecycle::Deleted,
            Some(_) => SchemaLifecycle::Created,
        }
    }

    /// The registry field commands are validated against.
    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    fn live_schema(&self) -> Result<&Schema, SchemaError> {
        match &self.schema {
            None => Err(SchemaError::InvalidState("schema has not been created")),
            Some(s) if s.deleted => Err(SchemaError::InvalidState("schema has been deleted")),
            Some(s) => Ok(s),
        }
    }
}

/// Lowercase letters and digits in dash-separated groups, e.g. `blog-posts`.
fn is_slug(name: &str) -> bool {
    name.split('-').all(|part| {
        !part.is_empty()
            && part
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    })
}

/// An ASCII letter followed by ASCII letters or digits, e.g. `publishedAt`.
fn is_property_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic()) && chars.all(|c| c.is_ascii_alphanumeric())
}

fn validate_schema_name(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() {
        return Err(SchemaError::Validation("schema name is required".into()));
    }
    if !is_slug(name) {
        return Err(SchemaError::Validation(format!(
            "schema name '{name}' must be a slug of lowercase letters, digits and dashes"
        )));
    }
    Ok(())
}

fn validate_field_name(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() {
        return Err(SchemaError::Validation("field name is required".into()));
    }
    if !is_property_name(name) {
        return Err(SchemaError::Validation(format!(
            "field name '{name}' must start with a letter and contain only letters and digits"
        )));
    }
    Ok(())
}

impl Aggregate for SchemaAggregate {
    const AGGREGATE_TYPE: &'static str = "schema";

    type Command = SchemaCommand;
    type DomainEvent = SchemaEvent;
    type Error = SchemaError;

    fn handle(&self, cmd: Self::Command) -> Result<Option<Self::DomainEvent>, Self::Error> {
        if let SchemaCommand::Create { name } = &cmd
            && self.schema.is_none()
        {
            validate_schema_name(name)?;
            return Ok(Some(SchemaEvent::SchemaCreated { name: name.clone() }));
        }

        let schema = self.live_schema()?;
        let event = match cmd {
            SchemaCommand::Create { .. } => {
                return Err(SchemaError::InvalidState("schema has already been created"));
            }
            SchemaCommand::Update { properties } => SchemaEvent::SchemaUpdated { properties },
            SchemaCommand::AddField { name, properties } => {
                validate_field_name(&name)?;
                if schema.field_by_name(&name).is_some() {
                    return Err(SchemaError::Validation(format!(
                        "a field named '{name}' already exists"
                    )));
                }
                let field_id = FieldId(schema.next_field_id + 1);
                self.registry
                    .create_field(field_id, name.as_str(), properties.clone())?;
                SchemaEvent::FieldAdded {
                    field_id,
                    name,
                    properties,
                }
            }
            SchemaCommand::UpdateField {
                field_id,
                properties,
            } => {
                let field = schema.existing_field(field_id)?;
                if field.kind() != properties.kind() {
                    return Err(SchemaError::Validation(format!(
                        "field {field_id} is a {} field and cannot take {} properties",
                        field.kind(),
                        properties.kind()
                    )));
                }
                self.registry
                    .create_field(field_id, field.name(), properties.clone())?;
                SchemaEvent::FieldUpdated {
                    field_id,
                    properties,
                }
            }
            SchemaCommand::HideField { field_id } => {
                schema.existing_field(field_id)?;
                SchemaEvent::FieldHidden { field_id }
            }
            SchemaCommand::ShowField { field_id } => {
                schema.existing_field(field_id)?;
                SchemaEvent::FieldShown { field_id }
            }
            SchemaCommand::EnableField { field_id } => {
                schema.existing_field(field_id)?;
                SchemaEvent::FieldEnabled { field_id }
            }
            SchemaCommand::DisableField { field_id } => {
                schema.existing_field(field_id)?;
                SchemaEvent::FieldDisabled { field_id }
            }
            SchemaCommand::DeleteField { field_id } => {
                schema.existing_field(field_id)?;
                SchemaEvent::FieldDeleted { field_id }
            }
            SchemaCommand::Publish => SchemaEvent::SchemaPublished,
            SchemaCommand::Unpublish => SchemaEvent::SchemaUnpublished,
            SchemaCommand::Delete => SchemaEvent::SchemaDeleted,
        };
        Ok(Some(event))
    }

    fn apply(&mut self, event: &Self::DomainEvent) {
        if let SchemaEvent::SchemaCreated { name } = event {
            self.schema = Some(Schema::new(name.clone()));
            return;
        }
        let Some(schema) = self.schema.as_mut() else {
            return;
        };
        match event {
            SchemaEvent::SchemaCreated { .. } => {}
            SchemaEvent::SchemaUpdated { properties } => schema.properties = properties.clone(),
            SchemaEvent::FieldAdded {
                field_id,
                name,
                properties,
            } => {
                schema.next_field_id += 1;
                schema
                    .fields
                    .insert(*field_id, Field::new(*field_id, name.clone(), properties.clone()));
            }
            SchemaEvent::FieldUpdated {
                field_id,
                properties,
            } => {
                if let Some(field) = schema.fields.get_mut(field_id) {
                    field.set_properties(properties.clone());
                }
            }
            SchemaEvent::FieldHidden { field_id } => {
                if let Some(field) = schema.fields.get_mut(field_id) {
                    field.set_hidden(true);
                }
            }
            SchemaEvent::FieldShown { field_id } => {
                if let Some(field) = schema.fields.get_mut(field_id) {
                    field.set_hidden(false);
                }
            }
            SchemaEvent::FieldEnabled { field_id } => {
                if let Some(field) = schema.fields.get_mut(field_id) {
                    field.set_disabled(false);
                }
            }
            SchemaEvent::FieldDisabled { field_id } => {
                if let Some(field) = schema.fields.get_mut(field_id) {
                    field.set_disabled(true);
                }
            }
            SchemaEvent::FieldDeleted { field_id } => {
                schema.fields.remove(field_id);
            }
            SchemaEvent::SchemaPublished => schema.published = true,
            SchemaEvent::SchemaUnpublished => schema.published = false,
            SchemaEvent::SchemaDeleted => schema.deleted = true,
        }
    }
}
