//! Content schemas: fields, the field type registry and the schema aggregate.

mod aggregate;
mod field;
mod registry;

pub use aggregate::{
    Schema, SchemaAggregate, SchemaCommand, SchemaError, SchemaEvent, SchemaLifecycle,
    SchemaProperties,
};
pub use field::{
    BooleanFieldProperties, Field, FieldId, FieldKind, FieldProperties, FieldPropertiesKind,
    NumberFieldProperties, StringFieldProperties,
};
pub use registry::{
    FieldFactory, FieldRegistry, FieldRegistryBuilder, RegisteredField, RegistryError,
    StoredField, create_boolean_field, create_number_field, create_string_field,
};
