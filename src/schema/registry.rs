//! Field type registry.
//!
//! Maps each [`FieldKind`] to a stable type name and a factory. The registry
//! is assembled once through [`FieldRegistryBuilder`] and then frozen: a
//! built [`FieldRegistry`] has no mutating methods, so it can be wrapped in
//! an `Arc` and read by any number of aggregates without locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::field::{
    BooleanFieldProperties, Field, FieldId, FieldKind, FieldProperties, FieldPropertiesKind,
    NumberFieldProperties, StringFieldProperties,
};

/// Error returned by registry lookups and field construction.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No factory is registered for this properties kind.
    ///
    /// A deployment gap: the running build does not register a kind that a
    /// caller tried to use.
    #[error("the field kind '{0}' is not supported")]
    UnsupportedFieldType(FieldKind),

    /// A stored type name has no registration.
    ///
    /// Recoverable: the data references a field type this build does not
    /// know about.
    #[error("a field with type '{0}' is not known")]
    UnknownFieldType(String),

    /// A factory rejected the properties value.
    #[error("invalid field properties: {0}")]
    InvalidProperties(String),

    /// Stored settings could not be encoded or decoded.
    #[error("field settings could not be converted: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Constructs a field of one kind from its typed properties.
pub type FieldFactory<P> = fn(FieldId, String, P) -> Result<Field, RegistryError>;

type ErasedFactory =
    Arc<dyn Fn(FieldId, String, FieldProperties) -> Result<Field, RegistryError> + Send + Sync>;

/// Registration metadata for one field kind.
#[derive(Clone)]
pub struct RegisteredField {
    type_name: &'static str,
    kind: FieldKind,
    factory: ErasedFactory,
    decode: fn(Value) -> serde_json::Result<FieldProperties>,
}

impl fmt::Debug for RegisteredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredField")
            .field("type_name", &self.type_name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl RegisteredField {
    /// The stable type name stored alongside encoded fields.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The properties kind this registration constructs.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Run the factory.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnsupportedFieldType`] if `properties` is of another
    /// kind, or whatever the factory itself rejects.
    pub fn create_field(
        &self,
        id: FieldId,
        name: impl Into<String>,
        properties: FieldProperties,
    ) -> Result<Field, RegistryError> {
        (self.factory)(id, name.into(), properties)
    }

    /// Decode kind-specific settings (without the kind tag).
    pub fn decode_properties(&self, settings: Value) -> Result<FieldProperties, RegistryError> {
        Ok((self.decode)(settings)?)
    }
}

fn decode_settings<P: FieldPropertiesKind>(settings: Value) -> serde_json::Result<FieldProperties> {
    serde_json::from_value::<P>(settings).map(Into::into)
}

/// Single-threaded builder phase of the registry.
#[derive(Debug, Default)]
pub struct FieldRegistryBuilder {
    by_kind: HashMap<FieldKind, RegisteredField>,
}

impl FieldRegistryBuilder {
    /// An empty builder, with no kinds registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for properties type `P`.
    ///
    /// The type name is `P::TYPE_NAME`. Registering the same kind again
    /// replaces the earlier registration.
    pub fn register<P: FieldPropertiesKind>(mut self, factory: FieldFactory<P>) -> Self {
        let erased: ErasedFactory = Arc::new(move |id, name, properties| {
            let typed = P::from_properties(properties)
                .map_err(|other| RegistryError::UnsupportedFieldType(other.kind()))?;
            factory(id, name, typed)
        });
        self.by_kind.insert(
            P::KIND,
            RegisteredField {
                type_name: P::TYPE_NAME,
                kind: P::KIND,
                factory: erased,
                decode: decode_settings::<P>,
            },
        );
        self
    }

    /// Register the built-in number, string and boolean kinds.
    pub fn with_builtin_kinds(self) -> Self {
        self.register::<NumberFieldProperties>(create_number_field)
            .register::<StringFieldProperties>(create_string_field)
            .register::<BooleanFieldProperties>(create_boolean_field)
    }

    /// Freeze the registrations.
    pub fn build(self) -> FieldRegistry {
        let by_type_name = self
            .by_kind
            .values()
            .map(|r| (r.type_name, r.kind))
            .collect();
        FieldRegistry {
            by_kind: self.by_kind,
            by_type_name,
        }
    }
}

/// Frozen field type registry.
///
/// Holds two indices over the same registrations: by properties kind (to
/// construct a field from an already typed value) and by type name (to
/// resolve stored data).
#[derive(Debug, Clone)]
pub struct FieldRegistry {
    by_kind: HashMap<FieldKind, RegisteredField>,
    by_type_name: HashMap<&'static str, FieldKind>,
}

impl Default for FieldRegistry {
    /// A registry with the built-in kinds.
    fn default() -> Self {
        FieldRegistryBuilder::new().with_builtin_kinds().build()
    }
}

impl FieldRegistry {
    /// Start a builder with no kinds registered.
    pub fn builder() -> FieldRegistryBuilder {
        FieldRegistryBuilder::new()
    }

    /// Construct a field through the factory registered for the kind of
    /// `properties`.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::UnsupportedFieldType`] -- the kind is not registered.
    /// * [`RegistryError::InvalidProperties`] -- the factory rejected the value.
    pub fn create_field(
        &self,
        id: FieldId,
        name: impl Into<String>,
        properties: FieldProperties,
    ) -> Result<Field, RegistryError> {
        self.find_by_kind(properties.kind())?
            .create_field(id, name, properties)
    }

    /// Look up the registration for a properties kind.
    pub fn find_by_kind(&self, kind: FieldKind) -> Result<&RegisteredField, RegistryError> {
        self.by_kind
            .get(&kind)
            .ok_or(RegistryError::UnsupportedFieldType(kind))
    }

    /// Look up the registration for a stored type name.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownFieldType`] if no registration has that name.
    pub fn find_by_type_name(&self, type_name: &str) -> Result<&RegisteredField, RegistryError> {
        self.by_type_name
            .get(type_name)
            .and_then(|kind| self.by_kind.get(kind))
            .ok_or_else(|| RegistryError::UnknownFieldType(type_name.to_string()))
    }

    /// Every registration, in no particular order.
    pub fn registrations(&self) -> impl Iterator<Item = &RegisteredField> {
        self.by_kind.values()
    }

    /// Tag a field with its registered type name for storage.
    pub fn encode_field(&self, field: &Field) -> Result<StoredField, RegistryError> {
        let registered = self.find_by_kind(field.kind())?;
        Ok(StoredField {
            field_type: registered.type_name().to_string(),
            id: field.id(),
            name: field.name().to_string(),
            settings: field.properties().settings_value()?,
            hidden: field.is_hidden(),
            disabled: field.is_disabled(),
        })
    }

    /// Rebuild a field from its stored form.
    ///
    /// # Errors
    ///
    /// * [`RegistryError::UnknownFieldType`] -- the stored type name is not registered.
    /// * [`RegistryError::Serde`] -- the settings do not decode as that kind.
    /// * Anything the factory rejects.
    pub fn decode_field(&self, stored: &StoredField) -> Result<Field, RegistryError> {
        let registered = self.find_by_type_name(&stored.field_type)?;
        let properties = registered.decode_properties(stored.settings.clone())?;
        let mut field = registered.create_field(stored.id, stored.name.clone(), properties)?;
        field.set_hidden(stored.hidden);
        field.set_disabled(stored.disabled);
        Ok(field)
    }
}

/// A field tagged with its registered type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredField {
    /// Registered type name, e.g. `"Number"`.
    pub field_type: String,
    pub id: FieldId,
    pub name: String,
    /// Kind-specific settings without the kind tag.
    pub settings: Value,
    pub hidden: bool,
    pub disabled: bool,
}

/// Factory for [`NumberFieldProperties`].
pub fn create_number_field(
    id: FieldId,
    name: String,
    properties: NumberFieldProperties,
) -> Result<Field, RegistryError> {
    properties
        .validate()
        .map_err(RegistryError::InvalidProperties)?;
    Ok(Field::new(id, name, properties.into()))
}

/// Factory for [`StringFieldProperties`].
pub fn create_string_field(
    id: FieldId,
    name: String,
    properties: StringFieldProperties,
) -> Result<Field, RegistryError> {
    properties
        .validate()
        .map_err(RegistryError::InvalidProperties)?;
    Ok(Field::new(id, name, properties.into()))
}

/// Factory for [`BooleanFieldProperties`].
pub fn create_boolean_field(
    id: FieldId,
    name: String,
    properties: BooleanFieldProperties,
) -> Result<Field, RegistryError> {
    Ok(Field::new(id, name, properties.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: FieldKind) -> FieldProperties {
        match kind {
            FieldKind::Number => NumberFieldProperties::default().into(),
            FieldKind::String => StringFieldProperties::default().into(),
            FieldKind::Boolean => BooleanFieldProperties::default().into(),
        }
    }

    #[test]
    fn default_registry_knows_builtin_kinds() {
        let registry = FieldRegistry::default();
        for kind in [FieldKind::Number, FieldKind::String, FieldKind::Boolean] {
            assert!(registry.find_by_kind(kind).is_ok(), "{kind} should be registered");
        }
        assert_eq!(registry.registrations().count(), 3);
    }

    #[test]
    fn type_name_and_kind_lookups_agree() {
        // For every registration, resolving its type name yields a factory
        // that builds fields of the same kind, and create_field for that kind
        // goes through the same registration.
        let registry = FieldRegistry::default();
        for registered in registry.registrations() {
            let by_name = registry.find_by_type_name(registered.type_name()).unwrap();
            assert_eq!(by_name.kind(), registered.kind());

            let field = by_name
                .create_field(FieldId(1), "f", sample(registered.kind()))
                .unwrap();
            assert_eq!(field.kind(), registered.kind());

            let direct = registry
                .create_field(FieldId(1), "f", sample(registered.kind()))
                .unwrap();
            assert_eq!(direct, field);
        }
    }

    #[test]
    fn type_names_are_stable() {
        let registry = FieldRegistry::default();
        assert_eq!(registry.find_by_kind(FieldKind::Number).unwrap().type_name(), "Number");
        assert_eq!(registry.find_by_kind(FieldKind::String).unwrap().type_name(), "String");
        assert_eq!(registry.find_by_kind(FieldKind::Boolean).unwrap().type_name(), "Boolean");
    }

    #[test]
    fn create_field_for_unregistered_kind_is_unsupported() {
        let registry = FieldRegistry::builder()
            .register::<StringFieldProperties>(create_string_field)
            .build();
        let err = registry
            .create_field(FieldId(1), "age", sample(FieldKind::Number))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedFieldType(FieldKind::Number)));
    }

    #[test]
    fn unknown_type_name_is_reported() {
        let err = FieldRegistry::default()
            .find_by_type_name("Geolocation")
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownFieldType(ref name) if name == "Geolocation"));
    }

    #[test]
    fn reregistering_a_kind_replaces_the_factory() {
        fn strict_number(
            _: FieldId,
            _: String,
            _: NumberFieldProperties,
        ) -> Result<Field, RegistryError> {
            Err(RegistryError::InvalidProperties("numbers are disabled".into()))
        }

        let registry = FieldRegistry::builder()
            .with_builtin_kinds()
            .register::<NumberFieldProperties>(strict_number)
            .build();

        assert_eq!(registry.registrations().count(), 3);
        let err = registry
            .create_field(FieldId(1), "n", sample(FieldKind::Number))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidProperties(_)));
    }

    #[test]
    fn factory_rejects_inconsistent_properties() {
        let props = NumberFieldProperties {
            min_value: Some(2.0),
            max_value: Some(1.0),
            ..Default::default()
        };
        let err = FieldRegistry::default()
            .create_field(FieldId(1), "n", props.into())
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidProperties(_)));
    }

    #[test]
    fn registration_rejects_properties_of_another_kind() {
        let registry = FieldRegistry::default();
        let number = registry.find_by_kind(FieldKind::Number).unwrap();
        let err = number
            .create_field(FieldId(1), "n", sample(FieldKind::Boolean))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedFieldType(FieldKind::Boolean)));
    }

    #[test]
    fn stored_field_restores_flags_and_settings() {
        let registry = FieldRegistry::default();
        let mut field = registry
            .create_field(
                FieldId(7),
                "rating",
                NumberFieldProperties {
                    min_value: Some(1.0),
                    max_value: Some(5.0),
                    ..Default::default()
                }
                .into(),
            )
            .unwrap();
        field.set_hidden(true);

        let stored = registry.encode_field(&field).unwrap();
        assert_eq!(stored.field_type, "Number");
        assert_eq!(stored.settings["max_value"], 5.0);

        let decoded = registry.decode_field(&stored).unwrap();
        assert_eq!(decoded, field);
    }

    #[test]
    fn decode_with_unknown_type_name_fails() {
        let stored = StoredField {
            field_type: "Geolocation".into(),
            id: FieldId(1),
            name: "location".into(),
            settings: serde_json::json!({}),
            hidden: false,
            disabled: false,
        };
        let err = FieldRegistry::default().decode_field(&stored).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownFieldType(_)));
    }

    #[test]
    fn decode_with_mismatched_settings_fails() {
        let stored = StoredField {
            field_type: "Boolean".into(),
            id: FieldId(1),
            name: "flag".into(),
            settings: serde_json::json!({"default_value": "yes"}),
            hidden: false,
            disabled: false,
        };
        let err = FieldRegistry::default().decode_field(&stored).unwrap_err();
        assert!(matches!(err, RegistryError::Serde(_)));
    }

    #[test]
    fn frozen_registry_is_shareable_across_threads() {
        let registry = Arc::new(FieldRegistry::default());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .create_field(FieldId(i), "title", sample(FieldKind::String))
                        .map(|f| f.id())
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap().unwrap(), FieldId(i as u64));
        }
    }
}
