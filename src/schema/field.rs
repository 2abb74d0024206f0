//! Fields and their kind-specific properties.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Identifier of a field within its schema.
///
/// Assigned once by the schema from a counter that never goes backwards,
/// so an id is never reused, not even after its field is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The enumerated kind tag carried by every [`FieldProperties`] value.
///
/// The field type registry is keyed by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    /// Floating point values, see [`NumberFieldProperties`].
    Number,
    /// Text, see [`StringFieldProperties`].
    String,
    /// Yes/no values, see [`BooleanFieldProperties`].
    Boolean,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Implemented by each kind-specific properties struct.
///
/// `TYPE_NAME` is the stable, human-readable name stored alongside encoded
/// fields. It is part of the persisted format: never rename it.
pub trait FieldPropertiesKind:
    Serialize + DeserializeOwned + Into<FieldProperties> + Send + Sync + 'static
{
    /// The kind tag.
    const KIND: FieldKind;

    /// The stable type name.
    const TYPE_NAME: &'static str;

    /// Extract this kind from a properties value, or hand it back unchanged.
    fn from_properties(properties: FieldProperties) -> Result<Self, FieldProperties>;
}

/// Kind-specific settings of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "settings")]
pub enum FieldProperties {
    Number(NumberFieldProperties),
    String(StringFieldProperties),
    Boolean(BooleanFieldProperties),
}

impl FieldProperties {
    /// The kind tag of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldProperties::Number(_) => FieldKind::Number,
            FieldProperties::String(_) => FieldKind::String,
            FieldProperties::Boolean(_) => FieldKind::Boolean,
        }
    }

    /// Display label shown to editors, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            FieldProperties::Number(p) => p.label.as_deref(),
            FieldProperties::String(p) => p.label.as_deref(),
            FieldProperties::Boolean(p) => p.label.as_deref(),
        }
    }

    /// Whether content must provide a value for this field.
    pub fn is_required(&self) -> bool {
        match self {
            FieldProperties::Number(p) => p.required,
            FieldProperties::String(p) => p.required,
            FieldProperties::Boolean(p) => p.required,
        }
    }

    /// Serialize only the kind-specific settings, without the kind tag.
    pub(crate) fn settings_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            FieldProperties::Number(p) => serde_json::to_value(p),
            FieldProperties::String(p) => serde_json::to_value(p),
            FieldProperties::Boolean(p) => serde_json::to_value(p),
        }
    }
}

/// Settings of a numeric field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFieldProperties {
    /// Display label shown to editors.
    pub label: Option<String>,
    /// Help text shown below the input.
    pub hints: Option<String>,
    /// Whether content must provide a value.
    pub required: bool,
    /// Inclusive lower bound.
    pub min_value: Option<f64>,
    /// Inclusive upper bound.
    pub max_value: Option<f64>,
    /// Value prefilled for new content. Must lie within the bounds.
    pub default_value: Option<f64>,
}

impl NumberFieldProperties {
    /// Check that the bounds are consistent and the default lies within them.
    pub fn validate(&self) -> Result<(), String> {
        let values = [self.min_value, self.max_value, self.default_value];
        if values.iter().flatten().any(|v| !v.is_finite()) {
            return Err("number bounds and default must be finite".into());
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value)
            && min > max
        {
            return Err(format!("min_value {min} is greater than max_value {max}"));
        }
        if let Some(default) = self.default_value {
            if self.min_value.is_some_and(|min| default < min) {
                return Err(format!("default_value {default} is below min_value"));
            }
            if self.max_value.is_some_and(|max| default > max) {
                return Err(format!("default_value {default} is above max_value"));
            }
        }
        Ok(())
    }
}

impl From<NumberFieldProperties> for FieldProperties {
    fn from(p: NumberFieldProperties) -> Self {
        FieldProperties::Number(p)
    }
}

impl FieldPropertiesKind for NumberFieldProperties {
    const KIND: FieldKind = FieldKind::Number;
    const TYPE_NAME: &'static str = "Number";

    fn from_properties(properties: FieldProperties) -> Result<Self, FieldProperties> {
        match properties {
            FieldProperties::Number(p) => Ok(p),
            other => Err(other),
        }
    }
}

/// Settings of a text field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringFieldProperties {
    /// Display label shown to editors.
    pub label: Option<String>,
    /// Help text shown below the input.
    pub hints: Option<String>,
    /// Whether content must provide a value.
    pub required: bool,
    /// Minimum length in characters.
    pub min_length: Option<u32>,
    /// Maximum length in characters.
    pub max_length: Option<u32>,
    /// Text prefilled for new content. Must satisfy the length bounds.
    pub default_value: Option<String>,
}

impl StringFieldProperties {
    /// Check that the length bounds are consistent and admit the default.
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(min), Some(max)) = (self.min_length, self.max_length)
            && min > max
        {
            return Err(format!("min_length {min} is greater than max_length {max}"));
        }
        if let Some(default) = &self.default_value {
            let len = default.chars().count() as u64;
            if self.min_length.is_some_and(|min| len < u64::from(min)) {
                return Err("default_value is shorter than min_length".into());
            }
            if self.max_length.is_some_and(|max| len > u64::from(max)) {
                return Err("default_value is longer than max_length".into());
            }
        }
        Ok(())
    }
}

impl From<StringFieldProperties> for FieldProperties {
    fn from(p: StringFieldProperties) -> Self {
        FieldProperties::String(p)
    }
}

impl FieldPropertiesKind for StringFieldProperties {
    const KIND: FieldKind = FieldKind::String;
    const TYPE_NAME: &'static str = "String";

    fn from_properties(properties: FieldProperties) -> Result<Self, FieldProperties> {
        match properties {
            FieldProperties::String(p) => Ok(p),
            other => Err(other),
        }
    }
}

/// Settings of a yes/no field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BooleanFieldProperties {
    /// Display label shown to editors.
    pub label: Option<String>,
    /// Help text shown below the input.
    pub hints: Option<String>,
    /// Whether content must provide a value.
    pub required: bool,
    /// Value prefilled for new content.
    pub default_value: Option<bool>,
}

impl From<BooleanFieldProperties> for FieldProperties {
    fn from(p: BooleanFieldProperties) -> Self {
        FieldProperties::Boolean(p)
    }
}

impl FieldPropertiesKind for BooleanFieldProperties {
    const KIND: FieldKind = FieldKind::Boolean;
    const TYPE_NAME: &'static str = "Boolean";

    fn from_properties(properties: FieldProperties) -> Result<Self, FieldProperties> {
        match properties {
            FieldProperties::Boolean(p) => Ok(p),
            other => Err(other),
        }
    }
}

/// A field of a schema.
///
/// Fields are built through the [`FieldRegistry`](super::FieldRegistry)
/// when commands are validated, and rebuilt directly from event data when
/// history is replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    id: FieldId,
    name: String,
    properties: FieldProperties,
    hidden: bool,
    disabled: bool,
}

impl Field {
    /// A visible, enabled field.
    pub fn new(id: FieldId, name: impl Into<String>, properties: FieldProperties) -> Self {
        Self {
            id,
            name: name.into(),
            properties,
            hidden: false,
            disabled: false,
        }
    }

    /// The id assigned when the field was added.
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// The property name content refers to this field by.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind-specific settings.
    pub fn properties(&self) -> &FieldProperties {
        &self.properties
    }

    /// The kind tag of the properties. Fixed for the field's lifetime.
    pub fn kind(&self) -> FieldKind {
        self.properties.kind()
    }

    /// Whether the field is hidden from content editors.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Whether the field is read-only for content editors.
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub(crate) fn set_properties(&mut self, properties: FieldProperties) {
        self.properties = properties;
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub(crate) fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }
}
