use schemata_core::{AppError, AppResult, FieldId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Basic information shown on the field "Basic" tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBasic {
    name: String,
    display_name: String,
    type_class: String,
    required: bool,
    default_value: Option<Value>,
}

impl FieldBasic {
    /// Creates basic field information. Blank names are accepted here and
    /// reported by validation instead.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        type_class: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            type_class: type_class.into(),
            required: false,
            default_value: None,
        }
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the fully qualified type class.
    #[must_use]
    pub fn type_class(&self) -> &str {
        self.type_class.as_str()
    }

    /// Returns whether instances must provide a value.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the default value.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }
}

/// Constraint flag declared on a field setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettingOption {
    /// The setting must carry a value.
    Require,
    /// The setting must carry a non-negative number.
    Positive,
    /// Flag not understood by this editor. Ignored by validation.
    #[serde(other)]
    Other,
}

/// Named field setting such as precision, scale or combobox values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSetting {
    name: String,
    value: Value,
    options: Vec<SettingOption>,
}

impl FieldSetting {
    /// Creates a field setting.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value, options: Vec<SettingOption>) -> Self {
        Self {
            name: name.into(),
            value,
            options,
        }
    }

    /// Returns the setting name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the setting value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns declared constraint flags.
    #[must_use]
    pub fn options(&self) -> &[SettingOption] {
        &self.options
    }
}

/// Kind discriminator for a validation criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CriterionKind {
    /// Minimum text length.
    MinLength,
    /// Maximum text length.
    MaxLength,
    /// Minimum numeric value.
    MinValue,
    /// Maximum numeric value.
    MaxValue,
    /// Regular expression the value must match.
    Regex,
}

impl CriterionKind {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::MinValue => "minValue",
            Self::MaxValue => "maxValue",
            Self::Regex => "regex",
        }
    }

    /// Returns the opposite bound of a min/max pair.
    #[must_use]
    pub fn counterpart(&self) -> Option<Self> {
        match self {
            Self::MinLength => Some(Self::MaxLength),
            Self::MaxLength => Some(Self::MinLength),
            Self::MinValue => Some(Self::MaxValue),
            Self::MaxValue => Some(Self::MinValue),
            Self::Regex => None,
        }
    }

    /// Returns whether the criterion bounds a text length.
    #[must_use]
    pub fn is_length_bound(&self) -> bool {
        matches!(self, Self::MinLength | Self::MaxLength)
    }

    /// Returns whether the criterion is the lower bound of its pair.
    #[must_use]
    pub fn is_lower_bound(&self) -> bool {
        matches!(self, Self::MinLength | Self::MinValue)
    }
}

/// Validation rule attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCriterion {
    kind: CriterionKind,
    enabled: bool,
    value: Value,
}

impl ValidationCriterion {
    /// Creates a validation criterion.
    #[must_use]
    pub fn new(kind: CriterionKind, enabled: bool, value: Value) -> Self {
        Self {
            kind,
            enabled,
            value,
        }
    }

    /// Returns the criterion kind.
    #[must_use]
    pub fn kind(&self) -> CriterionKind {
        self.kind
    }

    /// Returns whether the criterion is enforced.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the criterion value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Free-form key/value metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    key: String,
    value: String,
}

impl MetadataEntry {
    /// Creates a metadata entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns the metadata key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key.as_str()
    }

    /// Returns the metadata value.
    #[must_use]
    pub fn value(&self) -> &str {
        self.value.as_str()
    }
}

/// Draft definition of a single entity field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    id: FieldId,
    basic: FieldBasic,
    #[serde(default)]
    settings: Vec<FieldSetting>,
    #[serde(default)]
    validation: Vec<ValidationCriterion>,
    #[serde(default)]
    metadata: Vec<MetadataEntry>,
}

impl FieldDefinition {
    /// Creates a field with no settings, criteria or metadata.
    #[must_use]
    pub fn new(
        id: FieldId,
        name: impl Into<String>,
        display_name: impl Into<String>,
        type_class: impl Into<String>,
    ) -> Self {
        Self {
            id,
            basic: FieldBasic::new(name, display_name, type_class),
            settings: Vec::new(),
            validation: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Adds a setting.
    #[must_use]
    pub fn with_setting(mut self, setting: FieldSetting) -> Self {
        self.settings.push(setting);
        self
    }

    /// Adds a validation criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: ValidationCriterion) -> Self {
        self.validation.push(criterion);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, entry: MetadataEntry) -> Self {
        self.metadata.push(entry);
        self
    }

    /// Returns the field identifier.
    #[must_use]
    pub fn id(&self) -> FieldId {
        self.id
    }

    /// Returns basic field information.
    #[must_use]
    pub fn basic(&self) -> &FieldBasic {
        &self.basic
    }

    /// Returns field settings in declaration order.
    #[must_use]
    pub fn settings(&self) -> &[FieldSetting] {
        &self.settings
    }

    /// Returns validation criteria in declaration order.
    #[must_use]
    pub fn validation(&self) -> &[ValidationCriterion] {
        &self.validation
    }

    /// Returns metadata entries in declaration order.
    #[must_use]
    pub fn metadata(&self) -> &[MetadataEntry] {
        &self.metadata
    }

    /// Finds a setting by name.
    #[must_use]
    pub fn find_setting(&self, name: &str) -> Option<&FieldSetting> {
        self.settings.iter().find(|setting| setting.name == name)
    }

    /// Finds a validation criterion by kind.
    #[must_use]
    pub fn find_criterion(&self, kind: CriterionKind) -> Option<&ValidationCriterion> {
        self.validation
            .iter()
            .find(|criterion| criterion.kind == kind)
    }

    pub(crate) fn set_display_name(&mut self, display_name: String) {
        self.basic.display_name = display_name;
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.basic.name = name;
    }

    pub(crate) fn set_required(&mut self, required: bool) {
        self.basic.required = required;
    }

    pub(crate) fn set_default_value(&mut self, value: Option<Value>) {
        self.basic.default_value = value;
    }

    pub(crate) fn set_setting_value(&mut self, name: &str, value: Value) -> AppResult<()> {
        let setting = self
            .settings
            .iter_mut()
            .find(|setting| setting.name == name)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "field '{}' has no setting '{name}'",
                    self.basic.name
                ))
            })?;
        setting.value = value;
        Ok(())
    }

    pub(crate) fn set_criterion(&mut self, kind: CriterionKind, enabled: bool, value: Value) {
        match self
            .validation
            .iter_mut()
            .find(|criterion| criterion.kind == kind)
        {
            Some(criterion) => {
                criterion.enabled = enabled;
                criterion.value = value;
            }
            None => self
                .validation
                .push(ValidationCriterion::new(kind, enabled, value)),
        }
    }

    pub(crate) fn add_empty_metadata(&mut self) {
        self.metadata.push(MetadataEntry::new("", ""));
    }

    pub(crate) fn set_metadata(&mut self, index: usize, key: String, value: String) -> AppResult<()> {
        let field_name = self.basic.name.clone();
        let entry = self.metadata.get_mut(index).ok_or_else(|| {
            AppError::Validation(format!(
                "field '{field_name}' has no metadata entry at position {index}"
            ))
        })?;
        entry.key = key;
        entry.value = value;
        Ok(())
    }

    pub(crate) fn remove_metadata(&mut self, index: usize) -> AppResult<()> {
        if index >= self.metadata.len() {
            return Err(AppError::Validation(format!(
                "field '{}' has no metadata entry at position {index}",
                self.basic.name
            )));
        }
        self.metadata.remove(index);
        Ok(())
    }
}

/// Returns whether a JSON value counts as present: not null, and non-empty
/// when it is a string or an array.
#[must_use]
pub fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Reads a JSON number or a numeric string as `f64`.
#[must_use]
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}
