//! Field, metadata and lookup checks that gate commit.
//!
//! Every check is a pure function over the draft snapshot. Failures never
//! block individual edits; they are collected by [`commit_issues`].

use std::fmt;

use schemata_core::{FieldId, LookupId};
use serde::{Deserialize, Serialize};

use crate::{
    CriterionKind, DraftSchema, FieldDefinition, FieldRegistry, FieldSetting, SettingOption,
    ValidationCriterion, has_value, numeric_value,
};

/// Error code reported for a single validation criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CriterionError {
    /// Enabled criterion without a value.
    RequiredField,
    /// Negative length bound.
    LengthMustBePositive,
    /// Lower bound exceeds the enabled upper bound.
    MinCannotBeBigger,
    /// Upper bound is below the enabled lower bound.
    MaxCannotBeSmaller,
}

impl CriterionError {
    /// Returns the stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RequiredField => "requiredField",
            Self::LengthMustBePositive => "lengthMustBePositive",
            Self::MinCannotBeBigger => "minCannotBeBigger",
            Self::MaxCannotBeSmaller => "maxCannotBeSmaller",
        }
    }
}

impl fmt::Display for CriterionError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.code())
    }
}

/// Reason a draft cannot be committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// Missing display name or name, or a name shared with another field.
    FieldBasic {
        /// Failing field.
        field_id: FieldId,
        /// Field name at the time of the check.
        name: String,
    },
    /// A setting violates one of its declared constraints.
    FieldSetting {
        /// Failing field.
        field_id: FieldId,
        /// Setting name.
        setting: String,
    },
    /// A validation criterion is inconsistent.
    FieldCriterion {
        /// Failing field.
        field_id: FieldId,
        /// Criterion kind.
        kind: CriterionKind,
        /// Reported error.
        error: CriterionError,
    },
    /// Two metadata entries of a field share a key.
    DuplicateMetadataKey {
        /// Failing field.
        field_id: FieldId,
        /// Repeated key.
        key: String,
    },
    /// A lookup has no name.
    EmptyIndexName {
        /// Lookup id.
        lookup_id: LookupId,
    },
    /// More than one lookup carries this exact name.
    DuplicateIndexName {
        /// Repeated name.
        name: String,
    },
    /// The last lookup name validation left the conflict flag set.
    IndexNameConflict,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldBasic { field_id, name } => {
                write!(formatter, "field {field_id} ('{name}') has invalid basic info")
            }
            Self::FieldSetting { field_id, setting } => {
                write!(formatter, "field {field_id} setting '{setting}' is invalid")
            }
            Self::FieldCriterion {
                field_id,
                kind,
                error,
            } => write!(
                formatter,
                "field {field_id} criterion '{}': {error}",
                kind.as_str()
            ),
            Self::DuplicateMetadataKey { field_id, key } => {
                write!(formatter, "field {field_id} repeats metadata key '{key}'")
            }
            Self::EmptyIndexName { lookup_id } => {
                write!(formatter, "lookup {lookup_id} has no name")
            }
            Self::DuplicateIndexName { name } => {
                write!(formatter, "lookup name '{name}' is used more than once")
            }
            Self::IndexNameConflict => formatter.write_str("lookup name conflict is unresolved"),
        }
    }
}

/// Returns whether display name and name are present and exactly one field
/// in `fields` carries the name.
#[must_use]
pub fn validate_field_basic(field: &FieldDefinition, fields: &FieldRegistry) -> bool {
    let basic = field.basic();
    !basic.display_name().trim().is_empty()
        && !basic.name().trim().is_empty()
        && fields.is_unique_name(basic.name())
}

/// Returns whether a setting satisfies every constraint it declares.
#[must_use]
pub fn validate_setting(setting: &FieldSetting) -> bool {
    setting.options().iter().all(|option| match option {
        SettingOption::Require => has_value(setting.value()),
        SettingOption::Positive => {
            !has_value(setting.value())
                || numeric_value(setting.value()).is_some_and(|number| number >= 0.0)
        }
        SettingOption::Other => true,
    })
}

/// Returns whether every setting of the field is valid.
#[must_use]
pub fn validate_field_settings(field: &FieldDefinition) -> bool {
    field.settings().iter().all(validate_setting)
}

/// Checks one criterion against its own value and its min/max counterpart.
#[must_use]
pub fn validate_criterion(
    field: &FieldDefinition,
    criterion: &ValidationCriterion,
) -> Option<CriterionError> {
    if !criterion.is_enabled() {
        return None;
    }
    if !has_value(criterion.value()) {
        return Some(CriterionError::RequiredField);
    }

    let kind = criterion.kind();
    let own = numeric_value(criterion.value());
    if kind.is_length_bound() && own.is_some_and(|value| value < 0.0) {
        return Some(CriterionError::LengthMustBePositive);
    }

    let counterpart = kind
        .counterpart()
        .and_then(|counterpart| field.find_criterion(counterpart))
        .filter(|other| other.is_enabled() && has_value(other.value()))
        .and_then(|other| numeric_value(other.value()));

    match (own, counterpart) {
        (Some(own), Some(other)) if kind.is_lower_bound() && own > other => {
            Some(CriterionError::MinCannotBeBigger)
        }
        (Some(own), Some(other)) if !kind.is_lower_bound() && own < other => {
            Some(CriterionError::MaxCannotBeSmaller)
        }
        _ => None,
    }
}

/// Returns whether every criterion of the field is consistent.
#[must_use]
pub fn validate_field_validation(field: &FieldDefinition) -> bool {
    field
        .validation()
        .iter()
        .all(|criterion| validate_criterion(field, criterion).is_none())
}

/// Runs the basic, settings and criteria checks.
#[must_use]
pub fn validate_field(field: &FieldDefinition, fields: &FieldRegistry) -> bool {
    validate_field_basic(field, fields)
        && validate_field_settings(field)
        && validate_field_validation(field)
}

/// Returns whether at most one metadata entry of the field uses `key`.
#[must_use]
pub fn unique_metadata_key(field: &FieldDefinition, key: &str) -> bool {
    field
        .metadata()
        .iter()
        .filter(|entry| entry.key() == key)
        .count()
        <= 1
}

/// Collects every reason the draft cannot be committed.
#[must_use]
pub fn commit_issues(schema: &DraftSchema) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let fields = schema.fields();

    for field in fields.fields() {
        if !validate_field_basic(field, fields) {
            issues.push(ValidationIssue::FieldBasic {
                field_id: field.id(),
                name: field.basic().name().to_owned(),
            });
        }

        for setting in field.settings() {
            if !validate_setting(setting) {
                issues.push(ValidationIssue::FieldSetting {
                    field_id: field.id(),
                    setting: setting.name().to_owned(),
                });
            }
        }

        for criterion in field.validation() {
            if let Some(error) = validate_criterion(field, criterion) {
                issues.push(ValidationIssue::FieldCriterion {
                    field_id: field.id(),
                    kind: criterion.kind(),
                    error,
                });
            }
        }

        let mut reported: Vec<&str> = Vec::new();
        for entry in field.metadata() {
            if !unique_metadata_key(field, entry.key()) && !reported.contains(&entry.key()) {
                reported.push(entry.key());
                issues.push(ValidationIssue::DuplicateMetadataKey {
                    field_id: field.id(),
                    key: entry.key().to_owned(),
                });
            }
        }
    }

    let indexes = schema.indexes();
    for lookup in indexes.lookups() {
        if lookup.name().trim().is_empty() {
            issues.push(ValidationIssue::EmptyIndexName {
                lookup_id: lookup.id(),
            });
        }
    }
    for name in indexes.duplicate_names() {
        issues.push(ValidationIssue::DuplicateIndexName { name });
    }
    if indexes.has_name_conflict() {
        issues.push(ValidationIssue::IndexNameConflict);
    }

    issues
}

/// Returns whether the draft passes every commit check.
#[must_use]
pub fn can_commit(schema: &DraftSchema) -> bool {
    commit_issues(schema).is_empty()
}

/// Joins issues into one human readable message.
#[must_use]
pub fn issues_message(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
