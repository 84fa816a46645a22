//! Entity schema draft model, registries and validation rules.

#![forbid(unsafe_code)]

mod advanced;
mod entity;
mod field;
mod field_registry;
mod lookup;
mod operation;
mod schema;
mod security;
pub mod validation;

pub use advanced::{AdvancedSettings, BrowsingSettings, RestOptions, TrackedAction, TrackingSettings};
pub use entity::{DraftState, EntityDraft};
pub use field::{
    CriterionKind, FieldBasic, FieldDefinition, FieldSetting, MetadataEntry, SettingOption,
    ValidationCriterion, has_value, numeric_value,
};
pub use field_registry::FieldRegistry;
pub use lookup::{LookupDefinition, LookupRegistry};
pub use operation::{DraftOperation, FieldEdit};
pub use schema::DraftSchema;
pub use security::{SecurityMode, SecuritySettings};
pub use validation::{CriterionError, ValidationIssue, can_commit, commit_issues};
