use schemata_core::{FieldId, LookupId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CriterionKind, SecurityMode, TrackedAction};

/// Single change to one field of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "edit", rename_all = "snake_case")]
pub enum FieldEdit {
    /// Replaces the display name.
    SetDisplayName {
        /// New display name.
        display_name: String,
    },
    /// Replaces the field name.
    SetName {
        /// New field name.
        name: String,
    },
    /// Toggles the required flag.
    SetRequired {
        /// Whether instances must provide a value.
        required: bool,
    },
    /// Replaces the default value.
    SetDefaultValue {
        /// New default, `None` to clear it.
        value: Option<Value>,
    },
    /// Replaces the value of an existing setting.
    SetSettingValue {
        /// Setting name.
        name: String,
        /// New value.
        value: Value,
    },
    /// Updates a validation criterion, appending it when missing.
    SetCriterion {
        /// Criterion kind.
        kind: CriterionKind,
        /// Whether the criterion is enforced.
        enabled: bool,
        /// Criterion value.
        value: Value,
    },
    /// Appends an empty metadata entry.
    AddEmptyMetadata,
    /// Removes the metadata entry at a position.
    RemoveMetadata {
        /// Entry position.
        index: usize,
    },
    /// Replaces the metadata entry at a position.
    SetMetadata {
        /// Entry position.
        index: usize,
        /// New key.
        key: String,
        /// New value.
        value: String,
    },
}

/// Named, atomic draft mutation sent to the backend and mirrored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum DraftOperation {
    /// Appends a new field.
    CreateField {
        /// Field name.
        name: String,
        /// Display name.
        display_name: String,
        /// Fully qualified type class.
        type_class: String,
    },
    /// Removes a field and every reference to it.
    RemoveField {
        /// Field to remove.
        field_id: FieldId,
    },
    /// Edits one aspect of a field.
    EditField {
        /// Field to edit.
        field_id: FieldId,
        /// The change.
        edit: FieldEdit,
    },
    /// Appends a lookup.
    AddIndex {
        /// Lookup name.
        name: String,
    },
    /// Removes the lookup at a position.
    RemoveIndex {
        /// Lookup position.
        position: usize,
    },
    /// Renames the lookup at a position.
    RenameIndex {
        /// Lookup position.
        position: usize,
        /// New name.
        name: String,
    },
    /// Reorders lookups.
    MoveIndex {
        /// Current position.
        from: usize,
        /// Target position.
        to: usize,
    },
    /// Sets single-object-return semantics on a lookup.
    SetSingleObjectReturn {
        /// Lookup position.
        position: usize,
        /// New flag.
        value: bool,
    },
    /// Appends a field to a lookup.
    AddLookupField {
        /// Lookup position.
        position: usize,
        /// Field to add.
        field_id: FieldId,
    },
    /// Removes a field from a lookup.
    RemoveLookupField {
        /// Lookup position.
        position: usize,
        /// Field to remove.
        field_id: FieldId,
    },
    /// Swaps one lookup field for another in place.
    ReplaceLookupField {
        /// Lookup position.
        position: usize,
        /// Field currently used.
        old_field_id: FieldId,
        /// Replacement field.
        new_field_id: FieldId,
    },
    /// Replaces the ordered REST field list.
    SetRestFieldIds {
        /// Ordered field ids.
        field_ids: Vec<FieldId>,
    },
    /// Exposes a lookup over REST.
    AddRestLookup {
        /// Lookup to expose.
        lookup_id: LookupId,
    },
    /// Hides a lookup from REST.
    RemoveRestLookup {
        /// Lookup to hide.
        lookup_id: LookupId,
    },
    /// Replaces the ordered data browser column list.
    SetBrowsingDisplayedFields {
        /// Ordered field ids.
        field_ids: Vec<FieldId>,
    },
    /// Offers a field as data browser filter.
    AddFilterableField {
        /// Field id.
        field_id: FieldId,
    },
    /// Stops offering a field as data browser filter.
    RemoveFilterableField {
        /// Field id.
        field_id: FieldId,
    },
    /// Records history for a field.
    AddTrackedField {
        /// Field id.
        field_id: FieldId,
    },
    /// Stops recording history for a field.
    RemoveTrackedField {
        /// Field id.
        field_id: FieldId,
    },
    /// Records history for an instance action.
    AddTrackedAction {
        /// Action.
        action: TrackedAction,
    },
    /// Stops recording history for an instance action.
    RemoveTrackedAction {
        /// Action.
        action: TrackedAction,
    },
    /// Switches security mode, clearing member lists that no longer apply.
    ChangeSecurityMode {
        /// New mode.
        mode: SecurityMode,
    },
    /// Saves security mode together with its members.
    SaveSecurity {
        /// Mode.
        mode: SecurityMode,
        /// User names or role names, depending on the mode.
        members: Vec<String>,
    },
}

impl DraftOperation {
    /// Returns the wire name of the operation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateField { .. } => "create_field",
            Self::RemoveField { .. } => "remove_field",
            Self::EditField { .. } => "edit_field",
            Self::AddIndex { .. } => "add_index",
            Self::RemoveIndex { .. } => "remove_index",
            Self::RenameIndex { .. } => "rename_index",
            Self::MoveIndex { .. } => "move_index",
            Self::SetSingleObjectReturn { .. } => "set_single_object_return",
            Self::AddLookupField { .. } => "add_lookup_field",
            Self::RemoveLookupField { .. } => "remove_lookup_field",
            Self::ReplaceLookupField { .. } => "replace_lookup_field",
            Self::SetRestFieldIds { .. } => "set_rest_field_ids",
            Self::AddRestLookup { .. } => "add_rest_lookup",
            Self::RemoveRestLookup { .. } => "remove_rest_lookup",
            Self::SetBrowsingDisplayedFields { .. } => "set_browsing_displayed_fields",
            Self::AddFilterableField { .. } => "add_filterable_field",
            Self::RemoveFilterableField { .. } => "remove_filterable_field",
            Self::AddTrackedField { .. } => "add_tracked_field",
            Self::RemoveTrackedField { .. } => "remove_tracked_field",
            Self::AddTrackedAction { .. } => "add_tracked_action",
            Self::RemoveTrackedAction { .. } => "remove_tracked_action",
            Self::ChangeSecurityMode { .. } => "change_security_mode",
            Self::SaveSecurity { .. } => "save_security",
        }
    }
}

#[cfg(test)]
mod tests {
    use schemata_core::FieldId;
    use serde_json::json;

    use super::{DraftOperation, FieldEdit};
    use crate::CriterionKind;

    #[test]
    fn operations_serialize_with_snake_case_tag() {
        let operation = DraftOperation::EditField {
            field_id: FieldId::new(3),
            edit: FieldEdit::SetCriterion {
                kind: CriterionKind::MaxLength,
                enabled: true,
                value: json!("20"),
            },
        };

        let value = serde_json::to_value(&operation).unwrap_or_default();
        assert_eq!(
            value,
            json!({
                "operation": "edit_field",
                "field_id": 3,
                "edit": {"edit": "set_criterion", "kind": "maxLength", "enabled": true, "value": "20"}
            })
        );
        assert_eq!(operation.name(), "edit_field");
    }

    #[test]
    fn unit_field_edit_deserializes_from_tag_only() {
        let parsed: Result<DraftOperation, _> = serde_json::from_value(json!({
            "operation": "edit_field",
            "field_id": 1,
            "edit": {"edit": "add_empty_metadata"}
        }));
        assert!(matches!(
            parsed,
            Ok(DraftOperation::EditField {
                edit: FieldEdit::AddEmptyMetadata,
                ..
            })
        ));
    }
}
