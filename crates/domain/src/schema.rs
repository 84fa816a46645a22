use std::collections::BTreeSet;

use schemata_core::{AppError, AppResult, FieldId, LookupId};
use serde::{Deserialize, Serialize};

use crate::{
    AdvancedSettings, DraftOperation, DraftState, EntityDraft, FieldDefinition, FieldEdit,
    FieldRegistry, LookupRegistry,
};

/// Full editable view of one entity: header, fields and advanced settings.
///
/// Every [`DraftOperation`] maps to a pure transformation of this value, so
/// the backend and the editing session mirror compute identical results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSchema {
    entity: EntityDraft,
    fields: FieldRegistry,
    advanced: AdvancedSettings,
}

impl DraftSchema {
    /// Creates a schema snapshot.
    #[must_use]
    pub fn new(entity: EntityDraft, fields: FieldRegistry, advanced: AdvancedSettings) -> Self {
        Self {
            entity,
            fields,
            advanced,
        }
    }

    /// Returns the entity header.
    #[must_use]
    pub fn entity(&self) -> &EntityDraft {
        &self.entity
    }

    /// Returns the field registry.
    #[must_use]
    pub fn fields(&self) -> &FieldRegistry {
        &self.fields
    }

    /// Returns advanced settings.
    #[must_use]
    pub fn advanced(&self) -> &AdvancedSettings {
        &self.advanced
    }

    /// Returns the lookup registry.
    #[must_use]
    pub fn indexes(&self) -> &LookupRegistry {
        self.advanced.indexes()
    }

    /// Returns the lookup registry for name validation.
    pub fn indexes_mut(&mut self) -> &mut LookupRegistry {
        self.advanced.indexes_mut()
    }

    /// Splits the snapshot into its parts.
    #[must_use]
    pub fn into_parts(self) -> (EntityDraft, FieldRegistry, AdvancedSettings) {
        (self.entity, self.fields, self.advanced)
    }

    /// Copies backend draft flags onto the entity header.
    pub fn apply_state(&mut self, state: DraftState) {
        self.entity.apply_state(state);
    }

    /// Returns fields the lookup at `position` does not use yet, in field order.
    pub fn available_lookup_fields(&self, position: usize) -> AppResult<Vec<FieldId>> {
        self.advanced
            .indexes()
            .available_fields(position, &self.fields.ids())
    }

    /// Returns fields not shown in the data browser, ordered by display name.
    #[must_use]
    pub fn hidden_browsing_fields(&self) -> Vec<&FieldDefinition> {
        let displayed = self.advanced.browsing().displayed_fields();
        let mut hidden: Vec<&FieldDefinition> = self
            .fields
            .fields()
            .iter()
            .filter(|field| !displayed.contains(&field.id()))
            .collect();
        hidden.sort_by(|left, right| {
            left.basic()
                .display_name()
                .cmp(right.basic().display_name())
        });
        hidden
    }

    /// Returns a copy of this snapshot with `operation` applied. The
    /// snapshot itself is left untouched, including on error.
    pub fn transformed(&self, operation: &DraftOperation) -> AppResult<Self> {
        let mut next = self.clone();
        next.apply(operation)?;
        Ok(next)
    }

    /// Applies `operation` in place. On error the snapshot may be partially
    /// modified; use [`DraftSchema::transformed`] when that matters.
    pub fn apply(&mut self, operation: &DraftOperation) -> AppResult<()> {
        match operation {
            DraftOperation::CreateField {
                name,
                display_name,
                type_class,
            } => {
                let field_id = self.fields.next_id();
                self.fields.add(FieldDefinition::new(
                    field_id,
                    name.as_str(),
                    display_name.as_str(),
                    type_class.as_str(),
                ))?;
                self.advanced.browsing_mut().push_displayed(field_id);
            }
            DraftOperation::RemoveField { field_id } => {
                self.require_field(*field_id)?;
                self.fields.remove(*field_id)?;
                self.advanced.purge_field(*field_id);
            }
            DraftOperation::EditField { field_id, edit } => {
                self.require_field(*field_id)?;
                apply_field_edit(self.fields.find_by_id_mut(*field_id)?, edit)?;
            }
            DraftOperation::AddIndex { name } => {
                self.advanced.indexes_mut().add_index(name.as_str());
            }
            DraftOperation::RemoveIndex { position } => {
                let removed = self.advanced.indexes_mut().remove_index(*position)?;
                self.advanced.rest_mut().remove_lookup(removed.id());
            }
            DraftOperation::RenameIndex { position, name } => {
                self.advanced
                    .indexes_mut()
                    .rename_index(*position, name.as_str())?;
            }
            DraftOperation::MoveIndex { from, to } => {
                self.advanced.indexes_mut().move_index(*from, *to)?;
            }
            DraftOperation::SetSingleObjectReturn { position, value } => {
                self.advanced
                    .indexes_mut()
                    .set_single_object_return(*position, *value)?;
            }
            DraftOperation::AddLookupField { position, field_id } => {
                self.require_field(*field_id)?;
                self.advanced
                    .indexes_mut()
                    .add_lookup_field(*position, *field_id)?;
            }
            DraftOperation::RemoveLookupField { position, field_id } => {
                self.advanced
                    .indexes_mut()
                    .remove_lookup_field(*position, *field_id)?;
            }
            DraftOperation::ReplaceLookupField {
                position,
                old_field_id,
                new_field_id,
            } => {
                self.require_field(*new_field_id)?;
                self.advanced.indexes_mut().replace_lookup_field(
                    *position,
                    *old_field_id,
                    *new_field_id,
                )?;
            }
            DraftOperation::SetRestFieldIds { field_ids } => {
                self.require_field_list(field_ids)?;
                self.advanced.rest_mut().set_field_ids(field_ids.clone());
            }
            DraftOperation::AddRestLookup { lookup_id } => {
                self.require_lookup(*lookup_id)?;
                self.advanced.rest_mut().add_lookup(*lookup_id);
            }
            DraftOperation::RemoveRestLookup { lookup_id } => {
                self.advanced.rest_mut().remove_lookup(*lookup_id);
            }
            DraftOperation::SetBrowsingDisplayedFields { field_ids } => {
                self.require_field_list(field_ids)?;
                self.advanced
                    .browsing_mut()
                    .set_displayed_fields(field_ids.clone());
            }
            DraftOperation::AddFilterableField { field_id } => {
                self.require_field(*field_id)?;
                self.advanced.browsing_mut().add_filterable(*field_id);
            }
            DraftOperation::RemoveFilterableField { field_id } => {
                self.advanced.browsing_mut().remove_filterable(*field_id);
            }
            DraftOperation::AddTrackedField { field_id } => {
                self.require_field(*field_id)?;
                self.advanced.tracking_mut().add_field(*field_id);
            }
            DraftOperation::RemoveTrackedField { field_id } => {
                self.advanced.tracking_mut().remove_field(*field_id);
            }
            DraftOperation::AddTrackedAction { action } => {
                self.advanced.tracking_mut().add_action(*action);
            }
            DraftOperation::RemoveTrackedAction { action } => {
                self.advanced.tracking_mut().remove_action(*action);
            }
            DraftOperation::ChangeSecurityMode { mode } => {
                self.entity.security_mut().change_mode(*mode);
            }
            DraftOperation::SaveSecurity { mode, members } => {
                self.entity.security_mut().save(*mode, members.clone())?;
            }
        }

        Ok(())
    }

    fn require_field(&self, field_id: FieldId) -> AppResult<()> {
        if self.fields.find_by_id(field_id).is_none() {
            return Err(AppError::Validation(format!(
                "unknown field id {field_id}"
            )));
        }
        Ok(())
    }

    fn require_field_list(&self, field_ids: &[FieldId]) -> AppResult<()> {
        let mut seen = BTreeSet::new();
        for field_id in field_ids {
            self.require_field(*field_id)?;
            if !seen.insert(*field_id) {
                return Err(AppError::Validation(format!(
                    "field id {field_id} is listed more than once"
                )));
            }
        }
        Ok(())
    }

    fn require_lookup(&self, lookup_id: LookupId) -> AppResult<()> {
        let known = self
            .advanced
            .indexes()
            .lookups()
            .iter()
            .any(|lookup| lookup.id() == lookup_id);
        if !known {
            return Err(AppError::Validation(format!(
                "unknown lookup id {lookup_id}"
            )));
        }
        Ok(())
    }
}

fn apply_field_edit(field: &mut FieldDefinition, edit: &FieldEdit) -> AppResult<()> {
    match edit {
        FieldEdit::SetDisplayName { display_name } => field.set_display_name(display_name.clone()),
        FieldEdit::SetName { name } => field.set_name(name.clone()),
        FieldEdit::SetRequired { required } => field.set_required(*required),
        FieldEdit::SetDefaultValue { value } => field.set_default_value(value.clone()),
        FieldEdit::SetSettingValue { name, value } => {
            field.set_setting_value(name, value.clone())?;
        }
        FieldEdit::SetCriterion {
            kind,
            enabled,
            value,
        } => field.set_criterion(*kind, *enabled, value.clone()),
        FieldEdit::AddEmptyMetadata => field.add_empty_metadata(),
        FieldEdit::RemoveMetadata { index } => field.remove_metadata(*index)?,
        FieldEdit::SetMetadata { index, key, value } => {
            field.set_metadata(*index, key.clone(), value.clone())?;
        }
    }
    Ok(())
}
