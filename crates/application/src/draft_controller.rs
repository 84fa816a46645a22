use std::sync::Arc;

use schemata_core::{AppError, AppResult, EditorIdentity, EntityId, FieldId, LookupId};
use schemata_domain::{
    DraftOperation, DraftSchema, DraftState, EntityDraft, FieldEdit, FieldRegistry, SecurityMode,
    TrackedAction, validation,
};
use tracing::{info, warn};

use crate::{DraftBackend, EditingSession};

/// Sequences schema edits into draft operations against the backend and
/// keeps the session mirror in step with acknowledged changes.
pub struct DraftController {
    backend: Arc<dyn DraftBackend>,
    session: EditingSession,
}

impl DraftController {
    /// Creates a controller with an empty session for `owner`.
    #[must_use]
    pub fn new(backend: Arc<dyn DraftBackend>, owner: EditorIdentity) -> Self {
        Self {
            backend,
            session: EditingSession::new(owner),
        }
    }

    /// Returns the editing session.
    #[must_use]
    pub fn session(&self) -> &EditingSession {
        &self.session
    }

    /// Returns the mirror of the selected entity.
    #[must_use]
    pub fn schema(&self) -> Option<&DraftSchema> {
        self.session.mirror()
    }

    /// Loads an entity and makes it the edited one.
    pub async fn select_entity(&mut self, entity_id: EntityId) -> AppResult<()> {
        let schema = self.load_schema(entity_id).await?;

        self.session.clear();
        self.install_loaded(schema);
        self.refresh_work_in_progress().await?;

        info!(
            entity_id = %entity_id,
            session_id = %self.session.session_id(),
            editor = %self.session.owner().display_name(),
            "entity selected"
        );
        Ok(())
    }

    /// Drops the mirror and selection.
    pub fn unselect_entity(&mut self) {
        self.session.clear();
    }

    /// Sends one draft operation and mirrors it locally once acknowledged.
    pub async fn apply_edit(&mut self, operation: DraftOperation) -> AppResult<DraftState> {
        let schema = self.require_schema()?;
        let entity_id = schema.entity().id();

        if schema.entity().is_read_only() {
            return Err(AppError::Validation(format!(
                "entity {entity_id} is provided by a module and cannot be edited"
            )));
        }
        if schema.entity().is_outdated() {
            warn!(
                entity_id = %entity_id,
                operation = operation.name(),
                "edit refused on outdated draft"
            );
            return Err(AppError::StaleDraft(format!(
                "draft for entity {entity_id} was changed by another commit; refresh it first"
            )));
        }

        let had_draft = schema.entity().is_modified();
        let mut next = schema.transformed(&operation)?;
        let state = match self
            .backend
            .apply_draft_operation(entity_id, self.owner(), &operation)
            .await
        {
            Ok(state) => state,
            Err(error) => {
                warn!(
                    entity_id = %entity_id,
                    operation = operation.name(),
                    error = %error,
                    "draft operation rejected"
                );
                if let (AppError::StaleDraft(_), Some(schema)) =
                    (&error, self.session.mirror_mut())
                {
                    let modified = schema.entity().is_modified();
                    schema.apply_state(DraftState {
                        modified,
                        outdated: true,
                    });
                }
                return Err(error);
            }
        };

        // The first edit branches a draft from the latest commit, which can
        // be newer than the snapshot the mirror was loaded from.
        if !had_draft && state.modified {
            let mut branched = self.load_schema(entity_id).await?;
            if next.indexes().has_name_conflict() {
                flag_duplicate_names(&mut branched);
            }
            next = branched;
            info!(entity_id = %entity_id, "draft branched, mirror reloaded");
        }

        next.apply_state(state);
        self.session.replace_mirror(next);
        Ok(state)
    }

    /// Persists the draft after local validation passes.
    pub async fn commit(&mut self) -> AppResult<()> {
        let schema = self.require_schema()?;
        let entity_id = schema.entity().id();

        let issues = validation::commit_issues(schema);
        if !issues.is_empty() {
            return Err(AppError::Validation(validation::issues_message(&issues)));
        }
        if schema.entity().is_outdated() {
            return Err(AppError::CommitConflict(format!(
                "draft for entity {entity_id} is outdated"
            )));
        }

        if let Err(error) = self.backend.commit(entity_id, self.owner()).await {
            warn!(entity_id = %entity_id, error = %error, "commit failed");
            return Err(error);
        }

        self.reload_clean(entity_id).await?;
        info!(entity_id = %entity_id, "draft committed");
        Ok(())
    }

    /// Discards uncommitted edits and reloads the committed schema.
    pub async fn abandon(&mut self) -> AppResult<()> {
        let entity_id = self.require_schema()?.entity().id();
        self.backend.abandon(entity_id, self.owner()).await?;
        self.reload_clean(entity_id).await?;

        info!(entity_id = %entity_id, "draft abandoned");
        Ok(())
    }

    /// Rebases an outdated draft and reloads the mirror. Returns whether a
    /// reload happened.
    pub async fn refresh_if_outdated(&mut self) -> AppResult<bool> {
        let schema = self.require_schema()?;
        if !schema.entity().is_outdated() {
            return Ok(false);
        }

        let entity_id = schema.entity().id();
        let entity = self.backend.update_draft(entity_id, self.owner()).await?;
        let schema = self.assemble_schema(entity).await?;
        self.install_loaded(schema);

        info!(entity_id = %entity_id, "outdated draft rebased");
        Ok(true)
    }

    /// Reads current draft flags from the backend into the mirror.
    pub async fn poll_draft_state(&mut self) -> AppResult<DraftState> {
        let entity_id = self.require_schema()?.entity().id();
        let state = self.backend.draft_state(entity_id, self.owner()).await?;

        if let Some(schema) = self.session.mirror_mut() {
            if state.outdated && !schema.entity().is_outdated() {
                warn!(entity_id = %entity_id, "draft became outdated");
            }
            schema.apply_state(state);
        }
        Ok(state)
    }

    /// Creates a field after checking inputs and name uniqueness.
    pub async fn create_field(
        &mut self,
        name: &str,
        display_name: &str,
        type_class: &str,
    ) -> AppResult<FieldId> {
        let name = name.trim();
        let display_name = display_name.trim();
        let type_class = type_class.trim();
        if name.is_empty() || display_name.is_empty() || type_class.is_empty() {
            return Err(AppError::Validation(
                "field name, display name and type are required".to_owned(),
            ));
        }
        if !self.require_schema()?.fields().find_by_name(name).is_empty() {
            return Err(AppError::Validation(format!(
                "field name '{name}' is already in use"
            )));
        }

        self.apply_edit(DraftOperation::CreateField {
            name: name.to_owned(),
            display_name: display_name.to_owned(),
            type_class: type_class.to_owned(),
        })
        .await?;

        self.require_schema()?
            .fields()
            .find_by_name(name)
            .first()
            .map(|field| field.id())
            .ok_or_else(|| AppError::Internal(format!("created field '{name}' is missing")))
    }

    /// Adds a lookup with a generated name and makes it active.
    pub async fn add_index(&mut self) -> AppResult<usize> {
        let name = self.require_schema()?.indexes().default_name();
        self.apply_edit(DraftOperation::AddIndex { name }).await?;

        let position = self.require_schema()?.indexes().len().saturating_sub(1);
        self.activate(Some(position));
        Ok(position)
    }

    /// Removes the active lookup.
    pub async fn delete_active_index(&mut self) -> AppResult<()> {
        let position = self.active_position()?;
        self.apply_edit(DraftOperation::RemoveIndex { position })
            .await?;
        self.activate(None);
        self.recheck_lookup_names();
        Ok(())
    }

    /// Adds the first available field to the active lookup.
    pub async fn add_lookup_field(&mut self) -> AppResult<FieldId> {
        let position = self.active_position()?;
        let field_id = self
            .session
            .selection()
            .available_fields()
            .first()
            .copied()
            .ok_or_else(|| {
                AppError::Validation("every field is already part of the lookup".to_owned())
            })?;

        self.apply_edit(DraftOperation::AddLookupField { position, field_id })
            .await?;
        Ok(field_id)
    }

    /// Swaps a field of the active lookup for another one.
    pub async fn select_lookup_field(
        &mut self,
        old_field_id: FieldId,
        new_field_id: FieldId,
    ) -> AppResult<()> {
        let position = self.active_position()?;
        self.apply_edit(DraftOperation::ReplaceLookupField {
            position,
            old_field_id,
            new_field_id,
        })
        .await?;
        Ok(())
    }

    /// Removes a field from the active lookup.
    pub async fn remove_lookup_field(&mut self, field_id: FieldId) -> AppResult<()> {
        let position = self.active_position()?;
        self.apply_edit(DraftOperation::RemoveLookupField { position, field_id })
            .await?;
        Ok(())
    }

    /// Renames a lookup and re-runs duplicate name detection for the new name.
    pub async fn rename_index(&mut self, position: usize, name: &str) -> AppResult<()> {
        self.apply_edit(DraftOperation::RenameIndex {
            position,
            name: name.to_owned(),
        })
        .await?;

        let conflict = self
            .session
            .mirror_mut()
            .is_some_and(|schema| schema.indexes_mut().validate_lookup_name(name));
        if conflict {
            warn!(lookup = %name, "lookup name is used more than once");
            self.activate(Some(position));
        }
        Ok(())
    }

    /// Makes another lookup active. Refused while a name conflict is open.
    pub fn set_active_index(&mut self, position: usize) -> AppResult<()> {
        let indexes = self.require_schema()?.indexes();
        if indexes.has_name_conflict() {
            return Err(AppError::Validation(
                "resolve the duplicate lookup name before switching lookups".to_owned(),
            ));
        }
        if position >= indexes.len() {
            return Err(AppError::Validation(format!(
                "lookup position {position} is out of range"
            )));
        }

        self.activate(Some(position));
        Ok(())
    }

    /// Returns fields the active lookup can still use.
    #[must_use]
    pub fn available_fields(&self) -> &[FieldId] {
        self.session.selection().available_fields()
    }

    /// Returns whether a field can be added to the active lookup.
    #[must_use]
    pub fn can_add_lookup_fields(&self) -> bool {
        self.session.selection().active_index().is_some() && !self.available_fields().is_empty()
    }

    /// Flips history tracking for a field. Returns the new state.
    pub async fn toggle_tracked_field(&mut self, field_id: FieldId) -> AppResult<bool> {
        let tracked = self
            .require_schema()?
            .advanced()
            .tracking()
            .fields()
            .contains(&field_id);
        let operation = if tracked {
            DraftOperation::RemoveTrackedField { field_id }
        } else {
            DraftOperation::AddTrackedField { field_id }
        };

        self.apply_edit(operation).await?;
        Ok(!tracked)
    }

    /// Flips history tracking for an instance action. Returns the new state.
    pub async fn toggle_tracked_action(&mut self, action: TrackedAction) -> AppResult<bool> {
        let tracked = self
            .require_schema()?
            .advanced()
            .tracking()
            .actions()
            .contains(&action);
        let operation = if tracked {
            DraftOperation::RemoveTrackedAction { action }
        } else {
            DraftOperation::AddTrackedAction { action }
        };

        self.apply_edit(operation).await?;
        Ok(!tracked)
    }

    /// Exposes or hides a lookup over REST.
    pub async fn set_rest_lookup_enabled(
        &mut self,
        lookup_id: LookupId,
        enabled: bool,
    ) -> AppResult<()> {
        let operation = if enabled {
            DraftOperation::AddRestLookup { lookup_id }
        } else {
            DraftOperation::RemoveRestLookup { lookup_id }
        };
        self.apply_edit(operation).await?;
        Ok(())
    }

    /// Offers or withdraws a field as data browser filter.
    pub async fn set_filterable(&mut self, field_id: FieldId, filterable: bool) -> AppResult<()> {
        let operation = if filterable {
            DraftOperation::AddFilterableField { field_id }
        } else {
            DraftOperation::RemoveFilterableField { field_id }
        };
        self.apply_edit(operation).await?;
        Ok(())
    }

    /// Appends an empty metadata entry to a field.
    pub async fn add_metadata(&mut self, field_id: FieldId) -> AppResult<()> {
        self.apply_edit(DraftOperation::EditField {
            field_id,
            edit: FieldEdit::AddEmptyMetadata,
        })
        .await?;
        Ok(())
    }

    /// Removes a metadata entry from a field.
    pub async fn remove_metadata(&mut self, field_id: FieldId, index: usize) -> AppResult<()> {
        self.apply_edit(DraftOperation::EditField {
            field_id,
            edit: FieldEdit::RemoveMetadata { index },
        })
        .await?;
        Ok(())
    }

    /// Switches the security mode.
    pub async fn change_security_mode(&mut self, mode: SecurityMode) -> AppResult<()> {
        self.apply_edit(DraftOperation::ChangeSecurityMode { mode })
            .await?;
        Ok(())
    }

    /// Saves members for the current security mode.
    pub async fn save_security(&mut self, members: Vec<String>) -> AppResult<()> {
        let mode = self.require_schema()?.entity().security().mode();
        self.apply_edit(DraftOperation::SaveSecurity { mode, members })
            .await?;
        Ok(())
    }

    /// Selects or deselects a data browser row.
    pub fn toggle_displayed_selection(&mut self, field_id: FieldId) -> AppResult<()> {
        let displayed = self
            .require_schema()?
            .advanced()
            .browsing()
            .displayed_fields()
            .contains(&field_id);
        if !displayed {
            return Err(AppError::Validation(format!(
                "field {field_id} is not displayed in the data browser"
            )));
        }

        self.session.selection_mut().toggle_displayed(field_id);
        Ok(())
    }

    /// Moves selected data browser rows one step up. Returns whether anything moved.
    pub async fn move_selected_displayed_up(&mut self) -> AppResult<bool> {
        if !self.can_move_up() {
            return Ok(false);
        }

        let field_ids = self
            .require_schema()?
            .advanced()
            .browsing()
            .moved_up(self.session.selection().selected_displayed());
        self.apply_edit(DraftOperation::SetBrowsingDisplayedFields { field_ids })
            .await?;
        Ok(true)
    }

    /// Moves selected data browser rows one step down. Returns whether anything moved.
    pub async fn move_selected_displayed_down(&mut self) -> AppResult<bool> {
        if !self.can_move_down() {
            return Ok(false);
        }

        let field_ids = self
            .require_schema()?
            .advanced()
            .browsing()
            .moved_down(self.session.selection().selected_displayed());
        self.apply_edit(DraftOperation::SetBrowsingDisplayedFields { field_ids })
            .await?;
        Ok(true)
    }

    /// Returns whether any selected row can move up.
    #[must_use]
    pub fn can_move_up(&self) -> bool {
        self.session.mirror().is_some_and(|schema| {
            schema
                .advanced()
                .browsing()
                .can_move_up(self.session.selection().selected_displayed())
        })
    }

    /// Returns whether any selected row can move down.
    #[must_use]
    pub fn can_move_down(&self) -> bool {
        self.session.mirror().is_some_and(|schema| {
            schema
                .advanced()
                .browsing()
                .can_move_down(self.session.selection().selected_displayed())
        })
    }

    /// Returns the owner's other uncommitted drafts.
    #[must_use]
    pub fn work_in_progress(&self) -> &[EntityDraft] {
        self.session.work_in_progress()
    }

    /// Returns whether the owner has other uncommitted drafts.
    #[must_use]
    pub fn has_work_in_progress(&self) -> bool {
        !self.session.work_in_progress().is_empty()
    }

    /// Reloads the owner's work in progress list.
    pub async fn refresh_work_in_progress(&mut self) -> AppResult<()> {
        let drafts = self.backend.list_work_in_progress(self.owner()).await?;
        self.session.set_work_in_progress(drafts);
        Ok(())
    }

    /// Abandons the owner's draft of another entity.
    pub async fn discard(&mut self, entity_id: EntityId) -> AppResult<()> {
        if self.session.selected_entity() == Some(entity_id) {
            self.abandon().await?;
        } else {
            self.backend.abandon(entity_id, self.owner()).await?;
            info!(entity_id = %entity_id, "work in progress discarded");
        }

        self.refresh_work_in_progress().await
    }

    fn owner(&self) -> &str {
        self.session.owner().username()
    }

    fn require_schema(&self) -> AppResult<&DraftSchema> {
        self.session
            .mirror()
            .ok_or_else(|| AppError::NotFound("no entity is selected".to_owned()))
    }

    fn active_position(&self) -> AppResult<usize> {
        self.session
            .selection()
            .active_index()
            .ok_or_else(|| AppError::Validation("no lookup is active".to_owned()))
    }

    fn activate(&mut self, position: Option<usize>) {
        self.session.selection_mut().set_active_index(position);
        self.session.sync_selection();
    }

    fn recheck_lookup_names(&mut self) {
        let Some(schema) = self.session.mirror_mut() else {
            return;
        };
        if !schema.indexes().has_name_conflict() {
            return;
        }

        match flag_duplicate_names(schema) {
            Some(position) => self.activate(Some(position)),
            None => schema.indexes_mut().clear_name_conflict(),
        }
    }

    async fn load_schema(&self, entity_id: EntityId) -> AppResult<DraftSchema> {
        let entity = self.backend.load_entity(entity_id, self.owner()).await?;
        self.assemble_schema(entity).await
    }

    async fn assemble_schema(&self, entity: EntityDraft) -> AppResult<DraftSchema> {
        let entity_id = entity.id();
        let fields = self.backend.list_fields(entity_id, self.owner()).await?;
        let advanced = self
            .backend
            .advanced_settings(entity_id, self.owner())
            .await?;
        Ok(DraftSchema::new(
            entity,
            FieldRegistry::new(fields),
            advanced,
        ))
    }

    async fn reload_clean(&mut self, entity_id: EntityId) -> AppResult<()> {
        let mut schema = self.load_schema(entity_id).await?;
        schema.apply_state(DraftState::default());
        self.install_loaded(schema);
        Ok(())
    }

    /// Replaces the mirror with a freshly loaded schema. The first lookup
    /// becomes active unless a duplicate name needs fixing first.
    fn install_loaded(&mut self, mut schema: DraftSchema) {
        let mut active = (!schema.indexes().is_empty()).then_some(0);
        if let Some(position) = flag_duplicate_names(&mut schema) {
            warn!(
                entity_id = %schema.entity().id(),
                position,
                "entity loaded with duplicate lookup names"
            );
            active = Some(position);
        }

        self.session.selection_mut().set_active_index(active);
        self.session.replace_mirror(schema);
    }
}

/// Raises the name conflict flag for the first duplicated lookup name and
/// returns its position.
fn flag_duplicate_names(schema: &mut DraftSchema) -> Option<usize> {
    let position = schema.indexes().first_duplicate_position()?;
    let name = schema.indexes().get(position)?.name().to_owned();
    schema.indexes_mut().validate_lookup_name(&name);
    Some(position)
}

#[cfg(test)]
mod tests;
