use std::collections::BTreeSet;

use schemata_core::{EditorIdentity, EntityId, FieldId, SessionId};
use schemata_domain::{DraftSchema, EntityDraft};

/// UI selection that used to live in the page: active lookup, its
/// available fields and the selected data browser rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    active_index: Option<usize>,
    available_fields: Vec<FieldId>,
    selected_displayed: BTreeSet<FieldId>,
}

impl SelectionState {
    /// Returns the active lookup position.
    #[must_use]
    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    /// Returns fields the active lookup does not use yet.
    #[must_use]
    pub fn available_fields(&self) -> &[FieldId] {
        &self.available_fields
    }

    /// Returns selected data browser rows.
    #[must_use]
    pub fn selected_displayed(&self) -> &BTreeSet<FieldId> {
        &self.selected_displayed
    }

    /// Recomputes derived selection after the mirror changed.
    pub(crate) fn sync(&mut self, schema: &DraftSchema) {
        if self
            .active_index
            .is_some_and(|position| position >= schema.indexes().len())
        {
            self.active_index = None;
        }

        self.available_fields = self
            .active_index
            .and_then(|position| schema.available_lookup_fields(position).ok())
            .unwrap_or_default();

        let displayed = schema.advanced().browsing().displayed_fields();
        self.selected_displayed
            .retain(|field_id| displayed.contains(field_id));
    }

    pub(crate) fn set_active_index(&mut self, position: Option<usize>) {
        self.active_index = position;
    }

    pub(crate) fn toggle_displayed(&mut self, field_id: FieldId) {
        if !self.selected_displayed.remove(&field_id) {
            self.selected_displayed.insert(field_id);
        }
    }
}

/// Per-editor state: the selected entity mirror, selection and the
/// owner's other uncommitted drafts.
#[derive(Debug, Clone)]
pub struct EditingSession {
    session_id: SessionId,
    owner: EditorIdentity,
    mirror: Option<DraftSchema>,
    selection: SelectionState,
    work_in_progress: Vec<EntityDraft>,
}

impl EditingSession {
    /// Creates an empty session for an editor.
    #[must_use]
    pub fn new(owner: EditorIdentity) -> Self {
        Self {
            session_id: SessionId::new(),
            owner,
            mirror: None,
            selection: SelectionState::default(),
            work_in_progress: Vec::new(),
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the editor owning the drafts.
    #[must_use]
    pub fn owner(&self) -> &EditorIdentity {
        &self.owner
    }

    /// Returns the local mirror of the selected entity.
    #[must_use]
    pub fn mirror(&self) -> Option<&DraftSchema> {
        self.mirror.as_ref()
    }

    /// Returns the selected entity id.
    #[must_use]
    pub fn selected_entity(&self) -> Option<EntityId> {
        self.mirror.as_ref().map(|schema| schema.entity().id())
    }

    /// Returns selection state.
    #[must_use]
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Returns the owner's drafts other than the selected entity.
    #[must_use]
    pub fn work_in_progress(&self) -> &[EntityDraft] {
        &self.work_in_progress
    }

    pub(crate) fn replace_mirror(&mut self, schema: DraftSchema) {
        self.selection.sync(&schema);
        self.mirror = Some(schema);
    }

    pub(crate) fn mirror_mut(&mut self) -> Option<&mut DraftSchema> {
        self.mirror.as_mut()
    }

    pub(crate) fn selection_mut(&mut self) -> &mut SelectionState {
        &mut self.selection
    }

    pub(crate) fn sync_selection(&mut self) {
        if let Some(schema) = self.mirror.as_ref() {
            self.selection.sync(schema);
        }
    }

    pub(crate) fn set_work_in_progress(&mut self, drafts: Vec<EntityDraft>) {
        let selected = self.selected_entity();
        self.work_in_progress = drafts
            .into_iter()
            .filter(|draft| Some(draft.id()) != selected)
            .collect();
    }

    pub(crate) fn clear(&mut self) {
        self.mirror = None;
        self.selection = SelectionState::default();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use schemata_core::{EditorIdentity, EntityId, FieldId};
    use schemata_domain::{
        AdvancedSettings, BrowsingSettings, DraftSchema, EntityDraft, FieldDefinition,
        FieldRegistry, LookupRegistry,
    };

    use super::EditingSession;

    fn schema(id: i64) -> DraftSchema {
        let entity =
            EntityDraft::new(EntityId::new(id), "Patient").unwrap_or_else(|_| unreachable!());
        let fields = FieldRegistry::new(vec![
            FieldDefinition::new(FieldId::new(1), "age", "Age", "java.lang.Integer"),
            FieldDefinition::new(FieldId::new(2), "name", "Name", "java.lang.String"),
        ]);
        let mut indexes = LookupRegistry::default();
        indexes.add_index("Lookup 1");
        let advanced = AdvancedSettings::new(
            indexes,
            Default::default(),
            BrowsingSettings::new(vec![FieldId::new(1)], BTreeSet::new()),
            Default::default(),
        );
        DraftSchema::new(entity, fields, advanced)
    }

    #[test]
    fn sync_recomputes_available_fields_and_prunes_selection() {
        let mut session = EditingSession::new(EditorIdentity::new("alice", "Alice"));
        session.selection_mut().set_active_index(Some(0));
        session.selection_mut().toggle_displayed(FieldId::new(1));
        session.selection_mut().toggle_displayed(FieldId::new(2));
        session.replace_mirror(schema(1));

        assert_eq!(
            session.selection().available_fields(),
            &[FieldId::new(1), FieldId::new(2)]
        );
        assert_eq!(
            session.selection().selected_displayed(),
            &BTreeSet::from([FieldId::new(1)])
        );
    }

    #[test]
    fn work_in_progress_excludes_selected_entity() {
        let mut session = EditingSession::new(EditorIdentity::new("alice", "Alice"));
        session.replace_mirror(schema(1));
        session.set_work_in_progress(vec![
            schema(1).entity().clone(),
            schema(2).entity().clone(),
        ]);

        let ids: Vec<EntityId> = session
            .work_in_progress()
            .iter()
            .map(EntityDraft::id)
            .collect();
        assert_eq!(ids, vec![EntityId::new(2)]);
    }
}
