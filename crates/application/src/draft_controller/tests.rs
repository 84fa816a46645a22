use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use schemata_core::{AppError, AppResult, EditorIdentity, EntityId, FieldId, LookupId};
use schemata_domain::{
    AdvancedSettings, BrowsingSettings, DraftOperation, DraftSchema, DraftState, EntityDraft,
    FieldDefinition, FieldEdit, FieldRegistry, LookupDefinition, LookupRegistry, SecurityMode,
    SecuritySettings, TrackedAction,
};
use tokio::sync::Mutex;

use crate::DraftBackend;

use super::DraftController;

const PATIENT: EntityId = EntityId::new(1);
const VISIT: EntityId = EntityId::new(2);

struct FakeBackend {
    committed: Mutex<HashMap<EntityId, DraftSchema>>,
    drafts: Mutex<HashMap<EntityId, DraftSchema>>,
    outdated: Mutex<BTreeSet<EntityId>>,
    rejection: Mutex<Option<AppError>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeBackend {
    fn new(schemas: Vec<DraftSchema>) -> Self {
        Self {
            committed: Mutex::new(
                schemas
                    .into_iter()
                    .map(|schema| (schema.entity().id(), schema))
                    .collect(),
            ),
            drafts: Mutex::new(HashMap::new()),
            outdated: Mutex::new(BTreeSet::new()),
            rejection: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    async fn mark_outdated(&self, entity_id: EntityId) {
        self.outdated.lock().await.insert(entity_id);
    }

    async fn reject_next(&self, error: AppError) {
        *self.rejection.lock().await = Some(error);
    }

    async fn calls_of(&self, name: &str) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| **call == name)
            .count()
    }

    async fn current(&self, entity_id: EntityId) -> AppResult<DraftSchema> {
        if let Some(draft) = self.drafts.lock().await.get(&entity_id) {
            return Ok(draft.clone());
        }
        self.committed
            .lock()
            .await
            .get(&entity_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("entity {entity_id} does not exist")))
    }

    async fn state(&self, entity_id: EntityId) -> DraftState {
        DraftState {
            modified: self.drafts.lock().await.contains_key(&entity_id),
            outdated: self.outdated.lock().await.contains(&entity_id),
        }
    }
}

#[async_trait]
impl DraftBackend for FakeBackend {
    async fn apply_draft_operation(
        &self,
        entity_id: EntityId,
        _owner: &str,
        operation: &DraftOperation,
    ) -> AppResult<DraftState> {
        self.calls.lock().await.push("apply");
        if let Some(error) = self.rejection.lock().await.take() {
            return Err(error);
        }

        let mut draft = self.current(entity_id).await?;
        draft.apply(operation)?;
        self.drafts.lock().await.insert(entity_id, draft);
        Ok(self.state(entity_id).await)
    }

    async fn load_entity(&self, entity_id: EntityId, _owner: &str) -> AppResult<EntityDraft> {
        let mut entity = self.current(entity_id).await?.entity().clone();
        entity.apply_state(self.state(entity_id).await);
        Ok(entity)
    }

    async fn list_fields(
        &self,
        entity_id: EntityId,
        _owner: &str,
    ) -> AppResult<Vec<FieldDefinition>> {
        Ok(self.current(entity_id).await?.fields().fields().to_vec())
    }

    async fn advanced_settings(
        &self,
        entity_id: EntityId,
        _owner: &str,
    ) -> AppResult<AdvancedSettings> {
        Ok(self.current(entity_id).await?.advanced().clone())
    }

    async fn draft_state(&self, entity_id: EntityId, _owner: &str) -> AppResult<DraftState> {
        Ok(self.state(entity_id).await)
    }

    async fn commit(&self, entity_id: EntityId, _owner: &str) -> AppResult<()> {
        self.calls.lock().await.push("commit");
        if let Some(error) = self.rejection.lock().await.take() {
            return Err(error);
        }

        let draft = self.current(entity_id).await?;
        self.drafts.lock().await.remove(&entity_id);
        self.committed.lock().await.insert(entity_id, draft);
        Ok(())
    }

    async fn abandon(&self, entity_id: EntityId, _owner: &str) -> AppResult<()> {
        self.calls.lock().await.push("abandon");
        self.drafts.lock().await.remove(&entity_id);
        self.outdated.lock().await.remove(&entity_id);
        Ok(())
    }

    async fn update_draft(&self, entity_id: EntityId, owner: &str) -> AppResult<EntityDraft> {
        self.calls.lock().await.push("update");
        self.outdated.lock().await.remove(&entity_id);
        self.load_entity(entity_id, owner).await
    }

    async fn list_work_in_progress(&self, _owner: &str) -> AppResult<Vec<EntityDraft>> {
        let drafts = self.drafts.lock().await;
        let mut listed: Vec<EntityDraft> =
            drafts.values().map(|draft| draft.entity().clone()).collect();
        listed.sort_by_key(EntityDraft::id);
        Ok(listed)
    }
}

fn entity(id: EntityId, name: &str) -> EntityDraft {
    EntityDraft::new(id, name).unwrap_or_else(|_| unreachable!())
}

fn schema_with_lookups(lookups: Vec<LookupDefinition>) -> DraftSchema {
    DraftSchema::new(
        entity(PATIENT, "Patient"),
        FieldRegistry::new(vec![FieldDefinition::new(
            FieldId::new(1),
            "age",
            "Age",
            "java.lang.Integer",
        )]),
        AdvancedSettings::new(
            LookupRegistry::new(lookups),
            Default::default(),
            BrowsingSettings::new(vec![FieldId::new(1)], BTreeSet::new()),
            Default::default(),
        ),
    )
}

fn patient() -> DraftSchema {
    schema_with_lookups(Vec::new())
}

fn visit() -> DraftSchema {
    DraftSchema::new(
        entity(VISIT, "Visit"),
        FieldRegistry::default(),
        AdvancedSettings::default(),
    )
}

async fn controller_for(schemas: Vec<DraftSchema>) -> (DraftController, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::new(schemas));
    let mut controller =
        DraftController::new(backend.clone(), EditorIdentity::new("alice", "Alice"));
    assert!(controller.select_entity(PATIENT).await.is_ok());
    (controller, backend)
}

fn lookup_names(controller: &DraftController) -> Vec<String> {
    controller
        .schema()
        .map(|schema| {
            schema
                .indexes()
                .lookups()
                .iter()
                .map(|lookup| lookup.name().to_owned())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn edits_on_outdated_draft_fail_without_reaching_backend() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    backend.mark_outdated(PATIENT).await;
    assert!(controller.poll_draft_state().await.is_ok());

    let result = controller
        .apply_edit(DraftOperation::AddTrackedAction {
            action: TrackedAction::Create,
        })
        .await;

    assert!(matches!(result, Err(AppError::StaleDraft(_))));
    assert_eq!(backend.calls_of("apply").await, 0);
}

#[tokio::test]
async fn lookup_fields_follow_add_and_field_removal() {
    let (mut controller, _backend) = controller_for(vec![patient()]).await;

    assert_eq!(controller.add_index().await.ok(), Some(0));
    assert_eq!(controller.add_index().await.ok(), Some(1));
    assert_eq!(lookup_names(&controller), vec!["Lookup 1", "Lookup 2"]);

    assert!(controller.set_active_index(0).is_ok());
    assert_eq!(controller.available_fields(), &[FieldId::new(1)]);
    assert_eq!(
        controller.add_lookup_field().await.ok(),
        Some(FieldId::new(1))
    );
    assert!(controller.available_fields().is_empty());
    assert!(!controller.can_add_lookup_fields());

    assert!(
        controller
            .apply_edit(DraftOperation::RemoveField {
                field_id: FieldId::new(1),
            })
            .await
            .is_ok()
    );
    let lookup_fields = controller
        .schema()
        .and_then(|schema| schema.indexes().get(0).map(|lookup| lookup.fields().to_vec()))
        .unwrap_or_default();
    assert!(lookup_fields.is_empty());
    assert!(controller.available_fields().is_empty());
}

#[tokio::test]
async fn rejected_edit_leaves_mirror_unchanged() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    backend
        .reject_next(AppError::draft_operation("key:mds.error.draftSave"))
        .await;

    let before = controller.schema().cloned();
    let result = controller.add_index().await;

    assert!(matches!(
        result,
        Err(AppError::DraftOperation { ref code, .. }) if code == "mds.error.draftSave"
    ));
    assert_eq!(controller.schema().cloned(), before);
}

#[tokio::test]
async fn locally_invalid_edit_is_not_sent() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;

    let result = controller
        .apply_edit(DraftOperation::AddFilterableField {
            field_id: FieldId::new(42),
        })
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(backend.calls_of("apply").await, 0);
}

#[tokio::test]
async fn commit_is_blocked_by_duplicate_lookup_names() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    assert!(controller.add_index().await.is_ok());
    assert!(controller.add_index().await.is_ok());

    assert!(controller.rename_index(1, "Lookup 1").await.is_ok());
    assert_eq!(controller.session().selection().active_index(), Some(1));
    assert!(controller.set_active_index(0).is_err());

    let result = controller.commit().await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(backend.calls_of("commit").await, 0);

    assert!(controller.rename_index(1, "byAge").await.is_ok());
    assert!(controller.set_active_index(0).is_ok());
    assert!(controller.commit().await.is_ok());
    assert_eq!(backend.calls_of("commit").await, 1);
}

#[tokio::test]
async fn commit_of_outdated_draft_is_a_conflict() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    assert!(
        controller
            .toggle_tracked_action(TrackedAction::Delete)
            .await
            .is_ok()
    );
    backend.mark_outdated(PATIENT).await;
    assert!(
        controller
            .poll_draft_state()
            .await
            .is_ok_and(|state| state.outdated)
    );

    assert!(matches!(
        controller.commit().await,
        Err(AppError::CommitConflict(_))
    ));
    assert_eq!(backend.calls_of("commit").await, 0);

    assert_eq!(controller.refresh_if_outdated().await.ok(), Some(true));
    assert_eq!(controller.refresh_if_outdated().await.ok(), Some(false));
    assert!(controller.commit().await.is_ok());
}

#[tokio::test]
async fn successful_commit_clears_flags_and_reloads() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    let created = controller
        .create_field("email", "E-mail", "java.lang.String")
        .await;
    assert_eq!(created.ok(), Some(FieldId::new(2)));
    assert!(
        controller
            .schema()
            .is_some_and(|schema| schema.entity().is_modified())
    );

    let failure = AppError::CommitConflict("rejected".to_owned());
    backend.reject_next(failure.clone()).await;
    assert_eq!(controller.commit().await.err(), Some(failure));
    assert!(
        controller
            .schema()
            .is_some_and(|schema| schema.entity().is_modified())
    );

    assert!(controller.commit().await.is_ok());
    let schema = controller.schema();
    assert!(schema.is_some_and(|schema| !schema.entity().is_modified()));
    assert!(schema.is_some_and(|schema| schema.fields().len() == 2));
    assert_eq!(
        schema.map(|schema| schema.advanced().browsing().displayed_fields().to_vec()),
        Some(vec![FieldId::new(1), FieldId::new(2)])
    );
}

#[tokio::test]
async fn create_field_rejects_blank_or_taken_names() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;

    assert!(matches!(
        controller.create_field(" ", "Age", "java.lang.Integer").await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        controller.create_field("age", "Age", "java.lang.Integer").await,
        Err(AppError::Validation(_))
    ));
    assert_eq!(backend.calls_of("apply").await, 0);
}

#[tokio::test]
async fn abandon_restores_committed_schema() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    assert!(controller.add_index().await.is_ok());
    assert!(controller.add_metadata(FieldId::new(1)).await.is_ok());

    assert!(controller.abandon().await.is_ok());

    assert!(lookup_names(&controller).is_empty());
    assert!(
        controller
            .schema()
            .and_then(|schema| schema.fields().find_by_id(FieldId::new(1)))
            .is_some_and(|field| field.metadata().is_empty())
    );
    assert_eq!(backend.calls_of("abandon").await, 1);
}

#[tokio::test]
async fn loading_entity_with_duplicate_names_blocks_lookup_switching() {
    let lookups = vec![
        LookupDefinition::new(LookupId::new(1), "byAge", true, Vec::new()),
        LookupDefinition::new(LookupId::new(2), "other", true, Vec::new()),
        LookupDefinition::new(LookupId::new(3), "other", false, Vec::new()),
    ];
    let (mut controller, _backend) = controller_for(vec![schema_with_lookups(lookups)]).await;

    assert_eq!(controller.session().selection().active_index(), Some(1));
    assert!(matches!(
        controller.set_active_index(0),
        Err(AppError::Validation(_))
    ));

    assert!(controller.delete_active_index().await.is_ok());
    assert_eq!(lookup_names(&controller), vec!["byAge", "other"]);
    assert!(controller.set_active_index(0).is_ok());
}

#[tokio::test]
async fn moving_displayed_rows_keeps_selection() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    assert!(
        controller
            .create_field("name", "Name", "java.lang.String")
            .await
            .is_ok()
    );
    assert!(controller.toggle_displayed_selection(FieldId::new(2)).is_ok());
    assert!(controller.can_move_up());
    assert!(!controller.can_move_down());

    assert_eq!(controller.move_selected_displayed_up().await.ok(), Some(true));
    assert_eq!(
        controller
            .schema()
            .map(|schema| schema.advanced().browsing().displayed_fields().to_vec()),
        Some(vec![FieldId::new(2), FieldId::new(1)])
    );
    assert!(
        controller
            .session()
            .selection()
            .selected_displayed()
            .contains(&FieldId::new(2))
    );

    let applied = backend.calls_of("apply").await;
    assert_eq!(controller.move_selected_displayed_up().await.ok(), Some(false));
    assert_eq!(backend.calls_of("apply").await, applied);
}

#[tokio::test]
async fn security_mode_switch_clears_members() {
    let (mut controller, _backend) = controller_for(vec![patient()]).await;
    assert!(
        controller
            .change_security_mode(SecurityMode::Users)
            .await
            .is_ok()
    );
    assert!(
        controller
            .save_security(vec!["alice".to_owned(), "bob".to_owned()])
            .await
            .is_ok()
    );
    assert!(
        controller
            .change_security_mode(SecurityMode::Roles)
            .await
            .is_ok()
    );

    let security = controller
        .schema()
        .map(|schema| schema.entity().security().clone())
        .unwrap_or_default();
    assert_eq!(security.mode(), SecurityMode::Roles);
    assert!(security.users().is_empty());
    assert!(security.members().is_empty());
}

#[tokio::test]
async fn toggles_flip_tracking_rest_and_filters() {
    let (mut controller, _backend) = controller_for(vec![patient()]).await;
    assert!(controller.add_index().await.is_ok());

    assert_eq!(
        controller.toggle_tracked_field(FieldId::new(1)).await.ok(),
        Some(true)
    );
    assert_eq!(
        controller.toggle_tracked_field(FieldId::new(1)).await.ok(),
        Some(false)
    );
    assert!(
        controller
            .set_rest_lookup_enabled(LookupId::new(1), true)
            .await
            .is_ok()
    );
    assert!(controller.set_filterable(FieldId::new(1), true).await.is_ok());

    let advanced = controller
        .schema()
        .map(|schema| schema.advanced().clone())
        .unwrap_or_default();
    assert!(advanced.tracking().fields().is_empty());
    assert!(advanced.rest().lookup_ids().contains(&LookupId::new(1)));
    assert!(advanced.browsing().filterable_fields().contains(&FieldId::new(1)));
}

#[tokio::test]
async fn work_in_progress_lists_other_drafts_and_discards_them() {
    let (mut controller, backend) = controller_for(vec![patient(), visit()]).await;
    assert!(
        backend
            .apply_draft_operation(
                VISIT,
                "alice",
                &DraftOperation::AddTrackedAction {
                    action: TrackedAction::Update,
                },
            )
            .await
            .is_ok()
    );
    assert!(
        controller
            .apply_edit(DraftOperation::EditField {
                field_id: FieldId::new(1),
                edit: FieldEdit::SetDisplayName {
                    display_name: "Age (years)".to_owned(),
                },
            })
            .await
            .is_ok()
    );

    assert!(controller.refresh_work_in_progress().await.is_ok());
    let listed: Vec<EntityId> = controller
        .work_in_progress()
        .iter()
        .map(EntityDraft::id)
        .collect();
    assert_eq!(listed, vec![VISIT]);
    assert!(controller.has_work_in_progress());

    assert!(controller.discard(VISIT).await.is_ok());
    assert!(!controller.has_work_in_progress());
}

#[tokio::test]
async fn backend_stale_rejection_marks_mirror_outdated() {
    let (mut controller, backend) = controller_for(vec![patient()]).await;
    backend
        .reject_next(AppError::StaleDraft("changed by bob".to_owned()))
        .await;

    let result = controller.add_metadata(FieldId::new(1)).await;
    assert!(matches!(result, Err(AppError::StaleDraft(_))));
    assert!(
        controller
            .schema()
            .is_some_and(|schema| schema.entity().is_outdated())
    );

    assert_eq!(controller.refresh_if_outdated().await.ok(), Some(true));
    assert_eq!(backend.calls_of("update").await, 1);
    assert!(controller.add_metadata(FieldId::new(1)).await.is_ok());
}

#[tokio::test]
async fn read_only_entities_refuse_edits() {
    let read_only = DraftSchema::new(
        entity(PATIENT, "Patient").with_read_only(true),
        FieldRegistry::default(),
        AdvancedSettings::default(),
    );
    let (mut controller, backend) = controller_for(vec![read_only]).await;

    let result = controller
        .toggle_tracked_action(TrackedAction::Create)
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(backend.calls_of("apply").await, 0);
}

#[tokio::test]
async fn reload_after_commit_and_abandon_resets_active_lookup() {
    let lookups = vec![
        LookupDefinition::new(LookupId::new(1), "byAge", true, Vec::new()),
        LookupDefinition::new(LookupId::new(2), "byName", true, Vec::new()),
    ];
    let (mut controller, _backend) = controller_for(vec![schema_with_lookups(lookups)]).await;
    assert!(controller.set_active_index(1).is_ok());
    assert!(
        controller
            .toggle_tracked_action(TrackedAction::Update)
            .await
            .is_ok()
    );
    assert_eq!(controller.session().selection().active_index(), Some(1));

    assert!(controller.commit().await.is_ok());
    assert_eq!(controller.session().selection().active_index(), Some(0));

    assert!(controller.delete_active_index().await.is_ok());
    assert!(controller.delete_active_index().await.is_err());
    assert!(controller.abandon().await.is_ok());
    assert_eq!(controller.session().selection().active_index(), Some(0));
    assert_eq!(lookup_names(&controller), vec!["byAge", "byName"]);
}

#[tokio::test]
async fn seeded_security_mode_is_kept_when_saving_members() {
    let secured = DraftSchema::new(
        entity(PATIENT, "Patient").with_security(
            SecuritySettings::new(SecurityMode::Roles, vec!["admin".to_owned()])
                .unwrap_or_else(|_| unreachable!()),
        ),
        FieldRegistry::default(),
        AdvancedSettings::default(),
    );
    let (mut controller, _backend) = controller_for(vec![secured]).await;

    assert!(
        controller
            .save_security(vec!["admin".to_owned(), "auditor".to_owned()])
            .await
            .is_ok()
    );

    let security = controller
        .schema()
        .map(|schema| schema.entity().security().clone())
        .unwrap_or_default();
    assert_eq!(security.mode(), SecurityMode::Roles);
    assert_eq!(
        security.roles().to_vec(),
        vec!["admin".to_owned(), "auditor".to_owned()]
    );
}
