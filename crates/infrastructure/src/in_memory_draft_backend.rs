use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemata_application::DraftBackend;
use schemata_core::{AppError, AppResult, EntityId};
use schemata_domain::{
    AdvancedSettings, DraftOperation, DraftSchema, DraftState, EntityDraft, FieldDefinition,
    validation,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct CommittedEntity {
    schema: DraftSchema,
    version: u64,
}

#[derive(Debug, Clone)]
struct StoredDraft {
    schema: DraftSchema,
    parent_version: u64,
    changes_made: bool,
    last_modified: DateTime<Utc>,
}

impl StoredDraft {
    fn branch(committed: &CommittedEntity) -> Self {
        Self {
            schema: committed.schema.clone(),
            parent_version: committed.version,
            changes_made: false,
            last_modified: Utc::now(),
        }
    }

    fn state(&self, committed: &CommittedEntity) -> DraftState {
        DraftState {
            modified: self.changes_made,
            outdated: self.parent_version != committed.version,
        }
    }

    fn view(&self, committed: &CommittedEntity) -> DraftSchema {
        let mut schema = self.schema.clone();
        schema.apply_state(self.state(committed));
        schema
    }
}

/// In-memory schema store holding committed entities and one draft per
/// entity and owner.
#[derive(Debug, Default)]
pub struct InMemoryDraftBackend {
    committed: RwLock<HashMap<EntityId, CommittedEntity>>,
    drafts: RwLock<HashMap<(EntityId, String), StoredDraft>>,
}

impl InMemoryDraftBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(HashMap::new()),
            drafts: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a committed entity schema.
    pub async fn seed_entity(&self, schema: DraftSchema) -> AppResult<()> {
        let entity_id = schema.entity().id();
        let mut committed = self.committed.write().await;
        if committed.contains_key(&entity_id) {
            return Err(AppError::Validation(format!(
                "entity {entity_id} is already registered"
            )));
        }

        let mut schema = schema;
        schema.apply_state(DraftState::default());
        committed.insert(entity_id, CommittedEntity { schema, version: 1 });
        Ok(())
    }

    /// Returns when the owner's draft was last changed.
    pub async fn draft_last_modified(
        &self,
        entity_id: EntityId,
        owner: &str,
    ) -> Option<DateTime<Utc>> {
        self.drafts
            .read()
            .await
            .get(&(entity_id, owner.to_owned()))
            .map(|draft| draft.last_modified)
    }

    async fn current_view(&self, entity_id: EntityId, owner: &str) -> AppResult<DraftSchema> {
        let committed = self.committed.read().await;
        let entity = require_entity(&committed, entity_id)?;

        let drafts = self.drafts.read().await;
        Ok(match drafts.get(&(entity_id, owner.to_owned())) {
            Some(draft) => draft.view(entity),
            None => entity.schema.clone(),
        })
    }
}

fn require_entity(
    committed: &HashMap<EntityId, CommittedEntity>,
    entity_id: EntityId,
) -> AppResult<&CommittedEntity> {
    committed
        .get(&entity_id)
        .ok_or_else(|| AppError::NotFound(format!("entity {entity_id} does not exist")))
}

#[async_trait]
impl DraftBackend for InMemoryDraftBackend {
    async fn apply_draft_operation(
        &self,
        entity_id: EntityId,
        owner: &str,
        operation: &DraftOperation,
    ) -> AppResult<DraftState> {
        let committed = self.committed.read().await;
        let entity = require_entity(&committed, entity_id)?;

        let mut drafts = self.drafts.write().await;
        let key = (entity_id, owner.to_owned());
        let mut draft = drafts
            .get(&key)
            .cloned()
            .unwrap_or_else(|| StoredDraft::branch(entity));

        if draft.schema.entity().is_read_only() {
            return Err(AppError::draft_rejection(
                "readOnlyEntity",
                format!("entity {entity_id} is provided by a module and cannot be edited"),
            ));
        }
        if draft.state(entity).outdated {
            return Err(AppError::StaleDraft(format!(
                "draft of '{owner}' for entity {entity_id} is outdated"
            )));
        }

        draft.schema = draft.schema.transformed(operation).map_err(|error| {
            warn!(
                entity_id = %entity_id,
                operation = operation.name(),
                error = %error,
                "draft operation refused"
            );
            match error {
                AppError::Validation(message) | AppError::NotFound(message) => {
                    AppError::draft_rejection("draftSave", message)
                }
                other => other,
            }
        })?;
        draft.changes_made = true;
        draft.last_modified = Utc::now();

        let state = draft.state(entity);
        drafts.insert(key, draft);
        Ok(state)
    }

    async fn load_entity(&self, entity_id: EntityId, owner: &str) -> AppResult<EntityDraft> {
        Ok(self.current_view(entity_id, owner).await?.entity().clone())
    }

    async fn list_fields(
        &self,
        entity_id: EntityId,
        owner: &str,
    ) -> AppResult<Vec<FieldDefinition>> {
        Ok(self
            .current_view(entity_id, owner)
            .await?
            .fields()
            .fields()
            .to_vec())
    }

    async fn advanced_settings(
        &self,
        entity_id: EntityId,
        owner: &str,
    ) -> AppResult<AdvancedSettings> {
        Ok(self.current_view(entity_id, owner).await?.advanced().clone())
    }

    async fn draft_state(&self, entity_id: EntityId, owner: &str) -> AppResult<DraftState> {
        Ok(self.current_view(entity_id, owner).await?.entity().state())
    }

    async fn commit(&self, entity_id: EntityId, owner: &str) -> AppResult<()> {
        let mut committed = self.committed.write().await;
        let mut drafts = self.drafts.write().await;
        let key = (entity_id, owner.to_owned());

        let entity = committed
            .get_mut(&entity_id)
            .ok_or_else(|| AppError::NotFound(format!("entity {entity_id} does not exist")))?;
        let Some(draft) = drafts.get(&key) else {
            return Ok(());
        };

        if draft.state(entity).outdated {
            return Err(AppError::CommitConflict(format!(
                "entity {entity_id} changed since the draft of '{owner}' was created"
            )));
        }
        let issues = validation::commit_issues(&draft.schema);
        if !issues.is_empty() {
            return Err(AppError::CommitConflict(validation::issues_message(&issues)));
        }

        let mut schema = draft.schema.clone();
        schema.apply_state(DraftState::default());
        entity.schema = schema;
        entity.version = entity.version.saturating_add(1);
        drafts.remove(&key);

        info!(entity_id = %entity_id, owner = %owner, version = entity.version, "draft committed");
        Ok(())
    }

    async fn abandon(&self, entity_id: EntityId, owner: &str) -> AppResult<()> {
        let committed = self.committed.read().await;
        require_entity(&committed, entity_id)?;

        if self
            .drafts
            .write()
            .await
            .remove(&(entity_id, owner.to_owned()))
            .is_some()
        {
            info!(entity_id = %entity_id, owner = %owner, "draft abandoned");
        }
        Ok(())
    }

    async fn update_draft(&self, entity_id: EntityId, owner: &str) -> AppResult<EntityDraft> {
        let committed = self.committed.read().await;
        let entity = require_entity(&committed, entity_id)?;

        let mut drafts = self.drafts.write().await;
        let key = (entity_id, owner.to_owned());
        if !drafts.contains_key(&key) {
            return Ok(entity.schema.entity().clone());
        }

        let draft = StoredDraft::branch(entity);
        let header = draft.view(entity).entity().clone();
        drafts.insert(key, draft);

        info!(entity_id = %entity_id, owner = %owner, "draft rebased on latest commit");
        Ok(header)
    }

    async fn list_work_in_progress(&self, owner: &str) -> AppResult<Vec<EntityDraft>> {
        let committed = self.committed.read().await;
        let drafts = self.drafts.read().await;

        let mut listed: Vec<EntityDraft> = drafts
            .iter()
            .filter(|((_, draft_owner), draft)| draft_owner == owner && draft.changes_made)
            .filter_map(|((entity_id, _), draft)| {
                committed
                    .get(entity_id)
                    .map(|entity| draft.view(entity).entity().clone())
            })
            .collect();
        listed.sort_by_key(EntityDraft::id);
        Ok(listed)
    }
}
