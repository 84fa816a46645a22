use async_trait::async_trait;
use schemata_core::{AppResult, EntityId};
use schemata_domain::{AdvancedSettings, DraftOperation, DraftState, EntityDraft, FieldDefinition};

/// Port for the schema store that holds committed entities and per-owner drafts.
///
/// Reads return the owner's draft view when a draft exists and the committed
/// schema otherwise.
#[async_trait]
pub trait DraftBackend: Send + Sync {
    /// Applies one draft operation, creating the draft on first edit.
    async fn apply_draft_operation(
        &self,
        entity_id: EntityId,
        owner: &str,
        operation: &DraftOperation,
    ) -> AppResult<DraftState>;

    /// Loads the entity header.
    async fn load_entity(&self, entity_id: EntityId, owner: &str) -> AppResult<EntityDraft>;

    /// Lists entity fields in order.
    async fn list_fields(&self, entity_id: EntityId, owner: &str)
    -> AppResult<Vec<FieldDefinition>>;

    /// Loads lookups and REST, browsing and tracking settings.
    async fn advanced_settings(
        &self,
        entity_id: EntityId,
        owner: &str,
    ) -> AppResult<AdvancedSettings>;

    /// Returns current draft flags.
    async fn draft_state(&self, entity_id: EntityId, owner: &str) -> AppResult<DraftState>;

    /// Persists the draft as the new committed schema.
    async fn commit(&self, entity_id: EntityId, owner: &str) -> AppResult<()>;

    /// Discards the draft.
    async fn abandon(&self, entity_id: EntityId, owner: &str) -> AppResult<()>;

    /// Rebases an outdated draft on the latest committed schema.
    async fn update_draft(&self, entity_id: EntityId, owner: &str) -> AppResult<EntityDraft>;

    /// Lists entities the owner has uncommitted drafts for.
    async fn list_work_in_progress(&self, owner: &str) -> AppResult<Vec<EntityDraft>>;
}
