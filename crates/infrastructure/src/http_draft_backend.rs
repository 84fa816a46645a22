use async_trait::async_trait;
use reqwest::StatusCode;
use schemata_application::DraftBackend;
use schemata_core::{AppError, AppResult, EntityId};
use schemata_domain::{AdvancedSettings, DraftOperation, DraftState, EntityDraft, FieldDefinition};
use serde::de::DeserializeOwned;
use tracing::warn;
use url::Url;

use crate::HttpBackendConfig;
use crate::http_backend_config::parse_base_url;

/// Header carrying the username a draft belongs to.
pub const DRAFT_OWNER_HEADER: &str = "X-Draft-Owner";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Read,
    Edit,
    Commit,
}

/// REST implementation of the draft backend port.
pub struct HttpDraftBackend {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpDraftBackend {
    /// Creates a backend for the API rooted at `base_url`.
    pub fn new(http_client: reqwest::Client, base_url: &str) -> AppResult<Self> {
        Ok(Self {
            http_client,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// Creates a backend from loaded configuration.
    pub fn from_config(config: &HttpBackendConfig) -> AppResult<Self> {
        Ok(Self {
            http_client: config.build_client()?,
            base_url: config.base_url().clone(),
        })
    }

    fn endpoint(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|error| AppError::Internal(format!("invalid backend path '{path}': {error}")))
    }

    fn entity_endpoint(&self, entity_id: EntityId, suffix: &str) -> AppResult<Url> {
        if suffix.is_empty() {
            self.endpoint(&format!("entities/{entity_id}"))
        } else {
            self.endpoint(&format!("entities/{entity_id}/{suffix}"))
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        owner: &str,
        kind: CallKind,
    ) -> AppResult<reqwest::Response> {
        let response = request
            .header(DRAFT_OWNER_HEADER, owner)
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("schema backend transport error: {error}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response body unavailable>".to_owned());
        warn!(status = %status, body = %body, "schema backend call failed");
        Err(map_failure(kind, status, body))
    }

    async fn get_json<T>(&self, url: Url, owner: &str) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(self.http_client.get(url), owner, CallKind::Read)
            .await?;
        decode(response).await
    }

    async fn post_empty(&self, url: Url, owner: &str, kind: CallKind) -> AppResult<()> {
        self.send(self.http_client.post(url), owner, kind).await?;
        Ok(())
    }
}

async fn decode<T>(response: reqwest::Response) -> AppResult<T>
where
    T: DeserializeOwned,
{
    response.json::<T>().await.map_err(|error| {
        AppError::Internal(format!("schema backend returned an unreadable body: {error}"))
    })
}

fn map_failure(kind: CallKind, status: StatusCode, body: String) -> AppError {
    if status == StatusCode::NOT_FOUND {
        return AppError::NotFound(body);
    }

    match kind {
        CallKind::Commit if status == StatusCode::CONFLICT => AppError::CommitConflict(body),
        CallKind::Edit | CallKind::Commit => AppError::draft_operation(body),
        CallKind::Read => AppError::Internal(format!(
            "schema backend responded with status {status}: {body}"
        )),
    }
}

#[async_trait]
impl DraftBackend for HttpDraftBackend {
    async fn apply_draft_operation(
        &self,
        entity_id: EntityId,
        owner: &str,
        operation: &DraftOperation,
    ) -> AppResult<DraftState> {
        let url = self.entity_endpoint(entity_id, "draft")?;
        let response = self
            .send(
                self.http_client.post(url).json(operation),
                owner,
                CallKind::Edit,
            )
            .await?;
        decode(response).await
    }

    async fn load_entity(&self, entity_id: EntityId, owner: &str) -> AppResult<EntityDraft> {
        self.get_json(self.entity_endpoint(entity_id, "")?, owner)
            .await
    }

    async fn list_fields(
        &self,
        entity_id: EntityId,
        owner: &str,
    ) -> AppResult<Vec<FieldDefinition>> {
        self.get_json(self.entity_endpoint(entity_id, "fields")?, owner)
            .await
    }

    async fn advanced_settings(
        &self,
        entity_id: EntityId,
        owner: &str,
    ) -> AppResult<AdvancedSettings> {
        self.get_json(self.entity_endpoint(entity_id, "advanced")?, owner)
            .await
    }

    async fn draft_state(&self, entity_id: EntityId, owner: &str) -> AppResult<DraftState> {
        self.get_json(self.entity_endpoint(entity_id, "draft")?, owner)
            .await
    }

    async fn commit(&self, entity_id: EntityId, owner: &str) -> AppResult<()> {
        self.post_empty(
            self.entity_endpoint(entity_id, "commit")?,
            owner,
            CallKind::Commit,
        )
        .await
    }

    async fn abandon(&self, entity_id: EntityId, owner: &str) -> AppResult<()> {
        self.post_empty(
            self.entity_endpoint(entity_id, "abandon")?,
            owner,
            CallKind::Edit,
        )
        .await
    }

    async fn update_draft(&self, entity_id: EntityId, owner: &str) -> AppResult<EntityDraft> {
        let url = self.entity_endpoint(entity_id, "update")?;
        let response = self
            .send(self.http_client.post(url), owner, CallKind::Edit)
            .await?;
        decode(response).await
    }

    async fn list_work_in_progress(&self, owner: &str) -> AppResult<Vec<EntityDraft>> {
        self.get_json(self.endpoint("entities/wip")?, owner).await
    }
}
