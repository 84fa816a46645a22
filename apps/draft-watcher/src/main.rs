//! Schemata draft watcher: reports when an editor's uncommitted drafts are
//! invalidated by commits from other sessions.

#![forbid(unsafe_code)]

use std::collections::BTreeSet;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use schemata_application::DraftBackend;
use schemata_core::{AppError, AppResult, EntityId};
use schemata_domain::EntityDraft;
use schemata_infrastructure::{HttpBackendConfig, HttpDraftBackend};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WatcherConfig {
    backend: HttpBackendConfig,
    poll_interval_ms: u64,
}

impl WatcherConfig {
    fn load() -> AppResult<Self> {
        let backend = HttpBackendConfig::load()?;
        let poll_interval_ms = parse_env_u64("WATCHER_POLL_INTERVAL_MS", 5000)?;

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "WATCHER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            backend,
            poll_interval_ms,
        })
    }
}

#[derive(Debug, Default)]
struct PollReport {
    drafts: usize,
    newly_outdated: Vec<EntityDraft>,
    recovered: Vec<EntityId>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WatcherConfig::load()?;
    let backend: Arc<dyn DraftBackend> = Arc::new(HttpDraftBackend::from_config(&config.backend)?);

    info!(
        owner = %config.backend.owner(),
        backend_url = %config.backend.base_url(),
        poll_interval_ms = config.poll_interval_ms,
        "schemata-draft-watcher started"
    );

    let mut outdated: BTreeSet<EntityId> = BTreeSet::new();
    loop {
        match poll_once(backend.as_ref(), config.backend.owner(), &mut outdated).await {
            Ok(report) => {
                for draft in &report.newly_outdated {
                    warn!(
                        entity_id = %draft.id(),
                        entity = %draft.label(),
                        "draft is outdated; refresh it before committing"
                    );
                }
                for entity_id in &report.recovered {
                    info!(entity_id = %entity_id, "draft no longer outdated");
                }
                if !report.newly_outdated.is_empty() || !report.recovered.is_empty() {
                    info!(
                        drafts = report.drafts,
                        outdated = outdated.len(),
                        "work in progress changed"
                    );
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to poll work in progress");
            }
        }

        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
}

async fn poll_once(
    backend: &dyn DraftBackend,
    owner: &str,
    outdated: &mut BTreeSet<EntityId>,
) -> AppResult<PollReport> {
    let drafts = backend.list_work_in_progress(owner).await?;

    let current: BTreeSet<EntityId> = drafts
        .iter()
        .filter(|draft| draft.is_outdated())
        .map(EntityDraft::id)
        .collect();
    let recovered = outdated.difference(&current).copied().collect();
    let newly_outdated = drafts
        .iter()
        .filter(|draft| draft.is_outdated() && !outdated.contains(&draft.id()))
        .cloned()
        .collect();

    *outdated = current;
    Ok(PollReport {
        drafts: drafts.len(),
        newly_outdated,
        recovered,
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
