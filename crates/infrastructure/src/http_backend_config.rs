use std::env;
use std::time::Duration;

use schemata_core::{AppError, AppResult};
use url::Url;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Connection settings for the remote schema backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBackendConfig {
    base_url: Url,
    timeout: Duration,
    owner: String,
}

impl HttpBackendConfig {
    /// Reads `SCHEMATA_BACKEND_URL`, `SCHEMATA_BACKEND_TIMEOUT_MS` and
    /// `SCHEMATA_DRAFT_OWNER` from the process environment.
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = required_value(&lookup, "SCHEMATA_BACKEND_URL")?;
        let base_url = parse_base_url(&raw_url)?;

        let timeout_ms = parse_u64(&lookup, "SCHEMATA_BACKEND_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(AppError::Validation(
                "SCHEMATA_BACKEND_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        let owner = required_value(&lookup, "SCHEMATA_DRAFT_OWNER")?;

        Ok(Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            owner,
        })
    }

    /// Returns the API base URL, always ending with `/`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the username drafts are held for.
    #[must_use]
    pub fn owner(&self) -> &str {
        self.owner.as_str()
    }

    /// Builds an HTTP client honouring the configured timeout.
    pub fn build_client(&self) -> AppResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))
    }
}

pub(crate) fn parse_base_url(raw: &str) -> AppResult<Url> {
    let mut url = Url::parse(raw.trim()).map_err(|error| {
        AppError::Validation(format!("invalid SCHEMATA_BACKEND_URL value '{raw}': {error}"))
    })?;
    if url.cannot_be_a_base() {
        return Err(AppError::Validation(format!(
            "SCHEMATA_BACKEND_URL '{raw}' cannot be used as a base URL"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn required_value<F>(lookup: &F, name: &str) -> AppResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_u64<F>(lookup: &F, name: &str, default: u64) -> AppResult<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
