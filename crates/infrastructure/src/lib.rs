//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_backend_config;
mod http_draft_backend;
mod in_memory_draft_backend;

pub use http_backend_config::HttpBackendConfig;
pub use http_draft_backend::{DRAFT_OWNER_HEADER, HttpDraftBackend};
pub use in_memory_draft_backend::InMemoryDraftBackend;
