use schemata_core::{AppResult, EntityId, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::SecuritySettings;

/// Derived draft flags returned by the backend after every draft operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftState {
    /// The draft differs from the committed schema.
    pub modified: bool,
    /// A concurrent commit invalidated the draft.
    pub outdated: bool,
}

/// Entity header as seen by the editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDraft {
    id: EntityId,
    name: NonEmptyString,
    module: Option<String>,
    namespace: Option<String>,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    modified: bool,
    #[serde(default)]
    outdated: bool,
    #[serde(default)]
    security: SecuritySettings,
}

impl EntityDraft {
    /// Creates an unmodified entity header with unrestricted security.
    pub fn new(id: EntityId, name: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            id,
            name: NonEmptyString::new(name)?,
            module: None,
            namespace: None,
            read_only: false,
            modified: false,
            outdated: false,
            security: SecuritySettings::default(),
        })
    }

    /// Sets the module and namespace the entity belongs to.
    #[must_use]
    pub fn with_origin(mut self, module: Option<String>, namespace: Option<String>) -> Self {
        self.module = module.filter(|value| !value.trim().is_empty());
        self.namespace = namespace.filter(|value| !value.trim().is_empty());
        self
    }

    /// Sets the security settings.
    #[must_use]
    pub fn with_security(mut self, security: SecuritySettings) -> Self {
        self.security = security;
        self
    }

    /// Marks the entity as provided by a module and not editable.
    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Returns the entity identifier.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the entity name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the owning module.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns whether the schema is owned by a module.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns whether the draft differs from the committed schema.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Returns whether a concurrent commit invalidated this draft.
    #[must_use]
    pub fn is_outdated(&self) -> bool {
        self.outdated
    }

    /// Returns the draft flags.
    #[must_use]
    pub fn state(&self) -> DraftState {
        DraftState {
            modified: self.modified,
            outdated: self.outdated,
        }
    }

    /// Returns the security settings.
    #[must_use]
    pub fn security(&self) -> &SecuritySettings {
        &self.security
    }

    /// Returns a label such as `Patient (module: clinic, namespace: core)`.
    #[must_use]
    pub fn label(&self) -> String {
        let info: Vec<String> = [("module", &self.module), ("namespace", &self.namespace)]
            .into_iter()
            .filter_map(|(label, value)| value.as_ref().map(|value| format!("{label}: {value}")))
            .collect();

        if info.is_empty() {
            self.name.as_str().to_owned()
        } else {
            format!("{} ({})", self.name.as_str(), info.join(", "))
        }
    }

    /// Copies backend draft flags onto the header.
    pub fn apply_state(&mut self, state: DraftState) {
        self.modified = state.modified;
        self.outdated = state.outdated;
    }

    pub(crate) fn security_mut(&mut self) -> &mut SecuritySettings {
        &mut self.security
    }
}

#[cfg(test)]
mod tests {
    use schemata_core::EntityId;

    use super::{DraftState, EntityDraft};

    #[test]
    fn entity_requires_name() {
        assert!(EntityDraft::new(EntityId::new(1), " ").is_err());
    }

    #[test]
    fn label_includes_module_and_namespace_when_present() {
        let entity = EntityDraft::new(EntityId::new(1), "Patient")
            .unwrap_or_else(|_| unreachable!())
            .with_origin(Some("clinic".to_owned()), Some(" ".to_owned()));
        assert_eq!(entity.label(), "Patient (module: clinic)");
    }

    #[test]
    fn apply_state_copies_flags() {
        let mut entity =
            EntityDraft::new(EntityId::new(1), "Patient").unwrap_or_else(|_| unreachable!());
        entity.apply_state(DraftState {
            modified: true,
            outdated: true,
        });
        assert!(entity.is_modified());
        assert!(entity.is_outdated());
    }
}
