use schemata_core::{AppError, AppResult, FieldId};
use serde::{Deserialize, Serialize};

use crate::FieldDefinition;

/// Ordered set of fields belonging to one entity draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldRegistry {
    fields: Vec<FieldDefinition>,
}

impl FieldRegistry {
    /// Creates a registry from fields in display order.
    #[must_use]
    pub fn new(fields: Vec<FieldDefinition>) -> Self {
        Self { fields }
    }

    /// Returns all fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Returns all field identifiers in order.
    #[must_use]
    pub fn ids(&self) -> Vec<FieldId> {
        self.fields.iter().map(FieldDefinition::id).collect()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the registry holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Finds a field by identifier.
    #[must_use]
    pub fn find_by_id(&self, id: FieldId) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.id() == id)
    }

    /// Returns every field whose name matches exactly. Callers check
    /// uniqueness by comparing the length with one.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Vec<&FieldDefinition> {
        self.fields
            .iter()
            .filter(|field| field.basic().name() == name)
            .collect()
    }

    /// Returns whether exactly one field carries the given name.
    #[must_use]
    pub fn is_unique_name(&self, name: &str) -> bool {
        self.find_by_name(name).len() == 1
    }

    /// Returns the identifier a newly created field receives.
    #[must_use]
    pub fn next_id(&self) -> FieldId {
        self.fields
            .iter()
            .map(FieldDefinition::id)
            .max()
            .map(|id| id.next())
            .unwrap_or_else(|| FieldId::new(1))
    }

    /// Appends a field. Identifiers must be unique within the registry.
    pub fn add(&mut self, field: FieldDefinition) -> AppResult<()> {
        if self.find_by_id(field.id()).is_some() {
            return Err(AppError::Validation(format!(
                "field with id {} already exists",
                field.id()
            )));
        }

        self.fields.push(field);
        Ok(())
    }

    /// Removes a field and returns it.
    pub fn remove(&mut self, id: FieldId) -> AppResult<FieldDefinition> {
        let position = self
            .fields
            .iter()
            .position(|field| field.id() == id)
            .ok_or_else(|| AppError::NotFound(format!("field with id {id} does not exist")))?;

        Ok(self.fields.remove(position))
    }

    pub(crate) fn find_by_id_mut(&mut self, id: FieldId) -> AppResult<&mut FieldDefinition> {
        self.fields
            .iter_mut()
            .find(|field| field.id() == id)
            .ok_or_else(|| AppError::NotFound(format!("field with id {id} does not exist")))
    }
}
