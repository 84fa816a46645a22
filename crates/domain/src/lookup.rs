use schemata_core::{AppError, AppResult, FieldId, LookupId};
use serde::{Deserialize, Serialize};

/// Named, ordered set of fields used to query entity instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupDefinition {
    id: LookupId,
    name: String,
    single_object_return: bool,
    #[serde(default)]
    fields: Vec<FieldId>,
}

impl LookupDefinition {
    /// Creates a lookup definition.
    #[must_use]
    pub fn new(
        id: LookupId,
        name: impl Into<String>,
        single_object_return: bool,
        fields: Vec<FieldId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            single_object_return,
            fields,
        }
    }

    /// Returns the lookup identifier.
    #[must_use]
    pub fn id(&self) -> LookupId {
        self.id
    }

    /// Returns the lookup name. May be empty while the editor is typing.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns whether the lookup returns a single object.
    #[must_use]
    pub fn single_object_return(&self) -> bool {
        self.single_object_return
    }

    /// Returns lookup fields in order.
    #[must_use]
    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }
}

/// Lookups (indexes) defined over an entity's fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRegistry {
    lookups: Vec<LookupDefinition>,
    #[serde(skip)]
    name_conflict: bool,
}

impl LookupRegistry {
    /// Creates a registry from existing lookups.
    #[must_use]
    pub fn new(lookups: Vec<LookupDefinition>) -> Self {
        Self {
            lookups,
            name_conflict: false,
        }
    }

    /// Returns all lookups in order.
    #[must_use]
    pub fn lookups(&self) -> &[LookupDefinition] {
        &self.lookups
    }

    /// Returns the lookup at a position.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&LookupDefinition> {
        self.lookups.get(position)
    }

    /// Returns the number of lookups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    /// Returns whether no lookup is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    /// Returns the default name for a new lookup: `Lookup {n}` with the
    /// smallest `n` such that no existing name equals `lookup n` or
    /// `lookupn`, ignoring case.
    #[must_use]
    pub fn default_name(&self) -> String {
        let mut count: u32 = 1;
        loop {
            let spaced = format!("lookup {count}");
            let joined = format!("lookup{count}");
            let taken = self.lookups.iter().any(|lookup| {
                let lowered = lookup.name.to_lowercase();
                lowered == spaced || lowered == joined
            });

            if !taken {
                return format!("Lookup {count}");
            }
            count = count.saturating_add(1);
        }
    }

    /// Returns the identifier a newly added lookup receives.
    #[must_use]
    pub fn next_id(&self) -> LookupId {
        self.lookups
            .iter()
            .map(LookupDefinition::id)
            .max()
            .map(|id| id.next())
            .unwrap_or_else(|| LookupId::new(1))
    }

    /// Appends a new lookup returning single objects with no fields.
    pub fn add_index(&mut self, name: impl Into<String>) -> &LookupDefinition {
        let lookup = LookupDefinition::new(self.next_id(), name, true, Vec::new());
        let position = self.lookups.len();
        self.lookups.push(lookup);
        &self.lookups[position]
    }

    /// Removes the lookup at a position.
    pub fn remove_index(&mut self, position: usize) -> AppResult<LookupDefinition> {
        self.require_position(position)?;
        Ok(self.lookups.remove(position))
    }

    /// Renames the lookup at a position.
    pub fn rename_index(&mut self, position: usize, name: impl Into<String>) -> AppResult<()> {
        self.lookup_mut(position)?.name = name.into();
        Ok(())
    }

    /// Moves a lookup to a new position, shifting the others.
    pub fn move_index(&mut self, from: usize, to: usize) -> AppResult<()> {
        self.require_position(from)?;
        self.require_position(to)?;
        let lookup = self.lookups.remove(from);
        self.lookups.insert(to, lookup);
        Ok(())
    }

    /// Sets single-object-return semantics for a lookup.
    pub fn set_single_object_return(&mut self, position: usize, value: bool) -> AppResult<()> {
        self.lookup_mut(position)?.single_object_return = value;
        Ok(())
    }

    /// Appends a field to a lookup.
    pub fn add_lookup_field(&mut self, position: usize, field_id: FieldId) -> AppResult<()> {
        let lookup = self.lookup_mut(position)?;
        if lookup.fields.contains(&field_id) {
            return Err(AppError::Validation(format!(
                "field {field_id} is already part of lookup '{}'",
                lookup.name
            )));
        }

        lookup.fields.push(field_id);
        Ok(())
    }

    /// Removes a field from a lookup.
    pub fn remove_lookup_field(&mut self, position: usize, field_id: FieldId) -> AppResult<()> {
        let lookup = self.lookup_mut(position)?;
        let index = lookup
            .fields
            .iter()
            .rposition(|id| *id == field_id)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "field {field_id} is not part of lookup '{}'",
                    lookup.name
                ))
            })?;

        lookup.fields.remove(index);
        Ok(())
    }

    /// Replaces one lookup field with another, keeping its position.
    pub fn replace_lookup_field(
        &mut self,
        position: usize,
        old_field_id: FieldId,
        new_field_id: FieldId,
    ) -> AppResult<()> {
        let lookup = self.lookup_mut(position)?;
        let index = lookup
            .fields
            .iter()
            .position(|id| *id == old_field_id)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "field {old_field_id} is not part of lookup '{}'",
                    lookup.name
                ))
            })?;

        if old_field_id != new_field_id && lookup.fields.contains(&new_field_id) {
            return Err(AppError::Validation(format!(
                "field {new_field_id} is already part of lookup '{}'",
                lookup.name
            )));
        }

        lookup.fields[index] = new_field_id;
        Ok(())
    }

    /// Returns fields not yet used by the lookup, in the order of `all_fields`.
    pub fn available_fields(
        &self,
        position: usize,
        all_fields: &[FieldId],
    ) -> AppResult<Vec<FieldId>> {
        self.require_position(position)?;
        let selected = &self.lookups[position].fields;

        Ok(all_fields
            .iter()
            .filter(|field_id| !selected.contains(field_id))
            .copied()
            .collect())
    }

    /// Drops a field from every lookup.
    pub fn purge_field(&mut self, field_id: FieldId) {
        for lookup in &mut self.lookups {
            lookup.fields.retain(|id| *id != field_id);
        }
    }

    /// Checks whether more than one lookup carries exactly `name` and sets
    /// or clears the blocking conflict flag accordingly.
    pub fn validate_lookup_name(&mut self, name: &str) -> bool {
        let matches = self
            .lookups
            .iter()
            .filter(|lookup| lookup.name == name)
            .count();
        self.name_conflict = matches > 1;
        self.name_conflict
    }

    /// Returns whether the last name validation found a duplicate.
    #[must_use]
    pub fn has_name_conflict(&self) -> bool {
        self.name_conflict
    }

    /// Clears the conflict flag.
    pub fn clear_name_conflict(&mut self) {
        self.name_conflict = false;
    }

    /// Returns the position of the first lookup whose exact name is shared
    /// with another lookup.
    #[must_use]
    pub fn first_duplicate_position(&self) -> Option<usize> {
        self.lookups.iter().position(|lookup| {
            self.lookups
                .iter()
                .filter(|other| other.name == lookup.name)
                .count()
                > 1
        })
    }

    /// Returns names shared by more than one lookup, exact match.
    #[must_use]
    pub fn duplicate_names(&self) -> Vec<String> {
        let mut duplicates: Vec<String> = Vec::new();
        for (position, lookup) in self.lookups.iter().enumerate() {
            let repeated = self.lookups[position + 1..]
                .iter()
                .any(|other| other.name == lookup.name);
            if repeated && !duplicates.contains(&lookup.name) {
                duplicates.push(lookup.name.clone());
            }
        }
        duplicates
    }

    fn require_position(&self, position: usize) -> AppResult<()> {
        if position >= self.lookups.len() {
            return Err(AppError::Validation(format!(
                "lookup position {position} is out of range"
            )));
        }
        Ok(())
    }

    fn lookup_mut(&mut self, position: usize) -> AppResult<&mut LookupDefinition> {
        self.lookups.get_mut(position).ok_or_else(|| {
            AppError::Validation(format!("lookup position {position} is out of range"))
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use schemata_core::{FieldId, LookupId};

    use super::{LookupDefinition, LookupRegistry};

    #[test]
    fn default_name_skips_case_insensitive_collisions() {
        let registry = LookupRegistry::new(vec![
            LookupDefinition::new(LookupId::new(1), "LOOKUP 1", true, Vec::new()),
            LookupDefinition::new(LookupId::new(2), "lookup2", true, Vec::new()),
            LookupDefinition::new(LookupId::new(3), "Lookup 4", true, Vec::new()),
        ]);

        assert_eq!(registry.default_name(), "Lookup 3");
    }

    #[test]
    fn duplicate_name_validation_is_case_sensitive() {
        let mut registry = LookupRegistry::new(vec![
            LookupDefinition::new(LookupId::new(1), "byName", true, Vec::new()),
            LookupDefinition::new(LookupId::new(2), "ByName", true, Vec::new()),
        ]);

        assert!(!registry.validate_lookup_name("byName"));
        assert!(registry.duplicate_names().is_empty());

        assert!(registry.rename_index(1, "byName").is_ok());
        assert!(registry.validate_lookup_name("byName"));
        assert!(registry.has_name_conflict());
        assert_eq!(registry.duplicate_names(), vec!["byName".to_owned()]);
        assert_eq!(registry.first_duplicate_position(), Some(0));

        assert!(registry.rename_index(1, "byAge").is_ok());
        assert!(!registry.validate_lookup_name("byName"));
        assert!(!registry.has_name_conflict());
    }

    #[test]
    fn available_fields_track_add_replace_and_remove() {
        let all_fields = [FieldId::new(1), FieldId::new(2), FieldId::new(3)];
        let mut registry = LookupRegistry::default();
        let added_id = registry.add_index("Lookup 1").id();
        assert_eq!(added_id, LookupId::new(1));

        assert!(registry.add_lookup_field(0, FieldId::new(2)).is_ok());
        assert_eq!(
            registry.available_fields(0, &all_fields).unwrap_or_default(),
            vec![FieldId::new(1), FieldId::new(3)]
        );

        assert!(
            registry
                .replace_lookup_field(0, FieldId::new(2), FieldId::new(3))
                .is_ok()
        );
        assert_eq!(
            registry.available_fields(0, &all_fields).unwrap_or_default(),
            vec![FieldId::new(1), FieldId::new(2)]
        );

        assert!(registry.remove_lookup_field(0, FieldId::new(3)).is_ok());
        assert_eq!(
            registry.available_fields(0, &all_fields).unwrap_or_default(),
            all_fields.to_vec()
        );
    }

    #[test]
    fn lookup_field_edits_reject_inconsistent_requests() {
        let mut registry = LookupRegistry::default();
        registry.add_index("Lookup 1");
        assert!(registry.add_lookup_field(0, FieldId::new(1)).is_ok());
        assert!(registry.add_lookup_field(0, FieldId::new(2)).is_ok());

        assert!(registry.add_lookup_field(0, FieldId::new(1)).is_err());
        assert!(registry.remove_lookup_field(0, FieldId::new(9)).is_err());
        assert!(
            registry
                .replace_lookup_field(0, FieldId::new(1), FieldId::new(2))
                .is_err()
        );
        assert!(registry.add_lookup_field(4, FieldId::new(1)).is_err());
    }

    #[test]
    fn move_index_reorders_lookups() {
        let mut registry = LookupRegistry::default();
        registry.add_index("a");
        registry.add_index("b");
        registry.add_index("c");

        assert!(registry.move_index(2, 0).is_ok());
        let names: Vec<&str> = registry.lookups().iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
        assert!(registry.move_index(0, 3).is_err());
    }

    #[test]
    fn purge_field_removes_it_from_every_lookup() {
        let mut registry = LookupRegistry::default();
        registry.add_index("a");
        registry.add_index("b");
        assert!(registry.add_lookup_field(0, FieldId::new(7)).is_ok());
        assert!(registry.add_lookup_field(1, FieldId::new(7)).is_ok());
        assert!(registry.add_lookup_field(1, FieldId::new(8)).is_ok());

        registry.purge_field(FieldId::new(7));

        assert!(registry.lookups()[0].fields().is_empty());
        assert_eq!(registry.lookups()[1].fields(), &[FieldId::new(8)]);
    }

    proptest! {
        #[test]
        fn generated_names_follow_lookup_sequence(count in 1_usize..25) {
            let mut registry = LookupRegistry::default();
            for _ in 0..count {
                let name = registry.default_name();
                registry.add_index(name);
            }

            let names: Vec<String> = registry
                .lookups()
                .iter()
                .map(|lookup| lookup.name().to_owned())
                .collect();
            let expected: Vec<String> = (1..=count).map(|n| format!("Lookup {n}")).collect();
            prop_assert_eq!(names, expected);
            prop_assert!(registry.duplicate_names().is_empty());
        }

        #[test]
        fn generated_name_uses_smallest_free_number(
            taken in proptest::collection::btree_set(1_u32..12, 0..8)
        ) {
            let lookups = taken
                .iter()
                .enumerate()
                .map(|(position, n)| {
                    let name = if position % 2 == 0 {
                        format!("LOOKUP {n}")
                    } else {
                        format!("lookup{n}")
                    };
                    LookupDefinition::new(LookupId::new(position as i64 + 1), name, true, Vec::new())
                })
                .collect();
            let registry = LookupRegistry::new(lookups);
            let smallest_free = (1_u32..).find(|n| !taken.contains(n)).unwrap_or(1);

            prop_assert_eq!(registry.default_name(), format!("Lookup {smallest_free}"));
        }
    }
}
