use std::collections::BTreeSet;

use schemata_core::{FieldId, LookupId};
use serde::{Deserialize, Serialize};

use crate::LookupRegistry;

/// REST exposure configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestOptions {
    field_ids: Vec<FieldId>,
    lookup_ids: BTreeSet<LookupId>,
}

impl RestOptions {
    /// Creates REST options.
    #[must_use]
    pub fn new(field_ids: Vec<FieldId>, lookup_ids: BTreeSet<LookupId>) -> Self {
        Self {
            field_ids,
            lookup_ids,
        }
    }

    /// Returns fields exposed over REST, in order.
    #[must_use]
    pub fn field_ids(&self) -> &[FieldId] {
        &self.field_ids
    }

    /// Returns lookups exposed over REST.
    #[must_use]
    pub fn lookup_ids(&self) -> &BTreeSet<LookupId> {
        &self.lookup_ids
    }

    pub(crate) fn set_field_ids(&mut self, field_ids: Vec<FieldId>) {
        self.field_ids = field_ids;
    }

    pub(crate) fn add_lookup(&mut self, lookup_id: LookupId) {
        self.lookup_ids.insert(lookup_id);
    }

    pub(crate) fn remove_lookup(&mut self, lookup_id: LookupId) {
        self.lookup_ids.remove(&lookup_id);
    }
}

/// Data browser configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowsingSettings {
    displayed_fields: Vec<FieldId>,
    filterable_fields: BTreeSet<FieldId>,
}

impl BrowsingSettings {
    /// Creates browsing settings.
    #[must_use]
    pub fn new(displayed_fields: Vec<FieldId>, filterable_fields: BTreeSet<FieldId>) -> Self {
        Self {
            displayed_fields,
            filterable_fields,
        }
    }

    /// Returns displayed fields, in column order.
    #[must_use]
    pub fn displayed_fields(&self) -> &[FieldId] {
        &self.displayed_fields
    }

    /// Returns fields offered as data browser filters.
    #[must_use]
    pub fn filterable_fields(&self) -> &BTreeSet<FieldId> {
        &self.filterable_fields
    }

    /// Returns whether at least one selected row sits below an unselected row.
    #[must_use]
    pub fn can_move_up(&self, selected: &BTreeSet<FieldId>) -> bool {
        can_shift(self.displayed_fields.iter(), selected)
    }

    /// Returns whether at least one selected row sits above an unselected row.
    #[must_use]
    pub fn can_move_down(&self, selected: &BTreeSet<FieldId>) -> bool {
        can_shift(self.displayed_fields.iter().rev(), selected)
    }

    /// Returns the displayed order after moving every selected row one step
    /// up. Rows already above the first unselected row stay in place.
    #[must_use]
    pub fn moved_up(&self, selected: &BTreeSet<FieldId>) -> Vec<FieldId> {
        let mut order = self.displayed_fields.clone();
        let Some(first_unselected) = order.iter().position(|id| !selected.contains(id)) else {
            return order;
        };

        for index in (first_unselected + 1)..order.len() {
            if selected.contains(&order[index]) {
                order.swap(index, index - 1);
            }
        }
        order
    }

    /// Returns the displayed order after moving every selected row one step
    /// down. Rows already below the last unselected row stay in place.
    #[must_use]
    pub fn moved_down(&self, selected: &BTreeSet<FieldId>) -> Vec<FieldId> {
        let mut order = self.displayed_fields.clone();
        let Some(last_unselected) = order.iter().rposition(|id| !selected.contains(id)) else {
            return order;
        };

        for index in (0..last_unselected).rev() {
            if selected.contains(&order[index]) {
                order.swap(index, index + 1);
            }
        }
        order
    }

    pub(crate) fn set_displayed_fields(&mut self, displayed_fields: Vec<FieldId>) {
        self.displayed_fields = displayed_fields;
    }

    pub(crate) fn push_displayed(&mut self, field_id: FieldId) {
        if !self.displayed_fields.contains(&field_id) {
            self.displayed_fields.push(field_id);
        }
    }

    pub(crate) fn add_filterable(&mut self, field_id: FieldId) {
        self.filterable_fields.insert(field_id);
    }

    pub(crate) fn remove_filterable(&mut self, field_id: FieldId) {
        self.filterable_fields.remove(&field_id);
    }
}

fn can_shift<'a>(rows: impl Iterator<Item = &'a FieldId>, selected: &BTreeSet<FieldId>) -> bool {
    let mut previous_selected = true;
    for row in rows {
        let is_selected = selected.contains(row);
        if !previous_selected && is_selected {
            return true;
        }
        previous_selected = is_selected;
    }
    false
}

/// Instance lifecycle action that can be recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedAction {
    /// Instance creation.
    Create,
    /// Instance update.
    Update,
    /// Instance deletion.
    Delete,
}

/// History tracking configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSettings {
    fields: BTreeSet<FieldId>,
    actions: BTreeSet<TrackedAction>,
}

impl TrackingSettings {
    /// Creates tracking settings.
    #[must_use]
    pub fn new(fields: BTreeSet<FieldId>, actions: BTreeSet<TrackedAction>) -> Self {
        Self { fields, actions }
    }

    /// Returns tracked fields.
    #[must_use]
    pub fn fields(&self) -> &BTreeSet<FieldId> {
        &self.fields
    }

    /// Returns tracked actions.
    #[must_use]
    pub fn actions(&self) -> &BTreeSet<TrackedAction> {
        &self.actions
    }

    pub(crate) fn add_field(&mut self, field_id: FieldId) {
        self.fields.insert(field_id);
    }

    pub(crate) fn remove_field(&mut self, field_id: FieldId) {
        self.fields.remove(&field_id);
    }

    pub(crate) fn add_action(&mut self, action: TrackedAction) {
        self.actions.insert(action);
    }

    pub(crate) fn remove_action(&mut self, action: TrackedAction) {
        self.actions.remove(&action);
    }
}

/// Lookups plus REST, browsing and tracking configuration of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedSettings {
    #[serde(default)]
    indexes: LookupRegistry,
    #[serde(default)]
    rest: RestOptions,
    #[serde(default)]
    browsing: BrowsingSettings,
    #[serde(default)]
    tracking: TrackingSettings,
}

impl AdvancedSettings {
    /// Creates advanced settings.
    #[must_use]
    pub fn new(
        indexes: LookupRegistry,
        rest: RestOptions,
        browsing: BrowsingSettings,
        tracking: TrackingSettings,
    ) -> Self {
        Self {
            indexes,
            rest,
            browsing,
            tracking,
        }
    }

    /// Returns the lookup registry.
    #[must_use]
    pub fn indexes(&self) -> &LookupRegistry {
        &self.indexes
    }

    /// Returns REST options.
    #[must_use]
    pub fn rest(&self) -> &RestOptions {
        &self.rest
    }

    /// Returns browsing settings.
    #[must_use]
    pub fn browsing(&self) -> &BrowsingSettings {
        &self.browsing
    }

    /// Returns tracking settings.
    #[must_use]
    pub fn tracking(&self) -> &TrackingSettings {
        &self.tracking
    }

    /// Returns the lookup registry for in-place edits such as name validation.
    pub fn indexes_mut(&mut self) -> &mut LookupRegistry {
        &mut self.indexes
    }

    pub(crate) fn rest_mut(&mut self) -> &mut RestOptions {
        &mut self.rest
    }

    pub(crate) fn browsing_mut(&mut self) -> &mut BrowsingSettings {
        &mut self.browsing
    }

    pub(crate) fn tracking_mut(&mut self) -> &mut TrackingSettings {
        &mut self.tracking
    }

    /// Removes every reference to a field.
    pub(crate) fn purge_field(&mut self, field_id: FieldId) {
        self.indexes.purge_field(field_id);
        self.rest.field_ids.retain(|id| *id != field_id);
        self.browsing.displayed_fields.retain(|id| *id != field_id);
        self.browsing.filterable_fields.remove(&field_id);
        self.tracking.fields.remove(&field_id);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use schemata_core::FieldId;

    use super::BrowsingSettings;

    fn ids(values: &[i64]) -> Vec<FieldId> {
        values.iter().copied().map(FieldId::new).collect()
    }

    fn selection(values: &[i64]) -> BTreeSet<FieldId> {
        values.iter().copied().map(FieldId::new).collect()
    }

    #[test]
    fn moving_up_shifts_selected_block_past_first_unselected_row() {
        let browsing = BrowsingSettings::new(ids(&[1, 2, 3, 4]), BTreeSet::new());

        assert_eq!(browsing.moved_up(&selection(&[3, 4])), ids(&[1, 3, 4, 2]));
        assert_eq!(browsing.moved_up(&selection(&[1, 3])), ids(&[1, 3, 2, 4]));
        assert_eq!(
            browsing.moved_up(&selection(&[1, 2, 3, 4])),
            ids(&[1, 2, 3, 4])
        );
    }

    #[test]
    fn moving_down_mirrors_moving_up() {
        let browsing = BrowsingSettings::new(ids(&[1, 2, 3, 4]), BTreeSet::new());

        assert_eq!(browsing.moved_down(&selection(&[1, 2])), ids(&[3, 1, 2, 4]));
        assert_eq!(browsing.moved_down(&selection(&[2, 4])), ids(&[1, 3, 2, 4]));
    }

    #[test]
    fn can_move_requires_a_selected_row_next_to_an_unselected_one() {
        let browsing = BrowsingSettings::new(ids(&[1, 2, 3]), BTreeSet::new());

        assert!(!browsing.can_move_up(&selection(&[])));
        assert!(!browsing.can_move_up(&selection(&[1])));
        assert!(browsing.can_move_up(&selection(&[2])));
        assert!(browsing.can_move_down(&selection(&[1])));
        assert!(!browsing.can_move_down(&selection(&[3])));
        assert!(!browsing.can_move_down(&selection(&[2, 3])));
    }
}
