//! Client-only selection and ordering
//!
//! Everything here is pure and synchronous; nothing touches the transport.
//! Sorted views are a transform over catalog snapshots and never mutate the
//! stored insertion order.

use std::collections::HashSet;

use crate::catalog::{AssetId, AssetRecord};

/// Set of asset ids the user has marked selected
///
/// Invariant: only ids currently visible in the catalog. Writers that remove
/// ids from the catalog trim the selection in the same apply transition, so
/// the set never references a record that is gone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: HashSet<AssetId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &AssetId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterate the selected ids (unordered)
    pub fn ids(&self) -> impl Iterator<Item = &AssetId> {
        self.ids.iter()
    }

    pub(crate) fn toggle(&mut self, id: AssetId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    pub(crate) fn insert(&mut self, id: AssetId) {
        self.ids.insert(id);
    }

    pub(crate) fn remove(&mut self, id: &AssetId) {
        self.ids.remove(id);
    }

    pub(crate) fn clear(&mut self) {
        self.ids.clear();
    }
}

/// Field a sorted view orders by
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortField {
    Name,
    Size,
    Date,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Ordering applied to views of the catalog
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }
}

impl Default for SortSpec {
    /// Newest first
    fn default() -> Self {
        Self {
            field: SortField::Date,
            direction: SortDirection::Descending,
        }
    }
}

/// Stable sorted view over records; ties keep insertion order
///
/// Name ordering is case-insensitive.
pub fn sorted_view<'a>(
    records: impl IntoIterator<Item = &'a AssetRecord>,
    spec: SortSpec,
) -> Vec<&'a AssetRecord> {
    let mut view: Vec<&AssetRecord> = records.into_iter().collect();
    view.sort_by(|a, b| {
        let ordering = match spec.field {
            SortField::Name => a
                .display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase()),
            SortField::Size => a.file_size_bytes.cmp(&b.file_size_bytes),
            SortField::Date => a.created_at.cmp(&b.created_at),
        };
        match spec.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
    view
}
