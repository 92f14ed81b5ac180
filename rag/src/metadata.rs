//! Position-addressed chunk rows.

use std::collections::BTreeMap;

use crate::error::{RagError, Result};
use crate::types::ChunkRecord;

/// Chunk rows aligned with an index: row `i` describes vector `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataStore {
    rows: Vec<ChunkRecord>,
}

impl MetadataStore {
    /// Wraps rows in index order.
    #[must_use]
    pub const fn new(rows: Vec<ChunkRecord>) -> Self {
        Self { rows }
    }

    /// Returns the row at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] for an out-of-range position.
    pub fn get(&self, position: usize) -> Result<&ChunkRecord> {
        self.rows.get(position).ok_or(RagError::NotFound {
            position,
            len: self.rows.len(),
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in position order.
    #[must_use]
    pub fn rows(&self) -> &[ChunkRecord] {
        &self.rows
    }

    /// Positions of the rows accepted by `predicate`, ascending.
    pub fn positions_where(&self, mut predicate: impl FnMut(&ChunkRecord) -> bool) -> Vec<usize> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(position, row)| predicate(row).then_some(position))
            .collect()
    }

    /// Number of chunks per category.
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.category.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Number of distinct parent documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        let mut ids: Vec<&str> = self.rows.iter().map(|row| row.document_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    fn store() -> MetadataStore {
        let a = Document::new("A", "Credit card", "x");
        let b = Document::new("B", "Personal loan", "y");
        MetadataStore::new(vec![
            ChunkRecord::from_document(&a, 0, "a0".into()),
            ChunkRecord::from_document(&a, 1, "a1".into()),
            ChunkRecord::from_document(&b, 0, "b0".into()),
        ])
    }

    #[test]
    fn get_is_position_addressed() {
        let store = store();
        assert_eq!(store.get(2).unwrap().chunk_id, "B_0");
        assert!(matches!(store.get(3), Err(RagError::NotFound { position: 3, len: 3 })));
    }

    #[test]
    fn selects_positions_in_order() {
        let store = store();
        assert_eq!(store.positions_where(|row| row.category == "Credit card"), vec![0, 1]);
        assert!(store.positions_where(|_| false).is_empty());
    }

    #[test]
    fn summary_counts() {
        let store = store();
        assert_eq!(store.document_count(), 2);
        let counts = store.category_counts();
        assert_eq!(counts.get("Credit card"), Some(&2));
        assert_eq!(counts.get("Personal loan"), Some(&1));
    }
}
