//! Index over a filtered subset of a snapshot.

use crate::error::{RagError, Result};

use super::{FlatIndex, Scored, VectorIndex};

/// A materialized subset: global positions paired with a local index over their vectors.
///
/// Local row `i` holds the vector of global position `positions[i]`. Positions are strictly
/// ascending, so ranking ties on local rows resolve in the same order as on global positions.
#[derive(Debug, Clone)]
pub struct SubsetIndex {
    positions: Vec<usize>,
    index: FlatIndex,
}

impl SubsetIndex {
    /// Pairs global `positions` with an index holding one row per position.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the counts differ, or
    /// [`RagError::Index`] if the positions are not strictly ascending.
    pub fn new(positions: Vec<usize>, index: FlatIndex) -> Result<Self> {
        if positions.len() != index.len() {
            return Err(RagError::DimensionMismatch {
                expected: positions.len(),
                actual: index.len(),
            });
        }
        if positions.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(RagError::Index(
                "subset positions must be strictly ascending".into(),
            ));
        }
        Ok(Self { positions, index })
    }

    /// Selects `positions` out of `parent`, reusing its stored vectors.
    ///
    /// # Errors
    ///
    /// Fails if a position is out of range or the positions are not strictly ascending.
    pub fn from_parent(parent: &FlatIndex, positions: Vec<usize>) -> Result<Self> {
        let index = parent.gather(&positions)?;
        Self::new(positions, index)
    }

    /// Global positions covered by this subset.
    #[must_use]
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }
}

impl VectorIndex for SubsetIndex {
    fn dimension(&self) -> usize {
        self.index.dimension()
    }

    fn len(&self) -> usize {
        self.positions.len()
    }

    /// Searches the subset and reports global positions.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Scored>> {
        Ok(self
            .index
            .search(query, k)?
            .into_iter()
            .map(|(score, local)| (score, self.positions[local]))
            .collect())
    }
}
