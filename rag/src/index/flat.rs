//! Brute-force inner-product index.

use rayon::prelude::*;

use crate::error::{RagError, Result};

use super::{Scored, VectorIndex, dot, rank_top_k};

/// Exact k-NN index over a contiguous row-major buffer.
///
/// Scoring runs in parallel across rows; the index is immutable once built.
///
/// ```rust
/// use plaint_rag::index::{FlatIndex, VectorIndex};
///
/// let index = FlatIndex::build(2, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
/// let hits = index.search(&[0.0, 1.0], 1).unwrap();
/// assert_eq!(hits, vec![(1.0, 1)]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Builds an index from one vector per position.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if any vector has the wrong length.
    pub fn build(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for vector in vectors {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend(vector);
        }
        Ok(Self { dimension, data })
    }

    /// Rebuilds an index from its flattened buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if the buffer is not a whole number of rows.
    pub fn from_flat(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: data.len(),
            });
        }
        Ok(Self { dimension, data })
    }

    /// Gathers the rows at `positions` into a new index, in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] for an out-of-range position.
    pub fn gather(&self, positions: &[usize]) -> Result<Self> {
        let mut data = Vec::with_capacity(self.dimension * positions.len());
        for &position in positions {
            data.extend_from_slice(self.vector(position).ok_or(RagError::NotFound {
                position,
                len: self.len(),
            })?);
        }
        Ok(Self {
            dimension: self.dimension,
            data,
        })
    }

    /// Returns the vector at `position`.
    #[must_use]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Returns the flattened row-major buffer.
    #[must_use]
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the index, returning the flattened buffer.
    #[must_use]
    pub fn into_flat(self) -> Vec<f32> {
        self.data
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Scored>> {
        if k == 0 {
            return Err(RagError::InvalidK(k));
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        if self.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        let scored: Vec<Scored> = self
            .data
            .par_chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| (dot(query, row), position))
            .collect();
        Ok(rank_top_k(scored, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(angle: f32) -> Vec<f32> {
        vec![angle.cos(), angle.sin()]
    }

    fn sample() -> FlatIndex {
        FlatIndex::build(2, (0..6).map(|i| unit(i as f32 * 0.3)).collect()).unwrap()
    }

    #[test]
    fn returns_min_k_len_sorted_descending() {
        let index = sample();
        let hits = index.search(&unit(0.65), 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].0 >= w[1].0));
        assert_eq!(hits[0].1, 2);
    }

    #[test]
    fn k_beyond_len_returns_each_position_once() {
        let index = sample();
        let hits = index.search(&unit(0.0), 100).unwrap();
        let mut positions: Vec<usize> = hits.iter().map(|&(_, p)| p).collect();
        positions.sort_unstable();
        assert_eq!(positions, (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn ties_break_by_position() {
        let index = FlatIndex::build(2, vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]]).unwrap();
        let hits = index.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits, vec![(1.0, 1), (1.0, 2)]);
    }

    #[test]
    fn structural_errors() {
        let index = sample();
        assert!(matches!(index.search(&[1.0], 1), Err(RagError::DimensionMismatch { expected: 2, actual: 1 })));
        assert!(matches!(index.search(&[1.0, 0.0], 0), Err(RagError::InvalidK(0))));

        let empty = FlatIndex::build(2, Vec::new()).unwrap();
        assert!(matches!(empty.search(&[1.0, 0.0], 1), Err(RagError::EmptyIndex)));

        assert!(matches!(
            FlatIndex::build(2, vec![vec![1.0, 0.0, 0.0]]),
            Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(FlatIndex::from_flat(2, vec![1.0, 0.0, 1.0]).is_err());
    }

    #[test]
    fn gather_copies_rows_in_order() {
        let index = sample();
        let subset = index.gather(&[4, 1]).unwrap();
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.vector(0), index.vector(4));
        assert_eq!(subset.vector(1), index.vector(1));
        assert!(index.gather(&[6]).is_err());
    }
}
