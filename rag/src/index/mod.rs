//! Exact vector indexes.
//!
//! Vectors are unit-normalized, so inner product equals cosine similarity. Every index ranks by
//! score descending and breaks ties by ascending position, which keeps results reproducible
//! across runs and identical between the full index and any subset of it.

mod flat;
mod subset;

pub use flat::FlatIndex;
pub use subset::SubsetIndex;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Reverse;

use crate::error::Result;

/// A scored position: `(similarity, position)`.
pub type Scored = (f32, usize);

/// Read-only nearest-neighbour search over a fixed set of vectors.
pub trait VectorIndex: Send + Sync {
    /// Returns the vector dimension.
    fn dimension(&self) -> usize;

    /// Returns the number of indexed vectors.
    fn len(&self) -> usize;

    /// Returns `true` if the index holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `min(k, len)` best positions for `query`.
    ///
    /// # Errors
    ///
    /// Fails for `k == 0`, an empty index or a query of the wrong dimension.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Scored>>;
}

/// Inner product of two equal-length vectors.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Sorts by score descending, then position ascending, and keeps the first `k`.
#[must_use]
pub fn rank_top_k(mut scored: Vec<Scored>, k: usize) -> Vec<Scored> {
    scored.par_sort_unstable_by_key(|&(score, position)| (Reverse(OrderedFloat(score)), position));
    scored.truncate(k);
    scored
}
