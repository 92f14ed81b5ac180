//! Top-k retrieval over the published snapshot.

use plaint_core::EmbeddingModel;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::filter::ChunkFilter;
use crate::index::{FlatIndex, SubsetIndex, VectorIndex};
use crate::snapshot::{BuildSnapshot, SnapshotHandle};
use crate::types::RetrievalHit;

/// Where filtered queries get the vectors of the selected chunks from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilteredScoring {
    /// Reuse the vectors stored in the snapshot.
    #[default]
    Retained,
    /// Embed the selected chunk texts again for every query.
    Reembed,
}

impl FromStr for FilteredScoring {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retained" => Ok(Self::Retained),
            "reembed" | "re-embed" => Ok(Self::Reembed),
            _ => Err(RagError::InvalidConfig {
                key: "filtered_scoring".into(),
                value: s.to_string(),
            }),
        }
    }
}

/// Embeds questions and ranks the chunks of the current snapshot.
///
/// Unfiltered queries search the snapshot index directly. Filtered queries select the matching
/// positions, materialize a [`SubsetIndex`] over just those chunks and score it exactly, so an
/// all-matching filter returns the same ranking as no filter at all.
#[derive(Debug)]
pub struct Retriever<M> {
    embedder: Arc<Embedder<M>>,
    snapshots: Arc<SnapshotHandle>,
    scoring: FilteredScoring,
}

impl<M> Clone for Retriever<M> {
    fn clone(&self) -> Self {
        Self {
            embedder: Arc::clone(&self.embedder),
            snapshots: Arc::clone(&self.snapshots),
            scoring: self.scoring,
        }
    }
}

impl<M: EmbeddingModel> Retriever<M> {
    /// Creates a retriever reading from `snapshots`.
    pub const fn new(embedder: Arc<Embedder<M>>, snapshots: Arc<SnapshotHandle>) -> Self {
        Self {
            embedder,
            snapshots,
            scoring: FilteredScoring::Retained,
        }
    }

    /// Sets how filtered subsets are scored.
    #[must_use]
    pub const fn with_scoring(mut self, scoring: FilteredScoring) -> Self {
        self.scoring = scoring;
        self
    }

    /// The snapshot handle queries read from.
    pub const fn snapshots(&self) -> &Arc<SnapshotHandle> {
        &self.snapshots
    }

    /// The embedder used for questions.
    pub const fn embedder(&self) -> &Arc<Embedder<M>> {
        &self.embedder
    }

    /// Returns up to `k` chunks most similar to `question`, optionally restricted by `filter`.
    ///
    /// An empty snapshot or a filter matching nothing yields an empty list.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidK`] if `k` is zero
    /// - [`RagError::ModelMismatch`] if the embedder differs from the snapshot's
    /// - [`RagError::Embedding`] if embedding fails
    pub async fn retrieve(
        &self,
        question: &str,
        filter: Option<&dyn ChunkFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalHit>> {
        if k == 0 {
            return Err(RagError::InvalidK(k));
        }
        let snapshot = self.snapshots.load();
        self.embedder.ensure_compatible(snapshot.params())?;
        if snapshot.is_empty() {
            debug!(snapshot = snapshot.id(), "snapshot is empty");
            return Ok(Vec::new());
        }

        let query = self.embedder.embed_one(question).await?;
        let ranked = match filter {
            None => snapshot.index().search(&query, k)?,
            Some(filter) => {
                let positions = snapshot.select(filter);
                debug!(matched = positions.len(), total = snapshot.len(), "filter applied");
                if positions.is_empty() {
                    return Ok(Vec::new());
                }
                self.subset(&snapshot, positions).await?.search(&query, k)?
            }
        };

        let hits = snapshot.hits(&ranked)?;
        debug!(
            snapshot = snapshot.id(),
            k,
            returned = hits.len(),
            top_score = hits.first().map(|hit| hit.score),
            "retrieved"
        );
        Ok(hits)
    }

    async fn subset(&self, snapshot: &BuildSnapshot, positions: Vec<usize>) -> Result<SubsetIndex> {
        match self.scoring {
            FilteredScoring::Retained => snapshot.subset(positions),
            FilteredScoring::Reembed => {
                let texts = positions
                    .iter()
                    .map(|&position| Ok(snapshot.metadata().get(position)?.text.clone()))
                    .collect::<Result<Vec<_>>>()?;
                let vectors = self.embedder.embed(&texts).await?;
                let index = FlatIndex::build(snapshot.params().dimension, vectors)?;
                SubsetIndex::new(positions, index)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::filter::Filter;
    use crate::snapshot::BuildParams;
    use crate::types::{ChunkRecord, Document};

    async fn retriever(texts: &[(&str, &str)]) -> Retriever<HashEmbedder> {
        let embedder = Arc::new(Embedder::new(HashEmbedder::new(128).unwrap()));
        let rows: Vec<ChunkRecord> = texts
            .iter()
            .enumerate()
            .map(|(i, (category, text))| {
                let doc = Document::new(format!("D{i}"), *category, *text);
                ChunkRecord::from_document(&doc, 0, (*text).to_string())
            })
            .collect();
        let chunk_texts: Vec<String> = rows.iter().map(|row| row.text.clone()).collect();
        let vectors = embedder.embed(&chunk_texts).await.unwrap();
        let params = BuildParams {
            chunk_size: 400,
            chunk_overlap: 60,
            model_id: embedder.model_id().to_string(),
            dimension: embedder.dimension(),
        };
        let snapshot = BuildSnapshot::new(params, FlatIndex::build(128, vectors).unwrap(), rows).unwrap();
        Retriever::new(embedder, Arc::new(SnapshotHandle::new(snapshot)))
    }

    const CORPUS: &[(&str, &str)] = &[
        ("Credit card", "charged a late fee on my credit card after paying on time"),
        ("Personal loan", "loan servicer added fees to my personal loan balance"),
        ("Credit card", "credit card interest rate raised without notice"),
        ("Money transfer", "wire transfer never arrived at the destination bank"),
        ("Credit card", "fraudulent charges on credit card were not refunded"),
    ];

    #[tokio::test]
    async fn unfiltered_returns_min_k_in_rank_order() {
        let retriever = retriever(CORPUS).await;
        let hits = retriever.retrieve("credit card late fee", None, 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].record.document_id, "D0");
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2, 3]);

        let all = retriever.retrieve("anything", None, 50).await.unwrap();
        assert_eq!(all.len(), CORPUS.len());
    }

    #[tokio::test]
    async fn all_matching_filter_equals_unfiltered() {
        for scoring in [FilteredScoring::Retained, FilteredScoring::Reembed] {
            let retriever = retriever(CORPUS).await.with_scoring(scoring);
            let everything = |_: &ChunkRecord| true;
            let filtered = retriever.retrieve("fees on my loan", Some(&everything), 4).await.unwrap();
            let unfiltered = retriever.retrieve("fees on my loan", None, 4).await.unwrap();

            assert_eq!(filtered.len(), unfiltered.len());
            for (a, b) in filtered.iter().zip(&unfiltered) {
                assert_eq!(a.record.chunk_id, b.record.chunk_id);
                assert_eq!(a.rank, b.rank);
                assert!((a.score - b.score).abs() < 1e-5);
            }
        }
    }

    #[tokio::test]
    async fn filter_restricts_candidates() {
        let retriever = retriever(CORPUS).await;
        let filter = Filter::new().category_in(["Credit card"]);
        let hits = retriever.retrieve("bank transfer", Some(&filter), 5).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|hit| hit.record.category == "Credit card"));
    }

    #[tokio::test]
    async fn filter_matching_nothing_is_empty() {
        let retriever = retriever(CORPUS).await;
        let filter = Filter::new().category_in(["Mortgage"]);
        assert!(retriever.retrieve("anything", Some(&filter), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_k_is_rejected() {
        let retriever = retriever(CORPUS).await;
        assert!(matches!(retriever.retrieve("q", None, 0).await, Err(RagError::InvalidK(0))));
    }

    #[tokio::test]
    async fn model_mismatch_is_rejected() {
        let built = retriever(CORPUS).await;
        let other = Retriever::new(
            Arc::new(Embedder::new(HashEmbedder::new(64).unwrap())),
            Arc::clone(built.snapshots()),
        );
        let err = other.retrieve("q", None, 1).await.unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));
        assert!(err.is_configuration());
    }
}
