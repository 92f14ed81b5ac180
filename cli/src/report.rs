//! Plain-text rendering of build progress, search hits, answers and snapshots.

use plaint_rag::{Answer, BuildProgress, BuildSnapshot, BuildStage, MetadataStore, RetrievalHit};
use std::fmt::Write as _;

/// One progress line, prefixed with the elapsed time.
#[must_use]
pub fn progress(progress: &BuildProgress) -> String {
    let message = match &progress.stage {
        BuildStage::Loading { documents } => format!("loaded {documents} documents"),
        BuildStage::Chunking { documents, chunks } => {
            format!("split {documents} documents into {chunks} chunks")
        }
        BuildStage::Embedding { batch, batches } => format!("embedded batch {batch}/{batches}"),
        BuildStage::Indexing => "building index".to_string(),
        BuildStage::Persisting => "writing snapshot".to_string(),
        BuildStage::Done {
            snapshot_id,
            chunks,
        } => format!("published snapshot {snapshot_id} ({chunks} chunks)"),
    };
    format!("[{:>7.1}s] {message}", progress.elapsed.as_secs_f64())
}

/// Snapshot identity, build parameters and per-category chunk counts.
#[must_use]
pub fn summary(snapshot: &BuildSnapshot) -> String {
    let params = snapshot.params();
    let metadata = snapshot.metadata();
    let mut out = String::new();
    let _ = writeln!(out, "snapshot   {}", snapshot.id());
    let _ = writeln!(out, "model      {} ({} dimensions)", params.model_id, params.dimension);
    let _ = writeln!(
        out,
        "chunking   {} words, {} overlap",
        params.chunk_size, params.chunk_overlap
    );
    let _ = writeln!(out, "documents  {}", metadata.document_count());
    let _ = writeln!(out, "chunks     {}", snapshot.len());
    let counts = metadata.category_counts();
    if !counts.is_empty() {
        let _ = writeln!(out, "categories");
        let width = counts.keys().map(|name| name.chars().count()).max().unwrap_or(0);
        for (category, count) in counts {
            let _ = writeln!(out, "  {category:<width$}  {count}");
        }
    }
    out
}

/// Ranked hits with their citation fields and the leading `excerpt_chars` of each chunk.
#[must_use]
pub fn hits(hits: &[RetrievalHit], excerpt_chars: usize) -> String {
    if hits.is_empty() {
        return "no matching chunks\n".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        let record = &hit.record;
        let _ = write!(
            out,
            "{:>2}. {:.4}  {}  category={}",
            hit.rank, hit.score, record.chunk_id, record.category
        );
        if let Some(secondary) = &record.secondary_category {
            let _ = write!(out, "  secondary_category={secondary}");
        }
        if let Some(submitted) = &record.submitted {
            let _ = write!(out, "  submitted={submitted}");
        }
        let excerpt: String = record.text.chars().take(excerpt_chars).collect();
        let _ = writeln!(out, "\n    {excerpt}");
    }
    out
}

/// The answer followed by its display sources.
#[must_use]
pub fn answer(answer: &Answer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.answer);
    if answer.sources.is_empty() {
        return out;
    }
    let _ = writeln!(out, "\nSources:");
    for source in &answer.sources {
        let _ = writeln!(
            out,
            "[{}] {} ({}, score {:.4})",
            source.rank, source.chunk_id, source.category, source.score
        );
        let _ = writeln!(out, "    {}", source.excerpt);
    }
    out
}

/// Tab-separated chunk table with a header row.
#[must_use]
pub fn chunk_table(metadata: &MetadataStore) -> String {
    let mut out = String::from("chunk_id\tdocument_id\tordinal\tcategory\twords\n");
    for row in metadata.rows() {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            row.chunk_id,
            row.document_id,
            row.ordinal,
            row.category,
            row.text.split_whitespace().count()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaint_rag::{
        Document, Embedder, HashEmbedder, SnapshotBuilder, SnapshotStore, Source,
        WordWindowChunker,
    };
    use std::sync::Arc;
    use std::time::Duration;

    async fn snapshot(root: &std::path::Path) -> BuildSnapshot {
        let builder = SnapshotBuilder::new(
            Arc::new(Embedder::new(HashEmbedder::new(16).unwrap())),
            WordWindowChunker::new(3, 1).unwrap(),
            SnapshotStore::new(root),
        );
        builder
            .build(&[
                Document::new("A", "Credit card", "charged a late fee twice"),
                Document::new("B", "Mortgage", "escrow shortage"),
            ])
            .await
            .unwrap()
    }

    #[test]
    fn formats_progress_stages() {
        let line = progress(&BuildProgress {
            stage: BuildStage::Embedding {
                batch: 2,
                batches: 5,
            },
            elapsed: Duration::from_millis(1500),
        });
        assert_eq!(line, "[    1.5s] embedded batch 2/5");
    }

    #[tokio::test]
    async fn summarises_snapshot_and_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = snapshot(dir.path()).await;

        let text = summary(&snapshot);
        assert!(text.contains(snapshot.id()));
        assert!(text.contains("hash:16 (16 dimensions)"));
        assert!(text.contains("chunks     3"));
        assert!(text.contains("  Credit card  2"));
        assert!(text.contains("  Mortgage     1"));

        let table = chunk_table(snapshot.metadata());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "A_0\tA\t0\tCredit card\t3");
        assert_eq!(lines[3], "B_0\tB\t0\tMortgage\t2");
    }

    #[test]
    fn renders_answer_sources() {
        let rendered = answer(&Answer {
            answer: "Customers report duplicate fees.".into(),
            sources: vec![Source {
                rank: 1,
                score: 0.5,
                chunk_id: "A_0".into(),
                document_id: "A".into(),
                category: "Credit card".into(),
                secondary_category: None,
                submitted: None,
                excerpt: "charged a late".into(),
            }],
            k: 5,
        });
        assert!(rendered.starts_with("Customers report duplicate fees.\n\nSources:\n"));
        assert!(rendered.contains("[1] A_0 (Credit card, score 0.5000)"));
    }

    #[test]
    fn empty_hits_say_so() {
        assert_eq!(hits(&[], 100), "no matching chunks\n");
    }
}
