//! Question answering: retrieve, assemble, generate, cite.

use plaint_core::{
    EmbeddingModel, LanguageModel,
    llm::{Parameters, Request},
};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::filter::ChunkFilter;
use crate::generation::Generator;
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;
use crate::types::RetrievalHit;

/// System message sent ahead of every prompt.
pub const SYSTEM_MESSAGE: &str = "You are a concise, evidence-backed financial analyst assistant.";

/// A cited chunk shown alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    /// One-based retrieval rank.
    pub rank: usize,
    /// Similarity with the question.
    pub score: f32,
    /// Chunk identifier.
    pub chunk_id: String,
    /// Parent document identifier.
    pub document_id: String,
    /// Parent category.
    pub category: String,
    /// Parent secondary category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_category: Option<String>,
    /// Parent submission date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted: Option<String>,
    /// Leading characters of the chunk text.
    pub excerpt: String,
}

impl Source {
    fn from_hit(hit: &RetrievalHit, excerpt_chars: usize) -> Self {
        Self {
            rank: hit.rank,
            score: hit.score,
            chunk_id: hit.record.chunk_id.clone(),
            document_id: hit.record.document_id.clone(),
            category: hit.record.category.clone(),
            secondary_category: hit.record.secondary_category.clone(),
            submitted: hit.record.submitted.clone(),
            excerpt: hit.record.text.chars().take(excerpt_chars).collect(),
        }
    }
}

/// The answer to one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Generated text, trimmed.
    pub answer: String,
    /// Top-ranked sources, truncated for display.
    pub sources: Vec<Source>,
    /// Number of chunks requested from retrieval.
    pub k: usize,
}

/// Orchestrates retrieval, prompt assembly and generation.
///
/// Nothing is fabricated: a failed generation fails the answer.
#[derive(Debug)]
pub struct Composer<M, L> {
    retriever: Retriever<M>,
    assembler: PromptAssembler,
    generator: Generator<L>,
    parameters: Parameters,
    timeout: Option<Duration>,
    display_sources: usize,
    excerpt_chars: usize,
}

impl<M: EmbeddingModel, L: LanguageModel> Composer<M, L> {
    /// Default number of sources attached to an answer.
    pub const DEFAULT_DISPLAY_SOURCES: usize = 2;
    /// Default excerpt length in characters.
    pub const DEFAULT_EXCERPT_CHARS: usize = 500;

    /// Creates a composer with default display settings and no deadline.
    pub fn new(retriever: Retriever<M>, assembler: PromptAssembler, generator: Generator<L>) -> Self {
        Self {
            retriever,
            assembler,
            generator,
            parameters: Parameters::default(),
            timeout: None,
            display_sources: Self::DEFAULT_DISPLAY_SOURCES,
            excerpt_chars: Self::DEFAULT_EXCERPT_CHARS,
        }
    }

    /// Sets the sampling parameters sent with every request.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Sets the deadline attached to every generation request.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets how many sources are attached and how long their excerpts are.
    #[must_use]
    pub const fn with_display(mut self, sources: usize, excerpt_chars: usize) -> Self {
        self.display_sources = sources;
        self.excerpt_chars = excerpt_chars;
        self
    }

    /// The retriever.
    pub const fn retriever(&self) -> &Retriever<M> {
        &self.retriever
    }

    /// The generator.
    pub const fn generator(&self) -> &Generator<L> {
        &self.generator
    }

    /// Answers `question` from the top `k` chunks, optionally restricted by `filter`.
    ///
    /// An empty retrieval still produces a prompt with an empty context and a generation call.
    ///
    /// # Errors
    ///
    /// Propagates retrieval errors, and returns
    /// [`RagError::BackendUnavailable`](crate::RagError::BackendUnavailable) if generation fails.
    pub async fn answer_question(
        &self,
        question: &str,
        filter: Option<&dyn ChunkFilter>,
        k: usize,
    ) -> Result<Answer> {
        let hits = self.retriever.retrieve(question, filter, k).await?;
        let prompt = self.assembler.assemble(question, &hits);
        debug!(
            hits = hits.len(),
            citations = prompt.citations,
            truncated = prompt.truncated,
            prompt_chars = prompt.text.chars().count(),
            "assembled prompt"
        );

        let mut request = Request::oneshot(SYSTEM_MESSAGE, prompt.text)
            .with_parameters(self.parameters.clone());
        if let Some(timeout) = self.timeout {
            request = request.with_deadline(timeout);
        }
        let answer = self.generator.generate(request).await?;

        let sources: Vec<Source> = hits
            .iter()
            .take(self.display_sources)
            .map(|hit| Source::from_hit(hit, self.excerpt_chars))
            .collect();
        info!(k, hits = hits.len(), sources = sources.len(), "answered question");

        Ok(Answer {
            answer: answer.trim().to_string(),
            sources,
            k,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::error::RagError;
    use crate::filter::Filter;
    use crate::generation::tests::Scripted;
    use crate::index::FlatIndex;
    use crate::snapshot::{BuildParams, BuildSnapshot, SnapshotHandle};
    use crate::types::{ChunkRecord, Document};
    use plaint_core::llm::Deployment;
    use std::sync::Arc;

    async fn composer(replies: Vec<std::result::Result<&str, &str>>) -> Composer<HashEmbedder, Scripted> {
        let embedder = Arc::new(Embedder::new(HashEmbedder::new(64).unwrap()));
        let long = "word ".repeat(300);
        let docs = [
            Document::new("1", "Credit card", "late fee charged on my credit card").with_submitted("2024-02-01"),
            Document::new("2", "Credit card", long.trim()),
            Document::new("3", "Personal loan", "loan payment misapplied"),
        ];
        let rows: Vec<ChunkRecord> = docs
            .iter()
            .map(|doc| ChunkRecord::from_document(doc, 0, doc.text.clone()))
            .collect();
        let texts: Vec<String> = rows.iter().map(|row| row.text.clone()).collect();
        let vectors = embedder.embed(&texts).await.unwrap();
        let params = BuildParams {
            chunk_size: 400,
            chunk_overlap: 60,
            model_id: "hash:64".into(),
            dimension: 64,
        };
        let snapshot = BuildSnapshot::new(params, FlatIndex::build(64, vectors).unwrap(), rows).unwrap();
        let retriever = Retriever::new(embedder, Arc::new(SnapshotHandle::new(snapshot)));
        Composer::new(
            retriever,
            PromptAssembler::new(8192).unwrap(),
            Generator::new(Scripted::new(Deployment::Local, replies)),
        )
    }

    #[tokio::test]
    async fn answers_with_trimmed_text_and_two_sources() {
        let composer = composer(vec![Ok("  Customers report duplicate late fees.\n")]).await;
        let answer = composer.answer_question("late fee", None, 3).await.unwrap();

        assert_eq!(answer.answer, "Customers report duplicate late fees.");
        assert_eq!(answer.k, 3);
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].rank, 1);
        assert_eq!(answer.sources[0].document_id, "1");
        assert_eq!(answer.sources[0].submitted.as_deref(), Some("2024-02-01"));
        assert!(answer.sources.iter().all(|s| s.excerpt.chars().count() <= 500));

        let seen = composer.generator().model().seen.lock().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("[1] product=Credit card"));
        assert!(seen[0].ends_with("Question: late fee\nAnswer:"));
    }

    #[tokio::test]
    async fn long_excerpts_are_truncated() {
        let composer = composer(vec![Ok("ok")]).await;
        let filter = Filter::new().attribute_in("document_id", ["2"]);
        let answer = composer.answer_question("word", Some(&filter), 1).await.unwrap();
        assert_eq!(answer.sources[0].excerpt.chars().count(), 500);
    }

    #[tokio::test]
    async fn empty_retrieval_still_generates() {
        let composer = composer(vec![Ok("I don't have enough information.")]).await;
        let filter = Filter::new().category_in(["Mortgage"]);
        let answer = composer.answer_question("anything", Some(&filter), 5).await.unwrap();

        assert!(answer.sources.is_empty());
        let seen = composer.generator().model().seen.lock().clone();
        assert!(seen[0].contains("Context:\n\n\nQuestion: anything"));
    }

    #[tokio::test]
    async fn generation_failure_is_not_papered_over() {
        let composer = composer(vec![Err("model failed to load")]).await;
        let err = composer.answer_question("late fee", None, 2).await.unwrap_err();
        assert!(matches!(err, RagError::BackendUnavailable { .. }));
    }
}
