//! Bounded prompt assembly from retrieved evidence.
//!
//! Each hit becomes one citation line, `[rank] label=value, ...: text`, and the lines are
//! joined with `\n` in rank order. The joined context is cut to a character budget. A citation
//! whose header would be cut is dropped whole; a citation whose body is cut keeps the part that
//! fits.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::types::RetrievalHit;

/// Instruction header preceding the context.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a financial analyst assistant for CrediTrust. \
Your task is to answer questions about customer complaints. \
Use ONLY the following retrieved complaint excerpts to formulate your answer. \
If the context doesn't contain the answer, say you don't have enough information.";

/// A field rendered into citation headers: `label=value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationField {
    /// Name shown in the prompt.
    pub label: String,
    /// Chunk attribute the value is read from.
    pub field: String,
}

impl CitationField {
    /// Renders `field` under `label`.
    pub fn new(label: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            field: field.into(),
        }
    }
}

/// Fields cited by default: product, issue and submission date.
#[must_use]
pub fn default_citation_fields() -> Vec<CitationField> {
    vec![
        CitationField::new("product", "category"),
        CitationField::new("issue", "secondary_category"),
        CitationField::new("date", "submitted"),
    ]
}

/// An assembled prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Bounded citation context.
    pub context: String,
    /// Number of citations present in the context, including a truncated last one.
    pub citations: usize,
    /// Whether the context was cut to fit the budget.
    pub truncated: bool,
    /// Full prompt text: instructions, context, question.
    pub text: String,
}

/// Renders hits and a question into a [`Prompt`] under a character budget.
///
/// ```rust
/// use plaint_rag::PromptAssembler;
///
/// let prompt = PromptAssembler::new(100).unwrap().assemble("Why?", &[]);
/// assert!(prompt.text.ends_with("Question: Why?\nAnswer:"));
/// assert!(prompt.context.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_chars: usize,
    instructions: String,
    fields: Vec<CitationField>,
}

impl PromptAssembler {
    /// Creates an assembler with a context budget of `max_chars` characters.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidPromptBudget`] when `max_chars` is zero.
    pub fn new(max_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(RagError::InvalidPromptBudget);
        }
        Ok(Self {
            max_chars,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            fields: default_citation_fields(),
        })
    }

    /// Replaces the instruction header.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Replaces the cited fields.
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<CitationField>) -> Self {
        self.fields = fields;
        self
    }

    /// Context budget in characters.
    #[must_use]
    pub const fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Assembles the prompt. Deterministic for identical inputs.
    #[must_use]
    pub fn assemble(&self, question: &str, hits: &[RetrievalHit]) -> Prompt {
        let mut context = String::new();
        let mut used = 0;
        let mut citations = 0;
        let mut truncated = false;

        for hit in hits {
            let separator = usize::from(citations > 0);
            let header = self.header(hit);
            let header_chars = header.chars().count();
            let body_chars = hit.record.text.chars().count();

            // The cut must fall strictly inside the body for a citation to survive it.
            let remaining = self.max_chars - used;
            if (separator + header_chars >= remaining && body_chars > 0)
                || separator + header_chars > remaining
            {
                truncated = true;
                break;
            }

            if separator == 1 {
                context.push('\n');
            }
            context.push_str(&header);
            let room = remaining - separator - header_chars;
            citations += 1;
            if body_chars > room {
                context.extend(hit.record.text.chars().take(room));
                truncated = true;
                break;
            }
            context.push_str(&hit.record.text);
            used += separator + header_chars + body_chars;
        }

        let text = format!(
            "{}\n\nContext:\n{context}\n\nQuestion: {question}\nAnswer:",
            self.instructions
        );
        Prompt {
            context,
            citations,
            truncated,
            text,
        }
    }

    fn header(&self, hit: &RetrievalHit) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{}={}", f.label, hit.record.attribute(&f.field).unwrap_or_default()))
            .collect();
        format!("[{}] {}: ", hit.rank, fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkRecord, Document};

    fn hit(rank: usize, category: &str, text: &str) -> RetrievalHit {
        let doc = Document::new(format!("D{rank}"), category, text)
            .with_secondary_category("Fees")
            .with_submitted("2024-01-02");
        RetrievalHit {
            rank,
            score: 1.0,
            position: rank - 1,
            record: ChunkRecord::from_document(&doc, 0, text.to_string()),
        }
    }

    fn hits() -> Vec<RetrievalHit> {
        vec![
            hit(1, "Credit card", "late fee charged twice"),
            hit(2, "Personal loan", "servicer ignored my payoff request"),
            hit(3, "Credit card", "interest raised"),
        ]
    }

    #[test]
    fn renders_citations_in_rank_order() {
        let prompt = PromptAssembler::new(10_000).unwrap().assemble("What went wrong?", &hits());
        let lines: Vec<&str> = prompt.context.lines().collect();

        assert_eq!(
            lines[0],
            "[1] product=Credit card, issue=Fees, date=2024-01-02: late fee charged twice"
        );
        assert!(lines[1].starts_with("[2] product=Personal loan"));
        assert_eq!(lines.len(), 3);
        assert_eq!(prompt.citations, 3);
        assert!(!prompt.truncated);
        assert!(prompt.text.starts_with(DEFAULT_INSTRUCTIONS));
        assert!(prompt.text.contains("\n\nContext:\n[1] product=Credit card"));
        assert!(prompt.text.ends_with("\n\nQuestion: What went wrong?\nAnswer:"));
    }

    #[test]
    fn missing_fields_render_empty() {
        let doc = Document::new("Z", "Savings account", "text");
        let hit = RetrievalHit {
            rank: 1,
            score: 0.5,
            position: 0,
            record: ChunkRecord::from_document(&doc, 0, "text".into()),
        };
        let prompt = PromptAssembler::new(500).unwrap().assemble("q", &[hit]);
        assert_eq!(prompt.context, "[1] product=Savings account, issue=, date=: text");
    }

    #[test]
    fn budget_is_never_exceeded_and_headers_stay_whole() {
        let hits = hits();
        let full = PromptAssembler::new(10_000).unwrap().assemble("q", &hits).context;
        let full_len = full.chars().count();

        for budget in 1..=full_len + 5 {
            let prompt = PromptAssembler::new(budget).unwrap().assemble("q", &hits);
            let len = prompt.context.chars().count();
            assert!(len <= budget, "budget {budget} produced {len} chars");
            assert!(full.starts_with(&prompt.context));
            assert_eq!(prompt.truncated, budget < full_len, "budget {budget}");

            for line in prompt.context.lines() {
                let header_end = line.find(": ").map(|i| i + 2);
                assert!(header_end.is_some_and(|end| end < line.len()), "partial citation {line:?}");
            }
            assert!(!prompt.context.ends_with('\n'));
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let hit = hit(1, "Crédit", "épargne évolue");
        let full = PromptAssembler::new(10_000).unwrap().assemble("q", &[hit.clone()]).context;
        let budget = full.chars().count() - 3;
        let prompt = PromptAssembler::new(budget).unwrap().assemble("q", &[hit]);
        assert_eq!(prompt.context.chars().count(), budget);
        assert!(prompt.context.ends_with("épargne évo"));
    }

    #[test]
    fn zero_budget_is_rejected() {
        assert!(matches!(PromptAssembler::new(0), Err(RagError::InvalidPromptBudget)));
    }

    #[test]
    fn empty_hits_give_empty_context() {
        let prompt = PromptAssembler::new(10).unwrap().assemble("q", &[]);
        assert_eq!(prompt.citations, 0);
        assert!(prompt.text.contains("Context:\n\n\nQuestion: q"));
    }
}
