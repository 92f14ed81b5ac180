//! Core types for the RAG crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form key/value attributes carried from documents onto their chunks.
pub type Attributes = BTreeMap<String, String>;

/// A cleaned complaint narrative ready for chunking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identifier, unique within a build.
    pub id: String,
    /// Primary category (the product line).
    pub category: String,
    /// Secondary category (the issue).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_category: Option<String>,
    /// Submission date as provided by the source table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<String>,
    /// Other scalar columns.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    /// Cleaned narrative text.
    pub text: String,
}

impl Document {
    /// Creates a document with only the required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, category: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            secondary_category: None,
            submitted: None,
            attributes: Attributes::new(),
            text: text.into(),
        }
    }

    /// Sets the secondary category.
    #[must_use]
    pub fn with_secondary_category(mut self, value: impl Into<String>) -> Self {
        self.secondary_category = Some(value.into());
        self
    }

    /// Sets the submission date.
    #[must_use]
    pub fn with_submitted(mut self, value: impl Into<String>) -> Self {
        self.submitted = Some(value.into());
        self
    }

    /// Adds a free-form attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// One chunk of a document, as stored in a snapshot's metadata rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// `<document_id>_<ordinal>`.
    pub chunk_id: String,
    /// Parent document identifier.
    pub document_id: String,
    /// Zero-based position of the chunk within its document.
    pub ordinal: usize,
    /// Parent category.
    pub category: String,
    /// Parent secondary category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_category: Option<String>,
    /// Parent submission date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted: Option<String>,
    /// Parent free-form attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    /// Chunk text.
    pub text: String,
}

impl ChunkRecord {
    /// Creates the `ordinal`-th chunk of `document` holding `text`.
    #[must_use]
    pub fn from_document(document: &Document, ordinal: usize, text: String) -> Self {
        Self {
            chunk_id: chunk_id(&document.id, ordinal),
            document_id: document.id.clone(),
            ordinal,
            category: document.category.clone(),
            secondary_category: document.secondary_category.clone(),
            submitted: document.submitted.clone(),
            attributes: document.attributes.clone(),
            text,
        }
    }

    /// Looks up a field by name.
    ///
    /// Named fields (`chunk_id`, `document_id`, `category`, `secondary_category`, `submitted`)
    /// take precedence over free-form attributes.
    #[must_use]
    pub fn attribute(&self, field: &str) -> Option<&str> {
        match field {
            "chunk_id" => Some(&self.chunk_id),
            "document_id" => Some(&self.document_id),
            "category" => Some(&self.category),
            "secondary_category" => self.secondary_category.as_deref(),
            "submitted" => self.submitted.as_deref(),
            other => self.attributes.get(other).map(String::as_str),
        }
    }
}

/// Builds the identifier of the `ordinal`-th chunk of `document_id`.
#[must_use]
pub fn chunk_id(document_id: &str, ordinal: usize) -> String {
    format!("{document_id}_{ordinal}")
}

/// A ranked chunk returned by retrieval. Lives for one query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetrievalHit {
    /// One-based rank.
    pub rank: usize,
    /// Inner-product similarity with the query.
    pub score: f32,
    /// Position of the chunk in the snapshot.
    pub position: usize,
    /// The chunk row.
    pub record: ChunkRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_copies_parent_attributes() {
        let doc = Document::new("42", "Credit card", "text")
            .with_secondary_category("Billing dispute")
            .with_submitted("2023-05-01")
            .with_attribute("company", "Acme");
        let record = ChunkRecord::from_document(&doc, 3, "window".into());

        assert_eq!(record.chunk_id, "42_3");
        assert_eq!(record.attribute("category"), Some("Credit card"));
        assert_eq!(record.attribute("secondary_category"), Some("Billing dispute"));
        assert_eq!(record.attribute("submitted"), Some("2023-05-01"));
        assert_eq!(record.attribute("company"), Some("Acme"));
        assert_eq!(record.attribute("state"), None);
    }

    #[test]
    fn optional_fields_are_omitted_from_json() {
        let doc = Document::new("1", "Personal loan", "body");
        let json = serde_json::to_string(&ChunkRecord::from_document(&doc, 0, "body".into())).unwrap();
        assert!(!json.contains("secondary_category"));
        assert!(!json.contains("attributes"));
    }
}
