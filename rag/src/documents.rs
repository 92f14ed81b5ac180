//! JSON Lines document loading.
//!
//! Each non-blank line is one JSON object describing a cleaned complaint. Column names from the
//! cleaning step are accepted as aliases:
//!
//! | Field | Aliases |
//! |-------|---------|
//! | `id` | `complaint_id` |
//! | `category` | `product` |
//! | `secondary_category` | `issue` |
//! | `submitted` | `date_submitted` |
//! | `text` | `narrative_clean` |
//!
//! Any other scalar field becomes a free-form attribute. Records with blank text are skipped.

use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{RagError, Result};
use crate::types::{Attributes, Document};

const ID: &[&str] = &["id", "complaint_id"];
const CATEGORY: &[&str] = &["category", "product"];
const SECONDARY: &[&str] = &["secondary_category", "issue"];
const SUBMITTED: &[&str] = &["submitted", "date_submitted"];
const TEXT: &[&str] = &["text", "narrative_clean"];

/// Reads documents from a JSON Lines file.
///
/// # Errors
///
/// Returns [`RagError::Io`] if the file cannot be read, and the errors of
/// [`parse_documents`] otherwise.
pub fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let documents = parse_documents(BufReader::new(File::open(path)?))?;
    info!(path = %path.display(), documents = documents.len(), "loaded documents");
    Ok(documents)
}

/// Parses documents from JSON Lines.
///
/// # Errors
///
/// - [`RagError::Document`] for a line that is not a JSON object
/// - [`RagError::MissingAttribute`] for a record without id, category or text
pub fn parse_documents(reader: impl BufRead) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut skipped = 0;
    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let object = match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(RagError::Document {
                    line: line_number,
                    reason: "expected a JSON object".into(),
                });
            }
            Err(error) => {
                return Err(RagError::Document {
                    line: line_number,
                    reason: error.to_string(),
                });
            }
        };

        let document = parse_record(object, line_number)?;
        if document.text.trim().is_empty() {
            warn!(document = %document.id, line = line_number, "skipping document with blank text");
            skipped += 1;
            continue;
        }
        documents.push(document);
    }
    if skipped > 0 {
        debug!(skipped, "blank documents skipped");
    }
    Ok(documents)
}

fn parse_record(mut object: Map<String, Value>, line: usize) -> Result<Document> {
    let id = take(&mut object, ID).ok_or_else(|| RagError::MissingAttribute {
        document: format!("at line {line}"),
        attribute: ID[0].into(),
    })?;
    let missing = |attribute: &str| RagError::MissingAttribute {
        document: id.clone(),
        attribute: attribute.into(),
    };
    let category = take(&mut object, CATEGORY).ok_or_else(|| missing(CATEGORY[0]))?;
    // Blank text is kept here so the caller can skip the record instead of failing the load.
    let text = take_where(&mut object, TEXT, |_| true).ok_or_else(|| missing(TEXT[0]))?;
    let secondary_category = take(&mut object, SECONDARY);
    let submitted = take(&mut object, SUBMITTED);

    let attributes: Attributes = object
        .into_iter()
        .filter_map(|(key, value)| scalar(value).map(|value| (key, value)))
        .collect();

    Ok(Document {
        id,
        category,
        secondary_category,
        submitted,
        attributes,
        text,
    })
}

/// Removes every alias and returns the first non-blank scalar value.
fn take(object: &mut Map<String, Value>, aliases: &[&str]) -> Option<String> {
    take_where(object, aliases, |value| !value.trim().is_empty())
}

/// Removes every alias and returns the first scalar value accepted by `keep`.
fn take_where(
    object: &mut Map<String, Value>,
    aliases: &[&str],
    keep: impl Fn(&str) -> bool,
) -> Option<String> {
    let mut found = None;
    for alias in aliases {
        if let Some(value) = object.remove(*alias) {
            if found.is_none() {
                found = scalar(value).filter(|value| keep(value));
            }
        }
    }
    found
}

fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
