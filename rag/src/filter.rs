//! Attribute predicates for filtered retrieval.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::error::RagError;
use crate::types::ChunkRecord;

/// Decides whether a chunk takes part in a filtered query.
pub trait ChunkFilter: Send + Sync {
    /// Returns `true` if `record` should be searched.
    fn matches(&self, record: &ChunkRecord) -> bool;
}

impl<F> ChunkFilter for F
where
    F: Fn(&ChunkRecord) -> bool + Send + Sync,
{
    fn matches(&self, record: &ChunkRecord) -> bool {
        self(record)
    }
}

/// Conjunction of "field is one of these values" conditions.
///
/// A filter without conditions matches every chunk.
///
/// ```rust
/// use plaint_rag::Filter;
///
/// let filter: Filter = "category=Credit card|Buy Now, Pay Later".parse().unwrap();
/// assert_eq!(filter, Filter::new().category_in(["Credit card", "Buy Now, Pay Later"]));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    conditions: BTreeMap<String, BTreeSet<String>>,
}

impl Filter {
    /// Creates a filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the chunk category to be one of `values`.
    #[must_use]
    pub fn category_in<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_in("category", values)
    }

    /// Requires `field` to be one of `values`. Repeating a field widens its accepted set.
    #[must_use]
    pub fn attribute_in<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions
            .entry(field.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Merges the conditions of `other` into this filter.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        for (field, values) in other.conditions {
            self.conditions.entry(field).or_default().extend(values);
        }
        self
    }

    /// Returns `true` if the filter has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// The accepted values per field.
    #[must_use]
    pub const fn conditions(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.conditions
    }
}

impl ChunkFilter for Filter {
    fn matches(&self, record: &ChunkRecord) -> bool {
        self.conditions.iter().all(|(field, values)| {
            record
                .attribute(field)
                .is_some_and(|value| values.contains(value))
        })
    }
}

impl FromStr for Filter {
    type Err = RagError;

    /// Parses `field=value1|value2`. Values may contain commas.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RagError::InvalidConfig {
            key: "filter".into(),
            value: s.to_string(),
        };
        let (field, values) = s.split_once('=').ok_or_else(invalid)?;
        let field = field.trim();
        let values: Vec<&str> = values
            .split('|')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .collect();
        if field.is_empty() || values.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new().attribute_in(field, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    fn record(category: &str, company: &str) -> ChunkRecord {
        let doc = Document::new("1", category, "text").with_attribute("company", company);
        ChunkRecord::from_document(&doc, 0, "text".into())
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::new().matches(&record("X", "Acme")));
    }

    #[test]
    fn conditions_are_conjunctive_and_values_disjunctive() {
        let filter = Filter::new()
            .category_in(["X", "Y"])
            .attribute_in("company", ["Acme"]);
        assert!(filter.matches(&record("X", "Acme")));
        assert!(filter.matches(&record("Y", "Acme")));
        assert!(!filter.matches(&record("Z", "Acme")));
        assert!(!filter.matches(&record("X", "Globex")));
    }

    #[test]
    fn missing_field_never_matches() {
        let filter = Filter::new().attribute_in("state", ["CA"]);
        assert!(!filter.matches(&record("X", "Acme")));
    }

    #[test]
    fn closures_are_filters() {
        let filter = |row: &ChunkRecord| row.category.starts_with('X');
        assert!(filter.matches(&record("X1", "Acme")));
    }

    #[test]
    fn parses_field_and_values() {
        let filter: Filter = "company = Acme | Globex".parse().unwrap();
        assert!(filter.matches(&record("X", "Globex")));
        assert!("category".parse::<Filter>().is_err());
        assert!("=X".parse::<Filter>().is_err());
        assert!("category=".parse::<Filter>().is_err());
    }

    #[test]
    fn and_merges_conditions() {
        let filter = Filter::new()
            .category_in(["X"])
            .and(Filter::new().attribute_in("company", ["Acme"]));
        assert_eq!(filter.conditions().len(), 2);
    }
}
