//! Search types shared by the query translator and the backend strategies.
//!
//! A search request is parsed once into [`SearchParams`], translated into a
//! backend-neutral [`TranslatedQuery`], and executed by whichever strategy
//! the selector picks. Strategies own the mapping from neutral filter fields
//! to their native field names.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::Note;

// =============================================================================
// ENGINE SELECTION
// =============================================================================

/// The configured full-text search engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    /// Substring scan in the relational store
    Db,
    /// Elasticsearch cluster
    #[default]
    Elasticsearch,
    /// Meilisearch instance
    Meilisearch,
}

impl SearchEngine {
    /// Configuration name, as accepted by the `SEARCH_ENGINE` variable.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Db => "db",
            Self::Elasticsearch => "elasticsearch",
            Self::Meilisearch => "meilisearch",
        }
    }
}

impl std::fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SearchEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "db" | "database" => Ok(Self::Db),
            "elasticsearch" => Ok(Self::Elasticsearch),
            "meilisearch" => Ok(Self::Meilisearch),
            other => Err(Error::Config(format!("unknown search engine: {}", other))),
        }
    }
}

// =============================================================================
// QUERY TYPES
// =============================================================================

/// Parsed search request parameters, before translation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub user: Option<String>,
    pub course_id: Option<String>,
    /// Repeatable parameter; any value routes the request to the
    /// unpaginated relational path.
    pub usage_ids: Vec<String>,
    /// Full-text criterion. Presence of the key counts even when the
    /// value is empty.
    pub text: Option<String>,
    pub highlight: bool,
}

impl SearchParams {
    /// Whether this request carries a full-text criterion.
    pub fn is_text_search(&self) -> bool {
        self.text.is_some()
    }
}

/// A backend-neutral search query produced by the translator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslatedQuery {
    pub filters: Vec<FieldFilter>,
    pub text: Option<String>,
    pub highlight: bool,
}

impl TranslatedQuery {
    /// Find the filter on a given field, if any.
    pub fn filter(&self, field: FilterField) -> Option<&FilterValue> {
        self.filters
            .iter()
            .find(|f| f.field == field)
            .map(|f| &f.value)
    }

    /// Whether any usage filter is present.
    pub fn has_usage_filter(&self) -> bool {
        self.filter(FilterField::UsageId).is_some()
    }
}

/// A single exact-match constraint on a metadata field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: FilterField,
    pub value: FilterValue,
}

/// Metadata fields a search may be constrained by.
///
/// `User` maps to the storage column `user_id` and to the index document
/// field `user`; strategies own that rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    User,
    CourseId,
    UsageId,
}

/// Constraint value: a single term or any-of a set of terms.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Term(String),
    AnyOf(Vec<String>),
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// One page of search results from a backend strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub total: i64,
    pub rows: Vec<Note>,
}

impl SearchResult {
    pub fn empty() -> Self {
        Self {
            total: 0,
            rows: Vec::new(),
        }
    }
}

/// Marker wrapped around each highlighted match in returned text.
pub const HIGHLIGHT_START: &str = "{elasticsearch_highlight_start}";

/// Closing marker for a highlighted match.
pub const HIGHLIGHT_END: &str = "{elasticsearch_highlight_end}";

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_engine_parse_round_trip() {
        for (input, expected) in [
            ("db", SearchEngine::Db),
            ("database", SearchEngine::Db),
            ("elasticsearch", SearchEngine::Elasticsearch),
            ("Meilisearch", SearchEngine::Meilisearch),
        ] {
            assert_eq!(SearchEngine::from_str(input).unwrap(), expected);
        }
    }

    #[test]
    fn test_engine_parse_rejects_unknown() {
        assert!(SearchEngine::from_str("solr").is_err());
    }

    #[test]
    fn test_engine_default_is_elasticsearch() {
        assert_eq!(SearchEngine::default(), SearchEngine::Elasticsearch);
    }

    #[test]
    fn test_is_text_search_counts_empty_string() {
        let params = SearchParams {
            text: Some(String::new()),
            ..Default::default()
        };
        assert!(params.is_text_search());

        let no_text = SearchParams::default();
        assert!(!no_text.is_text_search());
    }

    #[test]
    fn test_translated_query_filter_lookup() {
        let query = TranslatedQuery {
            filters: vec![
                FieldFilter {
                    field: FilterField::User,
                    value: FilterValue::Term("u1".to_string()),
                },
                FieldFilter {
                    field: FilterField::UsageId,
                    value: FilterValue::AnyOf(vec!["b1".to_string(), "b2".to_string()]),
                },
            ],
            text: None,
            highlight: false,
        };
        assert!(matches!(
            query.filter(FilterField::User),
            Some(FilterValue::Term(t)) if t == "u1"
        ));
        assert!(query.filter(FilterField::CourseId).is_none());
        assert!(query.has_usage_filter());
    }
}
