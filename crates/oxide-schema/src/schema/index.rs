//! Index definitions.
//!
//! Index names are derived deterministically when not given explicitly, and
//! always lower-cased:
//!
//! 1. an explicit name, forced to start with the required prefix when one is
//!    set;
//! 2. for a full-text index with a non-default configuration,
//!    `{table}_{config}_idx_fts`;
//! 3. otherwise `{table}_idx_{suffix}`, where the suffix is `fts` for
//!    full-text indexes and the joined column names for the rest.

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;

/// Text search configuration used when none is given.
pub const DEFAULT_TEXT_SEARCH_CONFIG: &str = "english";

/// Full-text search settings of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearch {
    /// Text search configuration (`english`, `french`, ...).
    #[serde(default = "default_config")]
    pub config: String,
    /// Expressions producing the indexed document text.
    pub document_expressions: Vec<String>,
}

fn default_config() -> String {
    DEFAULT_TEXT_SEARCH_CONFIG.to_string()
}

/// An index on a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Explicit name.
    #[serde(default)]
    pub name: Option<String>,
    /// Prefix the explicit name must start with.
    #[serde(default)]
    pub required_prefix: Option<String>,
    /// Indexed columns or expressions.
    #[serde(default)]
    pub columns: Vec<String>,
    /// Whether the index is unique.
    #[serde(default)]
    pub unique: bool,
    /// Access method (`btree`, `gin`, ...).
    #[serde(default)]
    pub method: Option<String>,
    /// Partial index predicate.
    #[serde(default)]
    pub predicate: Option<String>,
    /// Full-text settings; makes this a full-text index.
    #[serde(default)]
    pub text_search: Option<TextSearch>,
}

impl IndexDefinition {
    /// Creates an index over `columns`.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// Creates a full-text index over the given document expressions using
    /// the default configuration.
    #[must_use]
    pub fn full_text(document_expressions: Vec<String>) -> Self {
        Self {
            text_search: Some(TextSearch {
                config: default_config(),
                document_expressions,
            }),
            ..Self::default()
        }
    }

    /// Sets an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Requires the explicit name to start with `prefix`.
    #[must_use]
    pub fn required_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.required_prefix = Some(prefix.into());
        self
    }

    /// Makes the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the access method.
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the partial index predicate.
    #[must_use]
    pub fn predicate(mut self, predicate: impl Into<String>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Sets the text search configuration of a full-text index.
    #[must_use]
    pub fn config(mut self, config: impl Into<String>) -> Self {
        if let Some(text_search) = &mut self.text_search {
            text_search.config = config.into();
        }
        self
    }

    /// Returns true for full-text indexes.
    #[must_use]
    pub const fn is_full_text(&self) -> bool {
        self.text_search.is_some()
    }

    /// Derived index name for an index on `table`.
    #[must_use]
    pub fn index_name(&self, table: &QualifiedName) -> String {
        if let Some(name) = &self.name {
            let name = match &self.required_prefix {
                Some(prefix) if !name.starts_with(prefix.as_str()) => format!("{prefix}{name}"),
                _ => name.clone(),
            };
            return name.to_lowercase();
        }

        let derived = match &self.text_search {
            Some(ts) if !ts.config.eq_ignore_ascii_case(DEFAULT_TEXT_SEARCH_CONFIG) => {
                format!("{}_{}_idx_fts", table.name(), ts.config)
            }
            Some(_) => format!("{}_idx_fts", table.name()),
            None => format!("{}_idx_{}", table.name(), self.column_suffix()),
        };
        derived.to_lowercase()
    }

    fn column_suffix(&self) -> String {
        self.columns
            .iter()
            .map(|c| {
                c.chars()
                    .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
                    .collect::<String>()
                    .trim_matches('_')
                    .to_string()
            })
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }

    /// Access method to write, `gin` for full-text indexes.
    #[must_use]
    pub fn effective_method(&self) -> Option<String> {
        match (&self.method, &self.text_search) {
            (Some(method), _) => Some(method.clone()),
            (None, Some(_)) => Some("gin".to_string()),
            (None, None) => None,
        }
    }

    /// The indexed expressions as written in DDL.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDefinition`] for a full-text index with
    /// no document expressions or a plain index with no columns.
    pub fn column_expressions(&self) -> Result<Vec<String>> {
        match &self.text_search {
            Some(ts) => {
                if ts.document_expressions.is_empty() {
                    return Err(SchemaError::InvalidDefinition(
                        "a full-text index needs at least one document expression".to_string(),
                    ));
                }
                Ok(vec![format!(
                    "to_tsvector('{}', {})",
                    ts.config.replace('\'', "''"),
                    ts.document_expressions.join(" || ' ' || ")
                )])
            }
            None if self.columns.is_empty() => Err(SchemaError::InvalidDefinition(
                "an index needs at least one column".to_string(),
            )),
            None => Ok(self.columns.clone()),
        }
    }

    /// Structural equivalence with a live index of the same name.
    ///
    /// `actual` carries the live column expressions in `columns`.
    #[must_use]
    pub fn matches(&self, actual: &Self) -> bool {
        let Ok(expected_columns) = self.column_expressions() else {
            return false;
        };
        let canonical_columns = |columns: &[String]| -> Vec<String> {
            columns.iter().map(|c| canonical::expression(c)).collect()
        };
        let method = |m: Option<String>| m.map(|m| m.to_lowercase()).filter(|m| m != "btree");
        let predicate = |p: &Option<String>| p.as_deref().map(canonical::expression);

        self.unique == actual.unique
            && method(self.effective_method()) == method(actual.effective_method())
            && canonical_columns(&expected_columns) == canonical_columns(&actual.columns)
            && predicate(&self.predicate) == predicate(&actual.predicate)
    }
}
