//! Qualified database object names.
//!
//! Every schema object is identified by a `schema.name` pair. Parsing is
//! dialect-aware: a bare name falls back to the dialect's default schema
//! (`public`, `dbo` or `main`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// A `schema.name` identity pair for a database object.
///
/// Equality is case-sensitive on both parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName {
    schema: String,
    name: String,
}

impl QualifiedName {
    /// Creates a qualified name from its two parts.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] when either part is empty.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let name = name.into();
        if schema.trim().is_empty() || name.trim().is_empty() {
            return Err(SchemaError::parse(
                format!("{schema}.{name}"),
                "schema and name must both be non-empty",
            ));
        }
        Ok(Self { schema, name })
    }

    /// Parses `"schema.name"` or `"name"` using the dialect's default schema.
    ///
    /// Quoted segments (`"x"`, `[x]`, `` `x` ``) are unquoted.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] naming `text` when it has more than two
    /// dot-separated segments or an empty segment.
    pub fn parse(dialect: &dyn Dialect, text: &str) -> Result<Self> {
        let segments: Vec<&str> = text.split('.').collect();
        match segments.as_slice() {
            [name] => Self::new(dialect.default_schema(), unquote(text, name)?),
            [schema, name] => Self::new(unquote(text, schema)?, unquote(text, name)?),
            _ => Err(SchemaError::parse(
                text,
                format!(
                    "expected 'name' or 'schema.name' but found {} segments",
                    segments.len()
                ),
            )),
        }
    }

    /// Schema part.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Object name part.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `schema.name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Returns the quoted form for the given dialect.
    #[must_use]
    pub fn quoted(&self, dialect: &dyn Dialect) -> String {
        format!(
            "{}.{}",
            dialect.quote_identifier(&self.schema),
            dialect.quote_identifier(&self.name)
        )
    }

    /// The same name in a different schema.
    #[must_use]
    pub fn with_schema(&self, schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: self.name.clone(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = SchemaError;

    /// Requires the fully qualified `schema.name` form; there is no dialect
    /// to supply a default schema here.
    fn try_from(value: String) -> Result<Self> {
        match value.split_once('.') {
            Some((schema, name)) if !name.contains('.') => {
                Self::new(unquote(&value, schema)?, unquote(&value, name)?)
            }
            _ => Err(SchemaError::parse(&value, "expected 'schema.name'")),
        }
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.qualified_name()
    }
}

fn unquote<'a>(input: &str, segment: &'a str) -> Result<&'a str> {
    let trimmed = segment.trim();
    let inner = [('"', '"'), ('[', ']'), ('`', '`')]
        .iter()
        .find_map(|(open, close)| {
            trimmed
                .strip_prefix(*open)
                .and_then(|rest| rest.strip_suffix(*close))
        })
        .unwrap_or(trimmed);

    if inner.is_empty() {
        return Err(SchemaError::parse(input, "empty name segment"));
    }
    Ok(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqlServerDialect, SqliteDialect};

    #[test]
    fn test_parse_two_segments() {
        let name = QualifiedName::parse(&PostgresDialect, "functions.mt_hilo").unwrap();
        assert_eq!(name.schema(), "functions");
        assert_eq!(name.name(), "mt_hilo");
        assert_eq!(name.qualified_name(), "functions.mt_hilo");
    }

    #[test]
    fn test_parse_uses_default_schema() {
        assert_eq!(
            QualifiedName::parse(&PostgresDialect, "people").unwrap(),
            QualifiedName::new("public", "people").unwrap()
        );
        assert_eq!(
            QualifiedName::parse(&SqlServerDialect, "people").unwrap(),
            QualifiedName::new("dbo", "people").unwrap()
        );
        assert_eq!(
            QualifiedName::parse(&SqliteDialect, "people").unwrap(),
            QualifiedName::new("main", "people").unwrap()
        );
    }

    #[test]
    fn test_parse_round_trips() {
        for text in ["public.people", "other.mt_doc_user", "dbo.Orders"] {
            let name = QualifiedName::parse(&PostgresDialect, text).unwrap();
            assert_eq!(
                QualifiedName::parse(&PostgresDialect, &name.qualified_name()).unwrap(),
                name
            );
        }
    }

    #[test]
    fn test_parse_rejects_three_segments() {
        let err = QualifiedName::parse(&PostgresDialect, "a.b.c").unwrap_err();
        match err {
            SchemaError::Parse { input, .. } => assert_eq!(input, "a.b.c"),
            other => panic!("Expected parse error, got {other:?}"),
        }
        assert!(QualifiedName::parse(&PostgresDialect, "a.b.c.d").is_err());
    }

    #[test]
    fn test_parse_unquotes_segments() {
        let name = QualifiedName::parse(&SqlServerDialect, "[dbo].[Order Lines]").unwrap();
        assert_eq!(name.schema(), "dbo");
        assert_eq!(name.name(), "Order Lines");

        let name = QualifiedName::parse(&PostgresDialect, "\"MySchema\".people").unwrap();
        assert_eq!(name.schema(), "MySchema");
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(QualifiedName::parse(&PostgresDialect, "").is_err());
        assert!(QualifiedName::parse(&PostgresDialect, "public.").is_err());
        assert!(QualifiedName::parse(&PostgresDialect, ".people").is_err());
    }

    #[test]
    fn test_equality_is_case_sensitive() {
        assert_ne!(
            QualifiedName::new("public", "People").unwrap(),
            QualifiedName::new("public", "people").unwrap()
        );
    }

    #[test]
    fn test_serde_uses_qualified_string() {
        let name = QualifiedName::new("public", "people").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"public.people\"");
        let back: QualifiedName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
        assert!(serde_json::from_str::<QualifiedName>("\"people\"").is_err());
    }
}
