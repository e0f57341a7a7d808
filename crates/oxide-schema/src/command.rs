//! Parameterized commands and result rows.
//!
//! Introspection queries are always built with bound parameters through a
//! [`CommandBuilder`]; the builder writes the dialect's placeholder style
//! (`$1`, `@P1` or `?1`) so schema and object names never get spliced into
//! catalog queries.

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// A bound parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer (any width).
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Text(String),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// How a dialect spells positional parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... (Postgres).
    Dollar,
    /// `@P1`, `@P2`, ... (SQL Server).
    AtP,
    /// `?1`, `?2`, ... (SQLite).
    NumberedQuestion,
}

impl PlaceholderStyle {
    /// Placeholder for the 1-based parameter `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::Dollar => format!("${index}"),
            Self::AtP => format!("@P{index}"),
            Self::NumberedQuestion => format!("?{index}"),
        }
    }
}

/// A SQL command with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    /// Command text with placeholders.
    pub sql: String,
    /// Parameter values in placeholder order.
    pub parameters: Vec<Value>,
}

impl Command {
    /// A command with no parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }
}

/// Builds a [`Command`], assigning each bound value the next placeholder.
pub struct CommandBuilder<'a> {
    dialect: &'a dyn Dialect,
    sql: String,
    parameters: Vec<Value>,
}

impl<'a> CommandBuilder<'a> {
    /// Creates an empty builder for `dialect`.
    #[must_use]
    pub const fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            parameters: Vec::new(),
        }
    }

    /// Appends raw SQL text.
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    /// Binds `value` and appends its placeholder.
    pub fn append_parameter(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parameters.push(value.into());
        let placeholder = self
            .dialect
            .placeholder_style()
            .placeholder(self.parameters.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Finishes the command.
    #[must_use]
    pub fn build(self) -> Command {
        Command {
            sql: self.sql,
            parameters: self.parameters,
        }
    }
}

/// One row returned by an introspection query.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Creates a row from its column values.
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnexpectedRow`] when the column is missing.
    pub fn get(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            SchemaError::UnexpectedRow(format!(
                "column {index} requested from a row with {} columns",
                self.values.len()
            ))
        })
    }

    /// Text value at `index`, `None` for NULL.
    ///
    /// Integer values are rendered as text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnexpectedRow`] when the column is missing or
    /// holds a value of another type.
    pub fn text(&self, index: usize) -> Result<Option<String>> {
        match self.get(index)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.clone())),
            Value::Int(i) => Ok(Some(i.to_string())),
            other => Err(SchemaError::UnexpectedRow(format!(
                "expected text in column {index}, found {other:?}"
            ))),
        }
    }

    /// Non-null text value at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnexpectedRow`] for NULL or non-text values.
    pub fn required_text(&self, index: usize) -> Result<String> {
        self.text(index)?.ok_or_else(|| {
            SchemaError::UnexpectedRow(format!("unexpected NULL in column {index}"))
        })
    }

    /// Boolean value at `index`; integers are truthy when non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnexpectedRow`] for values that are not
    /// booleans.
    pub fn bool(&self, index: usize) -> Result<bool> {
        match self.get(index)? {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Text(s) => match s.to_ascii_lowercase().as_str() {
                "t" | "true" | "yes" | "1" => Ok(true),
                "f" | "false" | "no" | "0" => Ok(false),
                _ => Err(SchemaError::UnexpectedRow(format!(
                    "expected boolean in column {index}, found '{s}'"
                ))),
            },
            other => Err(SchemaError::UnexpectedRow(format!(
                "expected boolean in column {index}, found {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqlServerDialect, SqliteDialect};

    #[test]
    fn test_builder_placeholders_per_dialect() {
        let mut builder = CommandBuilder::new(&PostgresDialect);
        builder
            .append("select 1 where a = ")
            .append_parameter("x")
            .append(" and b = ")
            .append_parameter(2_i64);
        let command = builder.build();
        assert_eq!(command.sql, "select 1 where a = $1 and b = $2");
        assert_eq!(
            command.parameters,
            vec![Value::Text("x".to_string()), Value::Int(2)]
        );

        let mut builder = CommandBuilder::new(&SqlServerDialect);
        builder.append("select ").append_parameter(true);
        assert_eq!(builder.build().sql, "select @P1");

        let mut builder = CommandBuilder::new(&SqliteDialect);
        builder.append("select ").append_parameter(None::<String>);
        let command = builder.build();
        assert_eq!(command.sql, "select ?1");
        assert_eq!(command.parameters, vec![Value::Null]);
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new(vec![
            Value::Text("id".to_string()),
            Value::Null,
            Value::Int(1),
            Value::Text("NO".to_string()),
        ]);
        assert_eq!(row.required_text(0).unwrap(), "id");
        assert_eq!(row.text(1).unwrap(), None);
        assert!(row.bool(2).unwrap());
        assert!(!row.bool(3).unwrap());
        assert!(row.required_text(1).is_err());
        assert!(row.get(9).is_err());
    }
}
