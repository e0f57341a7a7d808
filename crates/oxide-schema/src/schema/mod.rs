//! Schema object kinds.
//!
//! [`SchemaObject`] is the closed set of things the engine can diff. Each
//! kind writes its own DDL, builds catalog queries for its live counterpart
//! and reads the result rows back into a value of the same kind.

mod index;
mod routine;
mod table;
mod view;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

pub use index::{IndexDefinition, TextSearch, DEFAULT_TEXT_SEARCH_CONFIG};
pub use routine::{parse_routine_identifier, Routine, RoutineKind};
pub use table::{ColumnChange, Table, TableColumn, TableDelta};
pub use view::{view_body, View, ViewKind};

use crate::command::{Command, Row};
use crate::delta::SchemaObjectDelta;
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;
use crate::migrator::{Migrator, SqlScript};

/// A desired or live database object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchemaObject {
    /// A table with its columns and indexes.
    Table(Table),
    /// A plain or materialized view.
    View(View),
    /// A function or stored procedure.
    Routine(Routine),
}

impl SchemaObject {
    /// Name of the object.
    #[must_use]
    pub fn identifier(&self) -> &QualifiedName {
        match self {
            Self::Table(table) => &table.identifier,
            Self::View(view) => &view.identifier,
            Self::Routine(routine) => &routine.identifier,
        }
    }

    /// Every name this object occupies in the database. Index names are
    /// qualified with the table's schema.
    #[must_use]
    pub fn all_names(&self) -> Vec<QualifiedName> {
        let mut names = vec![self.identifier().clone()];
        if let Self::Table(table) = self {
            let schema = table.identifier.schema();
            names.extend(
                table
                    .index_names()
                    .into_iter()
                    .filter_map(|name| QualifiedName::new(schema, name).ok()),
            );
        }
        names
    }

    /// Human readable kind, for logs and script comments.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Table(_) => "table",
            Self::View(view) => view.kind.display_name(),
            Self::Routine(routine) => routine.kind.display_name(),
        }
    }

    /// Problems with this definition that no database could accept: tables
    /// without columns or with duplicate columns, unwritable indexes, empty
    /// view queries, and routines without a body.
    #[must_use]
    pub fn definition_errors(&self) -> Vec<SchemaError> {
        let invalid = |message: String| {
            SchemaError::InvalidDefinition(format!("{} {}: {message}", self.kind_name(), self.identifier()))
        };
        let mut errors = Vec::new();
        match self {
            Self::Table(table) => {
                if table.columns.is_empty() {
                    errors.push(invalid("has no columns".to_string()));
                }
                let mut seen = BTreeSet::new();
                for column in &table.columns {
                    if !seen.insert(column.name.as_str()) {
                        errors.push(invalid(format!("column {} is declared more than once", column.name)));
                    }
                }
                errors.extend(table.indexes.iter().filter_map(|i| i.column_expressions().err()));
            }
            Self::View(view) => {
                if view.sql.trim().is_empty() {
                    errors.push(invalid("has no query".to_string()));
                }
            }
            Self::Routine(routine) => {
                let has_body = routine.body.as_deref().is_some_and(|b| !b.trim().is_empty());
                if !routine.is_removed && !has_body {
                    errors.push(invalid("has no body".to_string()));
                }
            }
        }
        errors
    }

    /// Writes drop-if-exists followed by the create statements.
    ///
    /// # Errors
    ///
    /// Returns an error when the object cannot be written for the dialect.
    pub fn write_create_statement(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        match self {
            Self::Table(table) => table.write_create_statement(migrator, script),
            Self::View(view) => view.write_create_statement(migrator, script),
            Self::Routine(routine) => routine.write_create_statement(migrator, script),
        }
    }

    /// Writes the drop statements.
    ///
    /// # Errors
    ///
    /// Returns an error when the object cannot be written for the dialect.
    pub fn write_drop_statement(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        match self {
            Self::Table(table) => {
                table.write_drop_statement(migrator, script);
                Ok(())
            }
            Self::View(view) => view.write_drop_statement(migrator, script),
            Self::Routine(routine) => routine.write_drop_statement(migrator, script),
        }
    }

    /// Catalog queries whose result sets feed [`SchemaObject::read_actual`].
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] when the backend has no such
    /// object kind.
    pub fn introspection_commands(&self, dialect: &dyn Dialect) -> Result<Vec<Command>> {
        match self {
            Self::Table(table) => Ok(table.introspection_commands(dialect)),
            Self::View(view) => Ok(vec![view.introspection_command(dialect)?]),
            Self::Routine(routine) => Ok(vec![routine.introspection_command(dialect)?]),
        }
    }

    /// Reads the live counterpart from one result set per introspection
    /// command; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnexpectedRow`] for result sets of the wrong
    /// shape.
    pub fn read_actual(&self, dialect: &dyn Dialect, results: &[Vec<Row>]) -> Result<Option<Self>> {
        match self {
            Self::Table(table) => Ok(table.read_actual(dialect, results)?.map(Self::Table)),
            Self::View(view) => Ok(view.read_actual(single_result(self, results)?)?.map(Self::View)),
            Self::Routine(routine) => Ok(routine
                .read_actual(single_result(self, results)?)?
                .map(Self::Routine)),
        }
    }

    /// Reads the live counterpart and compares it with this object.
    ///
    /// # Errors
    ///
    /// Returns an error when the result sets cannot be read.
    pub fn create_delta(&self, dialect: &dyn Dialect, results: &[Vec<Row>]) -> Result<SchemaObjectDelta> {
        let actual = self.read_actual(dialect, results)?;
        SchemaObjectDelta::compute(dialect, self.clone(), actual)
    }
}

fn single_result<'a>(object: &SchemaObject, results: &'a [Vec<Row>]) -> Result<&'a [Row]> {
    match results {
        [rows] => Ok(rows),
        _ => Err(SchemaError::UnexpectedRow(format!(
            "expected one result set for {} {}, got {}",
            object.kind_name(),
            object.identifier(),
            results.len()
        ))),
    }
}

impl From<Table> for SchemaObject {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl From<View> for SchemaObject {
    fn from(view: View) -> Self {
        Self::View(view)
    }
}

impl From<Routine> for SchemaObject {
    fn from(routine: Routine) -> Self {
        Self::Routine(routine)
    }
}
