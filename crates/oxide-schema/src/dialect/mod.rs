//! Database dialect providers.
//!
//! A dialect is a stateless policy object for one backend. It knows the
//! backend's default schema, how to quote and canonicalize names and types,
//! how to map native values to typed parameters, and how to spell every DDL
//! statement the migrator writes.

mod postgres;
mod sqlite;
mod sqlserver;
pub mod types;

use std::any::TypeId;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;
pub use types::{native_parameter_type, ParameterType};

use crate::canonical;
use crate::command::PlaceholderStyle;
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;
use crate::schema::{ColumnChange, IndexDefinition, RoutineKind, Table, TableColumn, View, ViewKind};

/// The supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// Postgres family.
    Postgres,
    /// SQL Server family.
    SqlServer,
    /// Embedded SQLite.
    Sqlite,
}

impl DialectKind {
    /// The provider for this backend.
    #[must_use]
    pub fn provider(self) -> std::sync::Arc<dyn Dialect> {
        match self {
            Self::Postgres => std::sync::Arc::new(PostgresDialect),
            Self::SqlServer => std::sync::Arc::new(SqlServerDialect),
            Self::Sqlite => std::sync::Arc::new(SqliteDialect),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Postgres => "postgres",
            Self::SqlServer => "sqlserver",
            Self::Sqlite => "sqlite",
        })
    }
}

impl FromStr for DialectKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(SchemaError::parse(s, "unknown dialect")),
        }
    }
}

/// Backend policy: naming, type mapping and DDL spelling.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns which backend this is.
    fn kind(&self) -> DialectKind;

    /// Schema used for unqualified names.
    fn default_schema(&self) -> &'static str;

    /// How positional parameters are written.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Quotes a single identifier.
    fn quote_identifier(&self, name: &str) -> String;

    /// Quotes a qualified name.
    fn qualify(&self, name: &QualifiedName) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(name.schema()),
            self.quote_identifier(name.name())
        )
    }

    /// Canonical spelling of a column type, used for comparison.
    fn canonicalize_type(&self, type_name: &str) -> String {
        canonical::type_name(type_name)
    }

    /// Returns true when `actual_default` is a default the backend derives
    /// from `expected`'s type rather than one written in the definition.
    fn is_implicit_default(&self, _expected: &TableColumn, _actual_default: &str) -> bool {
        false
    }

    /// Appends a diagnostic application name to a connection string.
    ///
    /// An empty or whitespace-only `application_name` returns the input
    /// unchanged.
    fn add_application_name(&self, connection_string: &str, application_name: &str) -> String;

    /// Rewrites a server connection string to target `database`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for backends without a server.
    fn connection_string_for_database(&self, connection_string: &str, database: &str)
        -> Result<String>;

    /// Maps a native value type to this backend's parameter type.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NoTypeMapping`] for types without a mapping.
    fn parameter_type(&self, type_id: TypeId, type_name: &str) -> Result<ParameterType> {
        native_parameter_type(type_id).ok_or_else(|| SchemaError::NoTypeMapping(type_name.to_string()))
    }

    /// Type name used for a parameter type in DDL.
    fn parameter_type_name(&self, parameter_type: ParameterType) -> &'static str;

    /// Statement creating `schema` if missing, or `None` when the backend has
    /// no schemas to create.
    fn create_schema_sql(&self, schema: &str) -> Option<String>;

    /// Generates column definition SQL.
    fn column_definition(&self, column: &TableColumn) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            column.column_type.clone(),
        ];
        if !column.is_nullable() {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default_expression {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }

    /// Generates `CREATE TABLE` for `table`, including the primary key.
    fn create_table_sql(&self, table: &Table) -> String {
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();

        let primary_key = table.primary_key_columns();
        if !primary_key.is_empty() {
            let quoted: Vec<String> = primary_key.iter().map(|c| self.quote_identifier(c)).collect();
            definitions.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.quote_identifier(&table.primary_key_name()),
                quoted.join(", ")
            ));
        }

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.qualify(&table.identifier),
            definitions.join(",\n    ")
        )
    }

    /// Generates `DROP TABLE IF EXISTS`.
    fn drop_table_sql(&self, table: &QualifiedName) -> String {
        format!("DROP TABLE IF EXISTS {}", self.qualify(table))
    }

    /// Adds a column in place, or `None` when the backend cannot.
    fn add_column_sql(&self, table: &QualifiedName, column: &TableColumn) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualify(table),
            self.column_definition(column)
        ))
    }

    /// Drops a column in place, or `None` when the backend cannot.
    fn drop_column_sql(&self, table: &QualifiedName, column: &str) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.qualify(table),
            self.quote_identifier(column)
        ))
    }

    /// Alters a column in place, or `None` when the backend cannot express
    /// this change.
    fn alter_column_sql(&self, _table: &QualifiedName, _change: &ColumnChange<'_>) -> Option<Vec<String>> {
        None
    }

    /// Generates `CREATE INDEX` for an index on `table`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for index features the backend
    /// lacks and [`SchemaError::InvalidDefinition`] for malformed indexes.
    fn create_index_sql(&self, table: &QualifiedName, index: &IndexDefinition) -> Result<String>;

    /// Generates `DROP INDEX IF EXISTS`.
    fn drop_index_sql(&self, table: &QualifiedName, index_name: &str) -> String;

    /// Generates `CREATE [MATERIALIZED] VIEW`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for materialized views on
    /// backends without them.
    fn create_view_sql(&self, view: &View) -> Result<String> {
        self.check_view_kind(view.kind)?;
        let options = view
            .creation_options()
            .map(|o| format!(" {o}"))
            .unwrap_or_default();
        Ok(format!(
            "CREATE {} {}{} AS\n{}",
            view.kind.keyword(),
            self.qualify(&view.identifier),
            options,
            view.sql.trim().trim_end_matches(';')
        ))
    }

    /// Generates `DROP [MATERIALIZED] VIEW IF EXISTS`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for materialized views on
    /// backends without them.
    fn drop_view_sql(&self, view: &View) -> Result<String> {
        self.check_view_kind(view.kind)?;
        Ok(format!(
            "DROP {} IF EXISTS {}",
            view.kind.keyword(),
            self.qualify(&view.identifier)
        ))
    }

    /// Rejects view kinds the backend does not have.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for materialized views by default.
    fn check_view_kind(&self, kind: ViewKind) -> Result<()> {
        match kind {
            ViewKind::Plain => Ok(()),
            ViewKind::Materialized => Err(SchemaError::unsupported("Materialized views", self.name())),
        }
    }

    /// Generates `DROP FUNCTION|PROCEDURE IF EXISTS`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for backends without routines.
    fn drop_routine_sql(&self, kind: RoutineKind, identifier: &QualifiedName) -> Result<String> {
        Ok(format!(
            "DROP {} IF EXISTS {}",
            kind.keyword(),
            self.qualify(identifier)
        ))
    }

    /// Wraps a raw routine body so it can run as one statement.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for backends without routines.
    fn execute_dynamic_sql(&self, body: &str) -> Result<String>;
}

/// Maps the native type `T` to `dialect`'s parameter type.
///
/// # Errors
///
/// Returns [`SchemaError::NoTypeMapping`] for types without a mapping.
pub fn parameter_type_for<T: 'static>(dialect: &dyn Dialect) -> Result<ParameterType> {
    dialect.parameter_type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Quotes `name` with `quote` only when it is not a plain lower-case
/// identifier or collides with a reserved word. Embedded quotes are doubled.
pub(crate) fn quote_if_needed(name: &str, quote: char) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if plain && !is_reserved(name) {
        name.to_string()
    } else {
        let doubled = format!("{quote}{quote}");
        format!("{quote}{}{quote}", name.replace(quote, &doubled))
    }
}

const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "as", "asc", "both", "case", "check", "column",
    "constraint", "create", "default", "delete", "desc", "distinct", "do", "drop", "else", "end",
    "except", "false", "fetch", "for", "foreign", "from", "grant", "group", "having", "in",
    "index", "insert", "intersect", "into", "is", "join", "key", "limit", "not", "null",
    "offset", "on", "or", "order", "primary", "references", "select", "set", "table", "then",
    "to", "true", "union", "unique", "update", "user", "using", "values", "view", "when",
    "where", "with",
];

fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}
