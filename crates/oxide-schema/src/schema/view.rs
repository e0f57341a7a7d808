//! Views and materialized views.
//!
//! A materialized view is a [`View`] whose [`ViewKind`] changes the keyword,
//! the catalog discriminator and enables the access-method option.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::command::{Command, CommandBuilder, Row};
use crate::dialect::{Dialect, DialectKind};
use crate::error::Result;
use crate::identity::QualifiedName;
use crate::migrator::{Migrator, SqlScript};

static VIEW_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^\s*create\s+(?:or\s+(?:alter|replace)\s+)?(?:materialized\s+)?view\s+.+?\s+as\s+(.*)$")
        .expect("valid view header regex")
});

/// Plain or materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    /// `VIEW`.
    #[default]
    Plain,
    /// `MATERIALIZED VIEW`.
    Materialized,
}

impl ViewKind {
    /// SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Plain => "VIEW",
            Self::Materialized => "MATERIALIZED VIEW",
        }
    }

    /// Postgres `pg_class.relkind` discriminator.
    #[must_use]
    pub const fn discriminator(self) -> char {
        match self {
            Self::Plain => 'v',
            Self::Materialized => 'm',
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Plain => "view",
            Self::Materialized => "materialized view",
        }
    }
}

/// A view and its defining query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    /// View name.
    pub identifier: QualifiedName,
    /// Defining query.
    pub sql: String,
    /// Plain or materialized.
    #[serde(default)]
    pub kind: ViewKind,
    /// Storage access method of a materialized view.
    #[serde(default)]
    pub access_method: Option<String>,
}

impl View {
    /// Creates a plain view.
    #[must_use]
    pub fn new(identifier: QualifiedName, sql: impl Into<String>) -> Self {
        Self {
            identifier,
            sql: sql.into(),
            kind: ViewKind::Plain,
            access_method: None,
        }
    }

    /// Makes this a materialized view.
    #[must_use]
    pub fn materialized(mut self) -> Self {
        self.kind = ViewKind::Materialized;
        self
    }

    /// Sets the storage access method (`heap`, ...).
    #[must_use]
    pub fn access_method(mut self, method: impl Into<String>) -> Self {
        self.access_method = Some(method.into());
        self
    }

    /// Extra clauses written between the view name and `AS`.
    #[must_use]
    pub fn creation_options(&self) -> Option<String> {
        match (self.kind, &self.access_method) {
            (ViewKind::Materialized, Some(method)) => Some(format!("USING {method}")),
            _ => None,
        }
    }

    /// Relocates the view to `schema`.
    pub fn move_to_schema(&mut self, schema: impl Into<String>) {
        self.identifier = self.identifier.with_schema(schema);
    }

    /// Writes drop-if-exists then create.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Unsupported` for materialized views on
    /// backends without them.
    pub fn write_create_statement(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        let dialect = migrator.dialect();
        script.comment(format!("Creating {} {}", self.kind.display_name(), self.identifier));
        script.statement(dialect.drop_view_sql(self)?);
        script.statement(dialect.create_view_sql(self)?);
        Ok(())
    }

    /// Writes the drop statement.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Unsupported` for materialized views on
    /// backends without them.
    pub fn write_drop_statement(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        script.comment(format!("Dropping {} {}", self.kind.display_name(), self.identifier));
        script.statement(migrator.dialect().drop_view_sql(self)?);
        Ok(())
    }

    /// Catalog query returning `(definition, access_method)` for the live
    /// view. Views the current role cannot use are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Unsupported` for materialized views on
    /// backends without them.
    pub fn introspection_command(&self, dialect: &dyn Dialect) -> Result<Command> {
        dialect.check_view_kind(self.kind)?;
        let mut builder = CommandBuilder::new(dialect);
        match dialect.kind() {
            DialectKind::Postgres => {
                builder
                    .append(
                        "SELECT pg_get_viewdef(c.oid, true), \
                         (SELECT am.amname::text FROM pg_am am WHERE am.oid = c.relam) \
                         FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
                         WHERE n.nspname = ",
                    )
                    .append_parameter(self.identifier.schema())
                    .append(" AND c.relname = ")
                    .append_parameter(self.identifier.name())
                    .append(" AND c.relkind::text = ")
                    .append_parameter(self.kind.discriminator().to_string())
                    .append(" AND pg_has_role(c.relowner, 'USAGE')");
            }
            DialectKind::SqlServer => {
                builder
                    .append(
                        "SELECT m.definition, CAST(NULL AS nvarchar(128)) FROM sys.sql_modules m \
                         WHERE m.object_id = OBJECT_ID(",
                    )
                    .append_parameter(dialect.qualify(&self.identifier))
                    .append(", 'V')");
            }
            DialectKind::Sqlite => {
                builder
                    .append(&format!(
                        "SELECT sql, NULL FROM {}.sqlite_master WHERE type = 'view' AND name = ",
                        dialect.quote_identifier(self.identifier.schema())
                    ))
                    .append_parameter(self.identifier.name());
            }
        }
        Ok(builder.build())
    }

    /// Reads the live view; no row means it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnexpectedRow` for rows of the wrong shape.
    pub fn read_actual(&self, rows: &[Row]) -> Result<Option<Self>> {
        let Some(row) = rows.first() else {
            return Ok(None);
        };
        let Some(definition) = row.text(0)? else {
            return Ok(None);
        };
        let mut live = self.clone();
        live.sql = view_body(&definition).to_string();
        live.access_method = if self.access_method.is_some() {
            row.text(1)?
        } else {
            None
        };
        Ok(Some(live))
    }

    /// Case and whitespace insensitive comparison of definitions, plus the
    /// access method when one is requested.
    #[must_use]
    pub fn is_equivalent(&self, actual: &Self) -> bool {
        canonical::definition(&self.sql) == canonical::definition(&actual.sql)
            && self.kind == actual.kind
            && self.access_method.as_deref().is_none_or(|method| {
                actual
                    .access_method
                    .as_deref()
                    .is_some_and(|m| m.eq_ignore_ascii_case(method))
            })
    }
}

/// Strips a `CREATE ... VIEW name AS` header from stored view text.
#[must_use]
pub fn view_body(definition: &str) -> &str {
    VIEW_HEADER
        .captures(definition)
        .and_then(|c| c.get(1))
        .map_or(definition, |m| m.as_str())
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Value;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use crate::migrator::SqlFormatting;
    use std::sync::Arc;

    fn summary() -> View {
        View::new(
            QualifiedName::new("public", "people_summary").unwrap(),
            "SELECT id, name FROM people",
        )
    }

    fn pg() -> Migrator {
        Migrator::new(Arc::new(PostgresDialect)).with_formatting(SqlFormatting::Concise)
    }

    #[test]
    fn test_create_writes_drop_first() {
        let mut script = SqlScript::new();
        summary().write_create_statement(&pg(), &mut script).unwrap();
        assert_eq!(
            script.statements(),
            vec![
                "DROP VIEW IF EXISTS public.people_summary CASCADE",
                "CREATE VIEW public.people_summary AS\nSELECT id, name FROM people",
            ]
        );
    }

    #[test]
    fn test_materialized_differs_only_in_keyword_and_options() {
        let plain = summary();
        let materialized = summary().materialized().access_method("heap");

        let mut plain_script = SqlScript::new();
        plain.write_create_statement(&pg(), &mut plain_script).unwrap();
        let mut mat_script = SqlScript::new();
        materialized.write_create_statement(&pg(), &mut mat_script).unwrap();

        let normalize = |s: &str| s.replace("MATERIALIZED VIEW", "VIEW").replace(" USING heap", "");
        let plain_sql: Vec<String> = plain_script.statements().iter().map(ToString::to_string).collect();
        let mat_sql: Vec<String> = mat_script.statements().iter().map(|s| normalize(s)).collect();
        assert_eq!(plain_sql, mat_sql);
        assert!(mat_script.statements()[1].contains("MATERIALIZED VIEW public.people_summary USING heap AS"));

        assert_eq!(ViewKind::Plain.discriminator(), 'v');
        assert_eq!(ViewKind::Materialized.discriminator(), 'm');
    }

    #[test]
    fn test_introspection_uses_discriminator() {
        let command = summary()
            .materialized()
            .introspection_command(&PostgresDialect)
            .unwrap();
        assert!(command.sql.contains("pg_has_role(c.relowner, 'USAGE')"));
        assert_eq!(command.parameters[2], Value::Text("m".to_string()));

        let command = summary().introspection_command(&SqliteDialect).unwrap();
        assert!(command.sql.contains("public.sqlite_master"));
        assert!(summary().materialized().introspection_command(&SqliteDialect).is_err());
    }

    #[test]
    fn test_equivalence_ignores_case_and_whitespace() {
        let live = summary()
            .read_actual(&[Row::new(vec![
                Value::Text("CREATE VIEW public.people_summary AS\n  select id,   name\nfrom people;".to_string()),
                Value::Null,
            ])])
            .unwrap()
            .unwrap();
        assert_eq!(live.sql, "select id,   name\nfrom people;");
        assert!(summary().is_equivalent(&live));

        let mut changed = live.clone();
        changed.sql = "select id from people".to_string();
        assert!(!summary().is_equivalent(&changed));
    }

    #[test]
    fn test_missing_row_is_absent() {
        assert!(summary().read_actual(&[]).unwrap().is_none());
    }

    #[test]
    fn test_move_to_schema_only_renames() {
        let mut view = summary();
        view.move_to_schema("reporting");
        assert_eq!(view.identifier.qualified_name(), "reporting.people_summary");
        assert_eq!(view.sql, summary().sql);
    }

    #[test]
    fn test_view_body_passes_plain_queries_through() {
        assert_eq!(view_body(" SELECT 1;"), "SELECT 1;");
        assert_eq!(
            view_body("create or alter view [dbo].[v] as select 2"),
            "select 2"
        );
    }
}
