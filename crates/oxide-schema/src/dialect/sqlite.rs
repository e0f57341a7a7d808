//! SQLite dialect.
//!
//! Schemas are attached databases (`main`, `temp` or any `ATTACH ... AS`
//! alias). SQLite has no routines and only limited `ALTER TABLE`, so column
//! changes other than simple additions and drops rebuild the table.

use crate::command::PlaceholderStyle;
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;
use crate::schema::{IndexDefinition, RoutineKind, TableColumn};

use super::{quote_if_needed, Dialect, DialectKind, ParameterType};

/// SQLite dialect provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn default_schema(&self) -> &'static str {
        "main"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::NumberedQuestion
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_if_needed(name, '"')
    }

    fn add_application_name(&self, connection_string: &str, _application_name: &str) -> String {
        connection_string.to_string()
    }

    fn connection_string_for_database(&self, _connection_string: &str, _database: &str) -> Result<String> {
        Err(SchemaError::unsupported("Server databases", self.name()))
    }

    fn parameter_type_name(&self, parameter_type: ParameterType) -> &'static str {
        match parameter_type {
            ParameterType::Boolean
            | ParameterType::TinyInt
            | ParameterType::SmallInt
            | ParameterType::Integer
            | ParameterType::BigInt => "INTEGER",
            ParameterType::Real | ParameterType::Double => "REAL",
            ParameterType::Binary => "BLOB",
            ParameterType::Text
            | ParameterType::Date
            | ParameterType::Time
            | ParameterType::Timestamp
            | ParameterType::TimestampTz
            | ParameterType::Json => "TEXT",
        }
    }

    fn create_schema_sql(&self, _schema: &str) -> Option<String> {
        None
    }

    fn add_column_sql(&self, table: &QualifiedName, column: &TableColumn) -> Option<String> {
        // ADD COLUMN cannot add a key or a NOT NULL column without a default.
        if column.is_primary_key || (!column.is_nullable() && column.default_expression.is_none()) {
            return None;
        }
        Some(format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.qualify(table),
            self.column_definition(column)
        ))
    }

    fn create_index_sql(&self, table: &QualifiedName, index: &IndexDefinition) -> Result<String> {
        if index.text_search.is_some() {
            return Err(SchemaError::unsupported("Full-text indexes", self.name()));
        }
        if let Some(method) = &index.method {
            return Err(SchemaError::unsupported(
                format!("Index method '{method}'"),
                self.name(),
            ));
        }

        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(table.schema()));
        sql.push('.');
        sql.push_str(&self.quote_identifier(&index.index_name(table)));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(table.name()));
        sql.push_str(" (");
        sql.push_str(&index.column_expressions()?.join(", "));
        sql.push(')');
        if let Some(predicate) = &index.predicate {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        Ok(sql)
    }

    fn drop_index_sql(&self, table: &QualifiedName, index_name: &str) -> String {
        format!(
            "DROP INDEX IF EXISTS {}.{}",
            self.quote_identifier(table.schema()),
            self.quote_identifier(index_name)
        )
    }

    fn drop_routine_sql(&self, kind: RoutineKind, _identifier: &QualifiedName) -> Result<String> {
        Err(SchemaError::unsupported(
            format!("{}s", kind.display_name()),
            self.name(),
        ))
    }

    fn execute_dynamic_sql(&self, _body: &str) -> Result<String> {
        Err(SchemaError::unsupported("Routines", self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Table, View};

    fn hilo() -> QualifiedName {
        QualifiedName::new("functions", "mt_hilo").unwrap()
    }

    #[test]
    fn test_create_table_in_attached_schema() {
        let table = Table::new(hilo())
            .column(TableColumn::new("entity_name", "varchar(200)").primary_key())
            .column(TableColumn::new("next_value", "int"));
        assert_eq!(
            SqliteDialect.create_table_sql(&table),
            "CREATE TABLE functions.mt_hilo (\n    entity_name varchar(200) NOT NULL,\n    next_value int,\n    CONSTRAINT pkey_mt_hilo_entity_name PRIMARY KEY (entity_name)\n)"
        );
    }

    #[test]
    fn test_add_column_restrictions() {
        assert!(SqliteDialect
            .add_column_sql(&hilo(), &TableColumn::new("a", "int"))
            .is_some());
        assert!(SqliteDialect
            .add_column_sql(&hilo(), &TableColumn::new("b", "int").not_null())
            .is_none());
        assert!(SqliteDialect
            .add_column_sql(&hilo(), &TableColumn::new("c", "int").not_null().default_value("0"))
            .is_some());
        assert!(SqliteDialect
            .add_column_sql(&hilo(), &TableColumn::new("d", "int").primary_key())
            .is_none());
    }

    #[test]
    fn test_index_sql_qualifies_index_not_table() {
        let index = IndexDefinition::new(vec!["next_value".to_string()]);
        assert_eq!(
            SqliteDialect.create_index_sql(&hilo(), &index).unwrap(),
            "CREATE INDEX functions.mt_hilo_idx_next_value ON mt_hilo (next_value)"
        );
        assert_eq!(
            SqliteDialect.drop_index_sql(&hilo(), "mt_hilo_idx_next_value"),
            "DROP INDEX IF EXISTS functions.mt_hilo_idx_next_value"
        );
    }

    #[test]
    fn test_routines_unsupported() {
        assert!(SqliteDialect
            .drop_routine_sql(RoutineKind::Function, &hilo())
            .is_err());
        assert!(SqliteDialect.execute_dynamic_sql("select 1").is_err());
        assert!(SqliteDialect.create_schema_sql("functions").is_none());
        assert!(SqliteDialect
            .connection_string_for_database("sqlite://a.db", "b")
            .is_err());
    }

    #[test]
    fn test_materialized_views_unsupported() {
        let view = View::new(hilo(), "select 1").materialized().access_method("heap");
        assert!(SqliteDialect.create_view_sql(&view).is_err());
        assert!(SqliteDialect.drop_view_sql(&view).is_err());
        let view = View::new(hilo(), "select 1");
        assert_eq!(
            SqliteDialect.create_view_sql(&view).unwrap(),
            "CREATE VIEW functions.mt_hilo AS\nselect 1"
        );
    }

    #[test]
    fn test_application_name_is_ignored() {
        assert_eq!(
            SqliteDialect.add_application_name("sqlite::memory:", "svc"),
            "sqlite::memory:"
        );
    }
}
