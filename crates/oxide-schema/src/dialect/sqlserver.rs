//! SQL Server dialect.
//!
//! Identifiers are always bracket-quoted. SQL Server names default
//! constraints itself, so default changes are not altered in place.

use std::any::TypeId;

use crate::command::PlaceholderStyle;
use crate::connection_string;
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;
use crate::schema::{ColumnChange, IndexDefinition, TableColumn};

use super::{native_parameter_type, Dialect, DialectKind, ParameterType};

/// SQL Server dialect provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    /// Creates a new SQL Server dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::SqlServer
    }

    fn default_schema(&self) -> &'static str {
        "dbo"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::AtP
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    fn canonicalize_type(&self, type_name: &str) -> String {
        let text = crate::canonical::type_name(type_name);
        let (base, args) = text.find('(').map_or((text.as_str(), ""), |i| text.split_at(i));
        let base = match base {
            "integer" => "int",
            "character varying" => "varchar",
            "character" => "char",
            "national character varying" => "nvarchar",
            "dec" => "decimal",
            "double precision" => "float",
            "rowversion" => "timestamp",
            other => other,
        };
        format!("{base}{args}")
    }

    fn add_application_name(&self, connection_string: &str, application_name: &str) -> String {
        let application_name = application_name.trim();
        if application_name.is_empty() {
            return connection_string.to_string();
        }
        connection_string::append_property(connection_string, "Application Name", application_name)
    }

    fn connection_string_for_database(&self, connection_string: &str, database: &str) -> Result<String> {
        Ok(connection_string::replace_property_database(
            connection_string,
            database,
        ))
    }

    fn parameter_type(&self, type_id: TypeId, type_name: &str) -> Result<ParameterType> {
        if type_id == TypeId::of::<u8>() {
            return Ok(ParameterType::TinyInt);
        }
        native_parameter_type(type_id).ok_or_else(|| SchemaError::NoTypeMapping(type_name.to_string()))
    }

    fn parameter_type_name(&self, parameter_type: ParameterType) -> &'static str {
        match parameter_type {
            ParameterType::Boolean => "bit",
            ParameterType::TinyInt => "tinyint",
            ParameterType::SmallInt => "smallint",
            ParameterType::Integer => "int",
            ParameterType::BigInt => "bigint",
            ParameterType::Real => "real",
            ParameterType::Double => "float",
            ParameterType::Text | ParameterType::Json => "nvarchar(max)",
            ParameterType::Binary => "varbinary(max)",
            ParameterType::Date => "date",
            ParameterType::Time => "time",
            ParameterType::Timestamp => "datetime2",
            ParameterType::TimestampTz => "datetimeoffset",
        }
    }

    fn create_schema_sql(&self, schema: &str) -> Option<String> {
        Some(format!(
            "IF NOT EXISTS (SELECT 1 FROM sys.schemas WHERE name = N'{}') EXEC('CREATE SCHEMA {}')",
            schema.replace('\'', "''"),
            self.quote_identifier(schema).replace('\'', "''")
        ))
    }

    fn column_definition(&self, column: &TableColumn) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            column.column_type.clone(),
            if column.is_nullable() { "NULL" } else { "NOT NULL" }.to_string(),
        ];
        if let Some(default) = &column.default_expression {
            parts.push(format!("DEFAULT {default}"));
        }
        parts.join(" ")
    }

    fn add_column_sql(&self, table: &QualifiedName, column: &TableColumn) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} ADD {}",
            self.qualify(table),
            self.column_definition(column)
        ))
    }

    fn alter_column_sql(&self, table: &QualifiedName, change: &ColumnChange<'_>) -> Option<Vec<String>> {
        if change.default_changed || change.expected.is_primary_key {
            return None;
        }
        let column = change.expected;
        Some(vec![format!(
            "ALTER TABLE {} ALTER COLUMN {} {} {}",
            self.qualify(table),
            self.quote_identifier(&column.name),
            column.column_type,
            if column.is_nullable() { "NULL" } else { "NOT NULL" }
        )])
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
        sql.push_str(&self.quote_identifier(&index.index_name(table)));
        sql.push_str(" ON ");
        sql.push_str(&self.qualify(table));
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
            "DROP INDEX IF EXISTS {} ON {}",
            self.quote_identifier(index_name),
            self.qualify(table)
        )
    }

    fn execute_dynamic_sql(&self, body: &str) -> Result<String> {
        let trimmed = body.trim().trim_end_matches(';').trim_end();
        if trimmed.is_empty() {
            return Err(SchemaError::InvalidDefinition("empty routine body".to_string()));
        }
        Ok(format!("EXEC sp_executesql N'{}'", trimmed.replace('\'', "''")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::parameter_type_for;
    use crate::schema::{RoutineKind, Table, View};

    fn orders() -> QualifiedName {
        QualifiedName::new("dbo", "orders").unwrap()
    }

    #[test]
    fn test_quote_identifier_always_brackets() {
        assert_eq!(SqlServerDialect.quote_identifier("orders"), "[orders]");
        assert_eq!(SqlServerDialect.quote_identifier("a]b"), "[a]]b]");
        assert_eq!(SqlServerDialect.qualify(&orders()), "[dbo].[orders]");
    }

    #[test]
    fn test_canonicalize_type() {
        assert_eq!(SqlServerDialect.canonicalize_type("INTEGER"), "int");
        assert_eq!(SqlServerDialect.canonicalize_type("VARCHAR (200)"), "varchar(200)");
        assert_eq!(SqlServerDialect.canonicalize_type("nvarchar(max)"), "nvarchar(max)");
    }

    #[test]
    fn test_u8_maps_to_tinyint() {
        assert_eq!(
            parameter_type_for::<u8>(&SqlServerDialect).unwrap(),
            ParameterType::TinyInt
        );
        assert_eq!(
            SqlServerDialect.parameter_type_name(ParameterType::TinyInt),
            "tinyint"
        );
    }

    #[test]
    fn test_application_name() {
        assert_eq!(
            SqlServerDialect.add_application_name("Server=h;Database=d", "svc"),
            "Server=h;Database=d;Application Name=svc"
        );
        assert_eq!(
            SqlServerDialect.add_application_name("Server=h", ""),
            "Server=h"
        );
    }

    #[test]
    fn test_create_table_sql() {
        let table = Table::new(orders())
            .column(TableColumn::new("id", "int").primary_key())
            .column(TableColumn::new("note", "nvarchar(100)"));
        assert_eq!(
            SqlServerDialect.create_table_sql(&table),
            "CREATE TABLE [dbo].[orders] (\n    [id] int NOT NULL,\n    [note] nvarchar(100) NULL,\n    CONSTRAINT [pkey_orders_id] PRIMARY KEY ([id])\n)"
        );
    }

    #[test]
    fn test_alter_column_declines_default_changes() {
        let expected = TableColumn::new("qty", "int").default_value("1");
        let actual = TableColumn::new("qty", "int");
        let change = ColumnChange::between(&SqlServerDialect, &expected, &actual);
        assert!(SqlServerDialect.alter_column_sql(&orders(), &change).is_none());

        let expected = TableColumn::new("qty", "bigint").not_null();
        let change = ColumnChange::between(&SqlServerDialect, &expected, &actual);
        assert_eq!(
            SqlServerDialect.alter_column_sql(&orders(), &change).unwrap(),
            vec!["ALTER TABLE [dbo].[orders] ALTER COLUMN [qty] bigint NOT NULL"]
        );
    }

    #[test]
    fn test_unsupported_index_features() {
        let index = IndexDefinition::full_text(vec!["body".to_string()]);
        assert!(matches!(
            SqlServerDialect.create_index_sql(&orders(), &index),
            Err(SchemaError::Unsupported { .. })
        ));
        let index = IndexDefinition::new(vec!["body".to_string()]).method("gin");
        assert!(SqlServerDialect.create_index_sql(&orders(), &index).is_err());
    }

    #[test]
    fn test_drop_index_and_view() {
        assert_eq!(
            SqlServerDialect.drop_index_sql(&orders(), "orders_idx_id"),
            "DROP INDEX IF EXISTS [orders_idx_id] ON [dbo].[orders]"
        );
        let view = View::new(orders(), "select 1 as x");
        assert_eq!(
            SqlServerDialect.drop_view_sql(&view).unwrap(),
            "DROP VIEW IF EXISTS [dbo].[orders]"
        );
        let view = View::new(orders(), "select 1 as x").materialized().access_method("heap");
        assert!(SqlServerDialect.create_view_sql(&view).is_err());
    }

    #[test]
    fn test_routine_sql() {
        assert_eq!(
            SqlServerDialect
                .drop_routine_sql(RoutineKind::Procedure, &orders())
                .unwrap(),
            "DROP PROCEDURE IF EXISTS [dbo].[orders]"
        );
        assert_eq!(
            SqlServerDialect
                .execute_dynamic_sql("CREATE PROCEDURE dbo.p AS SELECT 'x';")
                .unwrap(),
            "EXEC sp_executesql N'CREATE PROCEDURE dbo.p AS SELECT ''x'''"
        );
    }

    #[test]
    fn test_create_schema_is_guarded() {
        assert_eq!(
            SqlServerDialect.create_schema_sql("functions").unwrap(),
            "IF NOT EXISTS (SELECT 1 FROM sys.schemas WHERE name = N'functions') EXEC('CREATE SCHEMA [functions]')"
        );
    }
}
