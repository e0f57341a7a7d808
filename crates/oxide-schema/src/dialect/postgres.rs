//! Postgres dialect.

use crate::canonical;
use crate::command::PlaceholderStyle;
use crate::connection_string;
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;
use crate::schema::{ColumnChange, IndexDefinition, TableColumn, View};

use super::{quote_if_needed, Dialect, DialectKind, ParameterType};

/// Postgres dialect provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new Postgres dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Postgres spells many types two ways; `format_type` always reports the
/// long form.
fn canonical_base_type(base: &str) -> &str {
    match base {
        "int" | "int4" | "serial" | "serial4" => "integer",
        "int8" | "bigserial" | "serial8" => "bigint",
        "int2" | "smallserial" | "serial2" => "smallint",
        "bool" => "boolean",
        "float8" | "float" => "double precision",
        "float4" => "real",
        "varchar" => "character varying",
        "char" | "bpchar" => "character",
        "decimal" => "numeric",
        "varbit" => "bit varying",
        other => other,
    }
}

/// `serial` pseudo-types, which the server expands into a sequence default.
fn is_serial_type(type_name: &str) -> bool {
    matches!(
        canonical::type_name(type_name).as_str(),
        "serial" | "serial4" | "bigserial" | "serial8" | "smallserial" | "serial2"
    )
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn default_schema(&self) -> &'static str {
        "public"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Dollar
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_if_needed(name, '"')
    }

    fn canonicalize_type(&self, type_name: &str) -> String {
        let text = canonical::type_name(type_name);
        let (text, array) = text
            .strip_suffix("[]")
            .map_or_else(|| (text.clone(), ""), |t| (t.to_string(), "[]"));

        // "timestamp(3) with time zone" splits into the name around "(3)".
        let (key, args) = match (text.find('('), text.find(')')) {
            (Some(open), Some(close)) if close > open => (
                format!("{}{}", &text[..open], &text[close + 1..]),
                &text[open..=close],
            ),
            _ => (text.clone(), ""),
        };

        match key.as_str() {
            "timestamp" | "timestamp without time zone" => {
                format!("timestamp{args} without time zone{array}")
            }
            "time" | "time without time zone" => format!("time{args} without time zone{array}"),
            "timestamptz" | "timestamp with time zone" => {
                format!("timestamp{args} with time zone{array}")
            }
            "timetz" | "time with time zone" => format!("time{args} with time zone{array}"),
            other => format!("{}{args}{array}", canonical_base_type(other)),
        }
    }

    fn is_implicit_default(&self, expected: &TableColumn, actual_default: &str) -> bool {
        expected.default_expression.is_none()
            && is_serial_type(&expected.column_type)
            && canonical::expression(actual_default).starts_with("nextval(")
    }

    fn add_application_name(&self, connection_string: &str, application_name: &str) -> String {
        let application_name = application_name.trim();
        if application_name.is_empty() {
            return connection_string.to_string();
        }
        if connection_string::is_url(connection_string) {
            connection_string::append_query_parameter(
                connection_string,
                "application_name",
                application_name,
            )
        } else {
            format!("{} application_name='{application_name}'", connection_string.trim_end())
        }
    }

    fn connection_string_for_database(&self, connection_string: &str, database: &str) -> Result<String> {
        connection_string::replace_url_database(connection_string, database)
    }

    fn parameter_type_name(&self, parameter_type: ParameterType) -> &'static str {
        match parameter_type {
            ParameterType::Boolean => "boolean",
            ParameterType::TinyInt | ParameterType::SmallInt => "smallint",
            ParameterType::Integer => "integer",
            ParameterType::BigInt => "bigint",
            ParameterType::Real => "real",
            ParameterType::Double => "double precision",
            ParameterType::Text => "text",
            ParameterType::Binary => "bytea",
            ParameterType::Date => "date",
            ParameterType::Time => "time",
            ParameterType::Timestamp => "timestamp",
            ParameterType::TimestampTz => "timestamptz",
            ParameterType::Json => "jsonb",
        }
    }

    fn create_schema_sql(&self, schema: &str) -> Option<String> {
        Some(format!(
            "CREATE SCHEMA IF NOT EXISTS {}",
            self.quote_identifier(schema)
        ))
    }

    fn drop_table_sql(&self, table: &QualifiedName) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", self.qualify(table))
    }

    fn alter_column_sql(&self, table: &QualifiedName, change: &ColumnChange<'_>) -> Option<Vec<String>> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.qualify(table),
            self.quote_identifier(&change.expected.name)
        );
        let mut statements = Vec::new();

        if change.type_changed {
            statements.push(format!(
                "{prefix} TYPE {ty} USING {col}::{ty}",
                ty = change.expected.column_type,
                col = self.quote_identifier(&change.expected.name)
            ));
        }
        if change.nullability_changed {
            if change.expected.is_nullable() {
                statements.push(format!("{prefix} DROP NOT NULL"));
            } else {
                statements.push(format!("{prefix} SET NOT NULL"));
            }
        }
        if change.default_changed {
            statements.push(change.expected.default_expression.as_ref().map_or_else(
                || format!("{prefix} DROP DEFAULT"),
                |default| format!("{prefix} SET DEFAULT {default}"),
            ));
        }
        Some(statements)
    }

    fn create_index_sql(&self, table: &QualifiedName, index: &IndexDefinition) -> Result<String> {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&index.index_name(table)));
        sql.push_str(" ON ");
        sql.push_str(&self.qualify(table));
        if let Some(method) = index.effective_method() {
            sql.push_str(" USING ");
            sql.push_str(&method);
        }
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

    fn drop_view_sql(&self, view: &View) -> Result<String> {
        Ok(format!(
            "DROP {} IF EXISTS {} CASCADE",
            view.kind.keyword(),
            self.qualify(&view.identifier)
        ))
    }

    fn check_view_kind(&self, _kind: crate::schema::ViewKind) -> Result<()> {
        Ok(())
    }

    fn execute_dynamic_sql(&self, body: &str) -> Result<String> {
        let trimmed = body.trim().trim_end_matches(';').trim_end();
        if trimmed.is_empty() {
            return Err(SchemaError::InvalidDefinition("empty routine body".to_string()));
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexDefinition, Table, TableColumn, ViewKind};

    fn people() -> QualifiedName {
        QualifiedName::new("public", "people").unwrap()
    }

    #[test]
    fn test_canonicalize_type_aliases() {
        let d = PostgresDialect;
        assert_eq!(d.canonicalize_type("varchar(200)"), "character varying(200)");
        assert_eq!(d.canonicalize_type("INT"), "integer");
        assert_eq!(d.canonicalize_type("int4"), "integer");
        assert_eq!(d.canonicalize_type("bool"), "boolean");
        assert_eq!(d.canonicalize_type("timestamptz"), "timestamp with time zone");
        assert_eq!(d.canonicalize_type("timestamp"), "timestamp without time zone");
        assert_eq!(d.canonicalize_type("timestamp(3)"), "timestamp(3) without time zone");
        assert_eq!(
            d.canonicalize_type("timestamp(3) with time zone"),
            "timestamp(3) with time zone"
        );
        assert_eq!(d.canonicalize_type("DECIMAL(10, 2)"), "numeric(10,2)");
        assert_eq!(d.canonicalize_type("int[]"), "integer[]");
        assert_eq!(d.canonicalize_type("jsonb"), "jsonb");
    }

    #[test]
    fn test_application_name() {
        let d = PostgresDialect;
        assert_eq!(
            d.add_application_name("postgres://h/db", "worker"),
            "postgres://h/db?application_name=worker"
        );
        assert_eq!(
            d.add_application_name("host=h dbname=db", "worker"),
            "host=h dbname=db application_name='worker'"
        );
        assert_eq!(d.add_application_name("postgres://h/db", "  "), "postgres://h/db");
    }

    #[test]
    fn test_create_table_sql() {
        let table = Table::new(people())
            .column(TableColumn::new("id", "bigint").primary_key())
            .column(TableColumn::new("name", "varchar(100)").default_value("'anon'"));
        assert_eq!(
            PostgresDialect.create_table_sql(&table),
            "CREATE TABLE public.people (\n    id bigint NOT NULL,\n    name varchar(100) DEFAULT 'anon',\n    CONSTRAINT pkey_people_id PRIMARY KEY (id)\n)"
        );
    }

    #[test]
    fn test_alter_column_sql() {
        let expected = TableColumn::new("age", "bigint").not_null();
        let actual = TableColumn::new("age", "integer").default_value("0");
        let change = ColumnChange::between(&PostgresDialect, &expected, &actual);
        let statements = PostgresDialect.alter_column_sql(&people(), &change).unwrap();
        assert_eq!(
            statements,
            vec![
                "ALTER TABLE public.people ALTER COLUMN age TYPE bigint USING age::bigint",
                "ALTER TABLE public.people ALTER COLUMN age SET NOT NULL",
                "ALTER TABLE public.people ALTER COLUMN age DROP DEFAULT",
            ]
        );
    }

    #[test]
    fn test_serial_sequence_default_is_not_a_change() {
        let live_default = "nextval('people_id_seq'::regclass)";
        let actual = TableColumn::new("id", "integer").not_null().default_value(live_default);

        let expected = TableColumn::new("id", "serial").not_null();
        assert!(!ColumnChange::between(&PostgresDialect, &expected, &actual).has_changes());
        let expected = TableColumn::new("id", "BIGSERIAL").not_null();
        let actual_big = TableColumn::new("id", "bigint").not_null().default_value(live_default);
        assert!(!ColumnChange::between(&PostgresDialect, &expected, &actual_big).has_changes());

        // A plain integer column still loses a sequence default it should not have.
        let expected = TableColumn::new("id", "integer").not_null();
        assert!(ColumnChange::between(&PostgresDialect, &expected, &actual).default_changed);
    }

    #[test]
    fn test_full_text_index_sql() {
        let index = IndexDefinition::full_text(vec!["data ->> 'name'".to_string()]);
        assert_eq!(
            PostgresDialect.create_index_sql(&people(), &index).unwrap(),
            "CREATE INDEX people_idx_fts ON public.people USING gin (to_tsvector('english', data ->> 'name'))"
        );
    }

    #[test]
    fn test_partial_unique_index_sql() {
        let index = IndexDefinition::new(vec!["email".to_string()])
            .unique()
            .predicate("deleted = false");
        assert_eq!(
            PostgresDialect.create_index_sql(&people(), &index).unwrap(),
            "CREATE UNIQUE INDEX people_idx_email ON public.people (email) WHERE deleted = false"
        );
        assert_eq!(
            PostgresDialect.drop_index_sql(&people(), "people_idx_email"),
            "DROP INDEX IF EXISTS public.people_idx_email"
        );
    }

    #[test]
    fn test_view_keyword() {
        let view = crate::schema::View::new(people(), "select 1").materialized().access_method("heap");
        assert_eq!(view.kind, ViewKind::Materialized);
        assert_eq!(
            PostgresDialect.drop_view_sql(&view).unwrap(),
            "DROP MATERIALIZED VIEW IF EXISTS public.people CASCADE"
        );
    }

    #[test]
    fn test_execute_dynamic_sql_trims_terminator() {
        assert_eq!(
            PostgresDialect
                .execute_dynamic_sql("CREATE FUNCTION f() RETURNS int AS $$ select 1 $$ LANGUAGE sql;\n")
                .unwrap(),
            "CREATE FUNCTION f() RETURNS int AS $$ select 1 $$ LANGUAGE sql"
        );
        assert!(PostgresDialect.execute_dynamic_sql("  ;").is_err());
    }
}
