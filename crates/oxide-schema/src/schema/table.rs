//! Tables, columns and structural table deltas.

use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::command::{Command, CommandBuilder, Row};
use crate::dialect::{Dialect, DialectKind};
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;
use crate::migrator::{Migrator, SqlScript};

use super::IndexDefinition;

/// Separator used when a catalog query aggregates index columns.
const COLUMN_SEPARATOR: char = '\u{1f}';

fn default_true() -> bool {
    true
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    /// Column name.
    pub name: String,
    /// Type as dialect text (`varchar(200)`, `int`, ...).
    #[serde(rename = "type")]
    pub column_type: String,
    /// Whether NULL is allowed. Ignored for primary key columns.
    #[serde(default = "default_true")]
    pub allow_nulls: bool,
    /// Default value expression.
    #[serde(default)]
    pub default_expression: Option<String>,
    /// Primary key membership.
    #[serde(default)]
    pub is_primary_key: bool,
}

impl TableColumn {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
            allow_nulls: true,
            default_expression: None,
            is_primary_key: false,
        }
    }

    /// Disallows NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.allow_nulls = false;
        self
    }

    /// Makes the column part of the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.allow_nulls = false;
        self
    }

    /// Sets the default value expression.
    #[must_use]
    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default_expression = Some(expression.into());
        self
    }

    /// Effective nullability; primary key columns are never nullable.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.allow_nulls && !self.is_primary_key
    }
}

/// How one column differs from its live counterpart.
#[derive(Debug, Clone, Copy)]
pub struct ColumnChange<'a> {
    /// Desired column.
    pub expected: &'a TableColumn,
    /// Live column.
    pub actual: &'a TableColumn,
    /// Canonical types differ.
    pub type_changed: bool,
    /// Nullability differs.
    pub nullability_changed: bool,
    /// Default expressions differ.
    pub default_changed: bool,
}

impl<'a> ColumnChange<'a> {
    /// Compares two same-named columns.
    #[must_use]
    pub fn between(dialect: &dyn Dialect, expected: &'a TableColumn, actual: &'a TableColumn) -> Self {
        let default = |c: &TableColumn| c.default_expression.as_deref().map(canonical::expression);
        Self {
            expected,
            actual,
            type_changed: dialect.canonicalize_type(&expected.column_type)
                != dialect.canonicalize_type(&actual.column_type),
            nullability_changed: expected.is_nullable() != actual.is_nullable(),
            default_changed: default(expected) != default(actual)
                && !actual
                    .default_expression
                    .as_deref()
                    .is_some_and(|live| dialect.is_implicit_default(expected, live)),
        }
    }

    /// Returns true when anything differs.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.type_changed || self.nullability_changed || self.default_changed
    }
}

/// A table with its columns and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub identifier: QualifiedName,
    /// Columns in order.
    #[serde(default)]
    pub columns: Vec<TableColumn>,
    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDefinition>,
}

impl Table {
    /// Creates an empty table.
    #[must_use]
    pub fn new(identifier: QualifiedName) -> Self {
        Self {
            identifier,
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, column: TableColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column names in declaration order.
    #[must_use]
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Name of the primary key constraint: `pkey_{table}_{columns}`.
    #[must_use]
    pub fn primary_key_name(&self) -> String {
        format!(
            "pkey_{}_{}",
            self.identifier.name(),
            self.primary_key_columns().join("_")
        )
        .to_lowercase()
    }

    /// Derived names of every index.
    #[must_use]
    pub fn index_names(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|i| i.index_name(&self.identifier))
            .collect()
    }

    /// Writes drop-if-exists, `CREATE TABLE` and every index.
    ///
    /// # Errors
    ///
    /// Returns an error when an index cannot be written for the dialect.
    pub fn write_create_statement(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        let dialect = migrator.dialect();
        script.comment(format!("Creating table {}", self.identifier));
        script.statement(dialect.drop_table_sql(&self.identifier));
        script.statement(dialect.create_table_sql(self));
        for index in &self.indexes {
            script.statement(dialect.create_index_sql(&self.identifier, index)?);
        }
        Ok(())
    }

    /// Writes `DROP TABLE IF EXISTS`.
    pub fn write_drop_statement(&self, migrator: &Migrator, script: &mut SqlScript) {
        script.comment(format!("Dropping table {}", self.identifier));
        script.statement(migrator.dialect().drop_table_sql(&self.identifier));
    }

    /// Column and index catalog queries, in that order.
    ///
    /// Column rows are `(name, type, nullable, default, pk_position)`. Index
    /// rows are `(name, unique, method, columns, predicate)`, except on
    /// SQLite where the fourth value is the index's `CREATE` text.
    #[must_use]
    pub fn introspection_commands(&self, dialect: &dyn Dialect) -> Vec<Command> {
        let schema = self.identifier.schema();
        let name = self.identifier.name();

        let mut columns = CommandBuilder::new(dialect);
        let mut indexes = CommandBuilder::new(dialect);
        match dialect.kind() {
            DialectKind::Postgres => {
                columns
                    .append(
                        "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod)::text, \
                         NOT a.attnotnull, pg_get_expr(d.adbin, d.adrelid)::text, \
                         (SELECT array_position(i.indkey::int2[], a.attnum) FROM pg_index i \
                          WHERE i.indrelid = c.oid AND i.indisprimary) \
                         FROM pg_attribute a \
                         JOIN pg_class c ON c.oid = a.attrelid \
                         JOIN pg_namespace n ON n.oid = c.relnamespace \
                         LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
                         WHERE n.nspname = ",
                    )
                    .append_parameter(schema)
                    .append(" AND c.relname = ")
                    .append_parameter(name)
                    .append(
                        " AND c.relkind IN ('r', 'p') AND a.attnum > 0 AND NOT a.attisdropped \
                         ORDER BY a.attnum",
                    );
                indexes
                    .append(
                        "SELECT ic.relname::text, ix.indisunique, am.amname::text, \
                         array_to_string(ARRAY(SELECT pg_get_indexdef(ix.indexrelid, k + 1, true) \
                           FROM generate_subscripts(ix.indkey, 1) AS k \
                           WHERE k < ix.indnkeyatts ORDER BY k), chr(31)), \
                         pg_get_expr(ix.indpred, ix.indrelid, true) \
                         FROM pg_index ix \
                         JOIN pg_class ic ON ic.oid = ix.indexrelid \
                         JOIN pg_class t ON t.oid = ix.indrelid \
                         JOIN pg_namespace n ON n.oid = t.relnamespace \
                         JOIN pg_am am ON am.oid = ic.relam \
                         WHERE n.nspname = ",
                    )
                    .append_parameter(schema)
                    .append(" AND t.relname = ")
                    .append_parameter(name)
                    .append(" AND NOT ix.indisprimary ORDER BY ic.relname");
            }
            DialectKind::SqlServer => {
                let qualified = dialect.qualify(&self.identifier);
                columns
                    .append(
                        "SELECT c.name, \
                         CASE \
                           WHEN ty.name IN ('varchar', 'char', 'varbinary', 'binary') \
                             THEN ty.name + '(' + CASE WHEN c.max_length = -1 THEN 'max' \
                               ELSE CAST(c.max_length AS varchar(10)) END + ')' \
                           WHEN ty.name IN ('nvarchar', 'nchar') \
                             THEN ty.name + '(' + CASE WHEN c.max_length = -1 THEN 'max' \
                               ELSE CAST(c.max_length / 2 AS varchar(10)) END + ')' \
                           WHEN ty.name IN ('decimal', 'numeric') \
                             THEN ty.name + '(' + CAST(c.precision AS varchar(10)) + ',' \
                               + CAST(c.scale AS varchar(10)) + ')' \
                           ELSE ty.name END, \
                         c.is_nullable, dc.definition, CAST(ic.key_ordinal AS int) \
                         FROM sys.columns c \
                         JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
                         LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id \
                         LEFT JOIN sys.indexes pk ON pk.object_id = c.object_id AND pk.is_primary_key = 1 \
                         LEFT JOIN sys.index_columns ic ON ic.object_id = pk.object_id \
                           AND ic.index_id = pk.index_id AND ic.column_id = c.column_id \
                         WHERE c.object_id = OBJECT_ID(",
                    )
                    .append_parameter(qualified.as_str())
                    .append(", 'U') ORDER BY c.column_id");
                indexes
                    .append(
                        "SELECT i.name, i.is_unique, CAST(NULL AS nvarchar(128)), \
                         STRING_AGG(c.name, CHAR(31)) WITHIN GROUP (ORDER BY ic.key_ordinal), \
                         MAX(i.filter_definition) \
                         FROM sys.indexes i \
                         JOIN sys.index_columns ic ON ic.object_id = i.object_id \
                           AND ic.index_id = i.index_id AND ic.is_included_column = 0 \
                         JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
                         WHERE i.object_id = OBJECT_ID(",
                    )
                    .append_parameter(qualified.as_str())
                    .append(
                        ", 'U') AND i.is_primary_key = 0 AND i.type > 0 \
                         GROUP BY i.index_id, i.name, i.is_unique ORDER BY i.name",
                    );
            }
            DialectKind::Sqlite => {
                columns
                    .append(
                        "SELECT name, type, \"notnull\" = 0, dflt_value, pk \
                         FROM pragma_table_info(",
                    )
                    .append_parameter(name)
                    .append(", ")
                    .append_parameter(schema)
                    .append(") ORDER BY cid");
                indexes
                    .append("SELECT il.name, il.\"unique\", NULL, m.sql, NULL FROM pragma_index_list(")
                    .append_parameter(name)
                    .append(", ")
                    .append_parameter(schema)
                    .append(&format!(
                        ") il JOIN {}.sqlite_master m ON m.type = 'index' AND m.name = il.name \
                         WHERE il.origin = 'c' ORDER BY il.name",
                        dialect.quote_identifier(schema)
                    ));
            }
        }
        vec![columns.build(), indexes.build()]
    }

    /// Reads the live table from the column and index result sets; no column
    /// rows means the table does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnexpectedRow`] for rows of the wrong shape.
    pub fn read_actual(&self, dialect: &dyn Dialect, results: &[Vec<Row>]) -> Result<Option<Self>> {
        let (column_rows, index_rows) = match results {
            [columns, indexes] => (columns, indexes),
            _ => {
                return Err(SchemaError::UnexpectedRow(format!(
                    "expected column and index result sets for {}, got {}",
                    self.identifier,
                    results.len()
                )))
            }
        };
        if column_rows.is_empty() {
            return Ok(None);
        }

        let mut keyed: Vec<(i64, TableColumn)> = Vec::new();
        let mut columns = Vec::with_capacity(column_rows.len());
        for row in column_rows {
            let mut column = TableColumn::new(row.required_text(0)?, row.required_text(1)?);
            column.allow_nulls = row.bool(2)?;
            column.default_expression = row.text(3)?;
            let position = row
                .text(4)?
                .and_then(|p| p.parse::<i64>().ok())
                .filter(|p| *p > 0);
            if let Some(position) = position {
                column.is_primary_key = true;
                keyed.push((position, column.clone()));
            }
            columns.push(column);
        }

        let mut indexes = Vec::with_capacity(index_rows.len());
        for row in index_rows {
            indexes.push(read_index(dialect, row)?);
        }

        let mut table = Self::new(self.identifier.clone());
        table.columns = columns;
        table.indexes = indexes;

        // Keep primary key columns ordered by key position.
        if keyed.len() > 1 {
            keyed.sort_by_key(|(position, _)| *position);
            let order: Vec<String> = keyed.into_iter().map(|(_, c)| c.name).collect();
            table.columns.sort_by_key(|c| {
                order
                    .iter()
                    .position(|name| *name == c.name)
                    .unwrap_or(usize::MAX)
            });
        }
        Ok(Some(table))
    }
}

fn read_index(dialect: &dyn Dialect, row: &Row) -> Result<IndexDefinition> {
    let name = row.required_text(0)?;
    let mut index = IndexDefinition::default().named(name);
    index.unique = row.bool(1)?;
    index.method = row.text(2)?;

    if dialect.kind() == DialectKind::Sqlite {
        let sql = row.text(3)?.unwrap_or_default();
        let (columns, predicate) = parse_sqlite_index_sql(&sql)?;
        index.columns = columns;
        index.predicate = predicate;
    } else {
        index.columns = row
            .text(3)?
            .unwrap_or_default()
            .split(COLUMN_SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        index.predicate = row.text(4)?;
    }
    Ok(index)
}

/// Splits a SQLite `CREATE INDEX` statement into its column list and
/// optional `WHERE` predicate.
fn parse_sqlite_index_sql(sql: &str) -> Result<(Vec<String>, Option<String>)> {
    let lowered = sql.to_ascii_lowercase();
    let on = lowered
        .find(" on ")
        .ok_or_else(|| SchemaError::parse(sql, "index statement has no ON clause"))?;
    let open = sql[on..]
        .find('(')
        .map(|i| i + on)
        .ok_or_else(|| SchemaError::parse(sql, "index statement has no column list"))?;

    let mut depth = 0_usize;
    let mut close = None;
    let mut start = open + 1;
    let mut columns = Vec::new();
    for (i, c) in sql[open..].char_indices().map(|(i, c)| (i + open, c)) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    columns.push(sql[start..i].trim().to_string());
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => {
                columns.push(sql[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(|| SchemaError::parse(sql, "unbalanced column list"))?;

    let rest = sql[close + 1..].trim();
    let predicate = rest
        .get(..5)
        .filter(|keyword| keyword.eq_ignore_ascii_case("where"))
        .map(|keyword| rest[keyword.len()..].trim().to_string())
        .filter(|predicate| !predicate.is_empty());
    Ok((columns, predicate))
}

/// Structural difference between a desired and a live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDelta {
    /// Columns to add.
    pub missing_columns: Vec<TableColumn>,
    /// Columns to drop.
    pub extra_columns: Vec<TableColumn>,
    /// `(expected, actual)` pairs of changed columns.
    pub different_columns: Vec<(TableColumn, TableColumn)>,
    /// Primary key column lists differ.
    pub primary_key_changed: bool,
    /// Indexes to create.
    pub missing_indexes: Vec<IndexDefinition>,
    /// Live index names to drop.
    pub extra_indexes: Vec<String>,
    /// Indexes to drop and recreate.
    pub changed_indexes: Vec<IndexDefinition>,
}

impl TableDelta {
    /// Compares `expected` against the live `actual` table.
    #[must_use]
    pub fn compute(dialect: &dyn Dialect, expected: &Table, actual: &Table) -> Self {
        let missing_columns = expected
            .columns
            .iter()
            .filter(|c| actual.get_column(&c.name).is_none())
            .cloned()
            .collect();
        let extra_columns = actual
            .columns
            .iter()
            .filter(|c| expected.get_column(&c.name).is_none())
            .cloned()
            .collect();
        let different_columns = expected
            .columns
            .iter()
            .filter_map(|e| actual.get_column(&e.name).map(|a| (e, a)))
            .filter(|(e, a)| ColumnChange::between(dialect, e, a).has_changes())
            .map(|(e, a)| (e.clone(), a.clone()))
            .collect();

        let table = &expected.identifier;
        let live_name = |i: &IndexDefinition| i.index_name(&actual.identifier);
        let mut missing_indexes = Vec::new();
        let mut changed_indexes = Vec::new();
        for index in &expected.indexes {
            let name = index.index_name(table);
            match actual.indexes.iter().find(|a| live_name(a) == name) {
                None => missing_indexes.push(index.clone()),
                Some(live) if !index.matches(live) => changed_indexes.push(index.clone()),
                Some(_) => {}
            }
        }
        let expected_names = expected.index_names();
        let extra_indexes = actual
            .indexes
            .iter()
            .filter(|a| !expected_names.contains(&live_name(a)))
            .map(|a| a.name.clone().unwrap_or_else(|| live_name(a)))
            .collect();

        Self {
            missing_columns,
            extra_columns,
            different_columns,
            primary_key_changed: expected.primary_key_columns() != actual.primary_key_columns(),
            missing_indexes,
            extra_indexes,
            changed_indexes,
        }
    }

    /// Returns true when the tables differ.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !(self.missing_columns.is_empty()
            && self.extra_columns.is_empty()
            && self.different_columns.is_empty()
            && !self.primary_key_changed
            && self.missing_indexes.is_empty()
            && self.extra_indexes.is_empty()
            && self.changed_indexes.is_empty())
    }

    /// In-place statements converging the live table on `expected`, or
    /// `None` when some difference cannot be altered in place.
    ///
    /// # Errors
    ///
    /// Returns an error when an index cannot be written for the dialect.
    pub fn alter_statements(&self, dialect: &dyn Dialect, expected: &Table) -> Result<Option<Vec<String>>> {
        if self.primary_key_changed {
            return Ok(None);
        }
        let table = &expected.identifier;
        let mut statements = Vec::new();

        for name in &self.extra_indexes {
            statements.push(dialect.drop_index_sql(table, name));
        }
        for index in &self.changed_indexes {
            statements.push(dialect.drop_index_sql(table, &index.index_name(table)));
        }
        for column in &self.extra_columns {
            let Some(sql) = dialect.drop_column_sql(table, &column.name) else {
                return Ok(None);
            };
            statements.push(sql);
        }
        for column in &self.missing_columns {
            let Some(sql) = dialect.add_column_sql(table, column) else {
                return Ok(None);
            };
            statements.push(sql);
        }
        for (e, a) in &self.different_columns {
            let change = ColumnChange::between(dialect, e, a);
            let Some(sql) = dialect.alter_column_sql(table, &change) else {
                return Ok(None);
            };
            statements.extend(sql);
        }
        for index in self.changed_indexes.iter().chain(&self.missing_indexes) {
            statements.push(dialect.create_index_sql(table, index)?);
        }
        Ok(Some(statements))
    }

    /// Writes the statements converging the live table on `expected`,
    /// rebuilding the whole table when the dialect cannot alter in place.
    ///
    /// # Errors
    ///
    /// Returns an error when an index cannot be written for the dialect.
    pub fn write_update(&self, migrator: &Migrator, expected: &Table, script: &mut SqlScript) -> Result<()> {
        match self.alter_statements(migrator.dialect(), expected)? {
            Some(statements) => {
                script.comment(format!("Updating table {}", expected.identifier));
                for sql in statements {
                    script.statement(sql);
                }
                Ok(())
            }
            None => {
                script.comment(format!(
                    "Table {} can not be altered in place; rebuilding it",
                    expected.identifier
                ));
                expected.write_create_statement(migrator, script)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Value;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use crate::migrator::SqlFormatting;
    use std::sync::Arc;

    fn hilo() -> Table {
        Table::new(QualifiedName::new("functions", "mt_hilo").unwrap())
            .column(TableColumn::new("entity_name", "varchar(200)").primary_key())
            .column(TableColumn::new("next_value", "int"))
            .column(TableColumn::new("hi_value", "int"))
    }

    fn pg() -> Migrator {
        Migrator::new(Arc::new(PostgresDialect)).with_formatting(SqlFormatting::Concise)
    }

    #[test]
    fn test_create_writes_drop_first() {
        let mut script = SqlScript::new();
        hilo().write_create_statement(&pg(), &mut script).unwrap();
        let statements = script.statements();
        assert!(statements[0].starts_with("DROP TABLE IF EXISTS functions.mt_hilo"));
        assert!(statements[1].starts_with("CREATE TABLE functions.mt_hilo"));
    }

    #[test]
    fn test_identical_live_table_has_no_changes() {
        let live = Table::new(QualifiedName::new("functions", "mt_hilo").unwrap())
            .column(TableColumn::new("entity_name", "character varying(200)").primary_key())
            .column(TableColumn::new("next_value", "integer"))
            .column(TableColumn::new("hi_value", "integer"));
        assert!(!TableDelta::compute(&PostgresDialect, &hilo(), &live).has_changes());
    }

    #[test]
    fn test_added_column_is_altered_in_place() {
        let live = hilo();
        let expected = hilo().column(TableColumn::new("note", "text"));
        let delta = TableDelta::compute(&PostgresDialect, &expected, &live);
        assert!(delta.has_changes());
        assert_eq!(
            delta.alter_statements(&PostgresDialect, &expected).unwrap().unwrap(),
            vec!["ALTER TABLE functions.mt_hilo ADD COLUMN note text"]
        );
    }

    #[test]
    fn test_primary_key_change_rebuilds() {
        let live = hilo();
        let mut expected = hilo();
        expected.columns[1].is_primary_key = true;
        let delta = TableDelta::compute(&PostgresDialect, &expected, &live);
        assert!(delta.primary_key_changed);

        let mut script = SqlScript::new();
        delta.write_update(&pg(), &expected, &mut script).unwrap();
        let statements = script.statements();
        assert!(statements[0].starts_with("DROP TABLE"));
        assert!(statements[1].contains("PRIMARY KEY (entity_name, next_value)"));
    }

    #[test]
    fn test_sqlite_type_change_rebuilds() {
        let live = hilo();
        let mut expected = hilo();
        expected.columns[2].column_type = "bigint".to_string();
        let delta = TableDelta::compute(&SqliteDialect, &expected, &live);
        assert!(delta.alter_statements(&SqliteDialect, &expected).unwrap().is_none());
    }

    #[test]
    fn test_index_differences() {
        let expected = hilo()
            .index(IndexDefinition::new(vec!["next_value".to_string()]))
            .index(IndexDefinition::new(vec!["hi_value".to_string()]).unique());
        let live = hilo()
            .index(IndexDefinition::new(vec!["hi_value".to_string()]).named("mt_hilo_idx_hi_value"))
            .index(IndexDefinition::new(vec!["entity_name".to_string()]).named("old_idx"));
        let delta = TableDelta::compute(&PostgresDialect, &expected, &live);
        assert_eq!(delta.missing_indexes.len(), 1);
        assert_eq!(delta.changed_indexes.len(), 1);
        assert_eq!(delta.extra_indexes, vec!["old_idx".to_string()]);

        let statements = delta.alter_statements(&PostgresDialect, &expected).unwrap().unwrap();
        assert_eq!(
            statements,
            vec![
                "DROP INDEX IF EXISTS functions.old_idx",
                "DROP INDEX IF EXISTS functions.mt_hilo_idx_hi_value",
                "CREATE UNIQUE INDEX mt_hilo_idx_hi_value ON functions.mt_hilo (hi_value)",
                "CREATE INDEX mt_hilo_idx_next_value ON functions.mt_hilo (next_value)",
            ]
        );
    }

    #[test]
    fn test_read_actual_orders_primary_key() {
        let table = Table::new(QualifiedName::new("main", "pairs").unwrap());
        let row = |name: &str, pk: i64| {
            Row::new(vec![
                Value::Text(name.to_string()),
                Value::Text("int".to_string()),
                Value::Int(0),
                Value::Null,
                Value::Int(pk),
            ])
        };
        let results = vec![vec![row("a", 2), row("b", 0), row("c", 1)], Vec::new()];
        let live = table.read_actual(&SqliteDialect, &results).unwrap().unwrap();
        assert_eq!(live.primary_key_columns(), vec!["c", "a"]);
        assert!(!live.get_column("b").unwrap().is_primary_key);
        assert!(!live.get_column("b").unwrap().allow_nulls);
    }

    #[test]
    fn test_read_actual_absent() {
        let results = vec![Vec::new(), Vec::new()];
        assert!(hilo().read_actual(&SqliteDialect, &results).unwrap().is_none());
        assert!(hilo().read_actual(&SqliteDialect, &[]).is_err());
    }

    #[test]
    fn test_parse_sqlite_index_sql() {
        let (columns, predicate) = parse_sqlite_index_sql(
            "CREATE UNIQUE INDEX main.people_idx ON people (lower(email), age) WHERE deleted = 0",
        )
        .unwrap();
        assert_eq!(columns, vec!["lower(email)", "age"]);
        assert_eq!(predicate.as_deref(), Some("deleted = 0"));
        assert!(parse_sqlite_index_sql("CREATE INDEX x").is_err());
    }

    #[test]
    fn test_parse_sqlite_index_sql_with_non_ascii_names() {
        let (columns, predicate) =
            parse_sqlite_index_sql("CREATE INDEX \"İİİİİİ\" ON \"é\" (a)").unwrap();
        assert_eq!(columns, vec!["a"]);
        assert!(predicate.is_none());

        let (columns, predicate) =
            parse_sqlite_index_sql("CREATE INDEX \"ß_idx\" ON \"straße\" (\"größe\") WHERE \"größe\" > 1").unwrap();
        assert_eq!(columns, vec!["\"größe\""]);
        assert_eq!(predicate.as_deref(), Some("\"größe\" > 1"));

        let (_, predicate) = parse_sqlite_index_sql("CREATE INDEX i ON t (a) é").unwrap();
        assert!(predicate.is_none());
    }
}
