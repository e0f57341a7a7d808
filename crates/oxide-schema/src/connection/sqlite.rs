//! SQLite connections through an sqlx pool.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Database, Row as _, Sqlite, TypeInfo, ValueRef};
use tracing::debug;

use super::{Connector, SchemaConnection};
use crate::command::{Command, Row, Value};
use crate::dialect::{Dialect, SqliteDialect};
use crate::error::{Result, SchemaError};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, <Sqlite as Database>::Arguments<'q>>;

fn bind_values<'q>(mut query: SqliteQuery<'q>, values: &[Value]) -> SqliteQuery<'q> {
    for value in values {
        query = match value {
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(v) => query.bind(*v),
            Value::Int(v) => query.bind(*v),
            Value::Float(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        // Storage class of the value, not the declared column type.
        let value = match raw.type_info().name() {
            "INTEGER" | "BOOLEAN" => Value::Int(row.try_get_unchecked::<i64, _>(index)?),
            "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
            "TEXT" => Value::Text(row.try_get_unchecked::<String, _>(index)?),
            other => {
                return Err(SchemaError::UnexpectedRow(format!(
                    "unsupported SQLite value of type {other} in column {index}"
                )))
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

#[async_trait]
impl SchemaConnection for SqlitePool {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(SqliteDialect)
    }

    async fn fetch_rows(&self, command: &Command) -> Result<Vec<Row>> {
        debug!(sql = %command.sql, parameters = command.parameters.len(), "Fetching rows");
        let rows = bind_values(sqlx::query(&command.sql), &command.parameters)
            .fetch_all(self)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let result = sqlx::query(sql).execute(self).await?;
        Ok(result.rows_affected())
    }
}

/// Opens SQLite pools, one per database file.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    max_connections: u32,
}

impl SqliteConnector {
    /// Creates a connector opening pools of `max_connections`.
    #[must_use]
    pub fn new(max_connections: u32) -> Self {
        Self { max_connections }
    }
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    type Connection = SqlitePool;

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(SqliteDialect)
    }

    async fn connect(&self, connection_string: &str) -> Result<SqlitePool> {
        Ok(SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect(connection_string)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandBuilder;
    use tokio_util::sync::CancellationToken;

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_rows_binds_and_decodes() {
        let pool = pool().await;
        pool.execute("CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, score REAL)")
            .await
            .unwrap();
        pool.execute("INSERT INTO people VALUES (1, 'ada', 1.5), (2, NULL, NULL)")
            .await
            .unwrap();

        let dialect = SqliteDialect;
        let mut builder = CommandBuilder::new(&dialect);
        builder
            .append("SELECT id, name, score FROM people WHERE id >= ")
            .append_parameter(1_i64)
            .append(" ORDER BY id");
        let rows = pool.fetch_rows(&builder.build()).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(0).unwrap(), &Value::Int(1));
        assert_eq!(rows[0].text(1).unwrap().as_deref(), Some("ada"));
        assert_eq!(rows[0].get(2).unwrap(), &Value::Float(1.5));
        assert_eq!(rows[1].get(1).unwrap(), &Value::Null);
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts() {
        let pool = pool().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pool.execute_cancellable("CREATE TABLE t (id int)", &cancel).await;
        assert!(matches!(result, Err(SchemaError::Cancelled)));
        let rows = pool
            .fetch_rows(&Command::new("SELECT name FROM sqlite_master WHERE name = 't'"))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
