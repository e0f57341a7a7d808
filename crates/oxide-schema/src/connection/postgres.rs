//! Postgres connections through an sqlx pool.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Database, Postgres, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use super::{Connector, SchemaConnection};
use crate::command::{Command, Row, Value};
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{Result, SchemaError};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, <Postgres as Database>::Arguments<'q>>;

fn bind_values<'q>(mut query: PgQuery<'q>, values: &[Value]) -> PgQuery<'q> {
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

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(Value::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();
        let value = match type_name.as_str() {
            "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
            "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
            "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(index)?)),
            "INT8" => Value::Int(row.try_get::<i64, _>(index)?),
            "FLOAT4" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
            "FLOAT8" => Value::Float(row.try_get::<f64, _>(index)?),
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" | "UNKNOWN" => {
                Value::Text(row.try_get_unchecked::<String, _>(index)?)
            }
            other => {
                return Err(SchemaError::UnexpectedRow(format!(
                    "unsupported Postgres value of type {other} in column {index}; cast it to text"
                )))
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

#[async_trait]
impl SchemaConnection for PgPool {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(PostgresDialect)
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
        // Unprepared so bodies with several statements are accepted.
        let result = sqlx::raw_sql(sql).execute(self).await?;
        Ok(result.rows_affected())
    }
}

/// Opens Postgres pools.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    max_connections: u32,
}

impl PostgresConnector {
    /// Creates a connector opening pools of `max_connections`.
    #[must_use]
    pub fn new(max_connections: u32) -> Self {
        Self { max_connections }
    }
}

impl Default for PostgresConnector {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    type Connection = PgPool;

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(PostgresDialect)
    }

    async fn connect(&self, connection_string: &str) -> Result<PgPool> {
        Ok(PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(connection_string)
            .await?)
    }
}
