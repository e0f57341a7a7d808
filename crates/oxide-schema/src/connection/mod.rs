//! Live database connections.
//!
//! The engine only needs two capabilities from a driver: run a catalog query
//! and get its rows back as [`Row`] values, and execute one DDL statement.
//! Both are async and have cancellable variants that abort the in-flight
//! driver future when the token fires.

mod postgres;
mod sqlite;
#[cfg(feature = "mssql")]
mod sqlserver;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use postgres::PostgresConnector;
pub use sqlite::SqliteConnector;
#[cfg(feature = "mssql")]
pub use sqlserver::{SqlServerConnection, SqlServerConnector};

use crate::command::{Command, Row};
use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};

/// A live connection the engine can introspect and migrate.
#[async_trait]
pub trait SchemaConnection: Send + Sync {
    /// Dialect spoken by this connection.
    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Runs a query and returns every row.
    async fn fetch_rows(&self, command: &Command) -> Result<Vec<Row>>;

    /// Executes one statement and returns the affected row count.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// [`SchemaConnection::fetch_rows`], aborted when `cancel` fires.
    async fn fetch_rows_cancellable(&self, command: &Command, cancel: &CancellationToken) -> Result<Vec<Row>> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SchemaError::Cancelled),
            rows = self.fetch_rows(command) => rows,
        }
    }

    /// [`SchemaConnection::execute`], aborted when `cancel` fires.
    async fn execute_cancellable(&self, sql: &str, cancel: &CancellationToken) -> Result<u64> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SchemaError::Cancelled),
            count = self.execute(sql) => count,
        }
    }
}

/// Opens connections to named databases on one server.
///
/// Used by the provisioning collections: the master connection creates
/// databases, the per-database connections are handed to callers.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connection type produced.
    type Connection: SchemaConnection + 'static;

    /// Dialect of the server.
    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Opens a connection using `connection_string`.
    async fn connect(&self, connection_string: &str) -> Result<Self::Connection>;
}
