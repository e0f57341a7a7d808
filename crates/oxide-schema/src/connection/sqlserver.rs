//! SQL Server connections through tiberius.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tiberius::{Client, ColumnData, Config, Query};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use super::{Connector, SchemaConnection};
use crate::command::{Command, Row, Value};
use crate::dialect::{Dialect, SqlServerDialect};
use crate::error::{Result, SchemaError};

type TdsClient = Client<Compat<TcpStream>>;

/// A client plus whether a request on it was abandoned before its response
/// was fully read.
///
/// Dropping a tiberius future midway (cancellation) leaves unread tokens on
/// the TDS stream, so such a client is discarded and reopened instead of
/// being reused.
struct ClientSlot<C> {
    client: Option<C>,
    in_flight: bool,
}

impl<C> ClientSlot<C> {
    fn new(client: C) -> Self {
        Self {
            client: Some(client),
            in_flight: false,
        }
    }

    /// Hands out a client with a clean stream, reopening one with `open`
    /// when the previous request never called [`ClientSlot::release`].
    async fn checkout<F, Fut>(&mut self, open: F) -> Result<&mut C>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<C>>,
    {
        let client = match self.client.take() {
            Some(client) if !self.in_flight => client,
            previous => {
                if previous.is_some() {
                    warn!("Discarding SQL Server connection after an abandoned request");
                }
                self.in_flight = false;
                open().await?
            }
        };
        self.in_flight = true;
        Ok(self.client.insert(client))
    }

    /// Marks the current request as fully read.
    fn release(&mut self) {
        self.in_flight = false;
    }
}

async fn open_client(connection_string: &str) -> Result<TdsClient> {
    let config = Config::from_ado_string(connection_string)?;
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;
    Ok(Client::connect(config, tcp.compat_write()).await?)
}

/// One tiberius client shared behind a lock; TDS runs one request at a time.
pub struct SqlServerConnection {
    connection_string: String,
    slot: Mutex<ClientSlot<TdsClient>>,
}

impl SqlServerConnection {
    /// Connects using an ADO.NET style connection string.
    ///
    /// # Errors
    ///
    /// Returns an error when the string is invalid or the server refuses the
    /// connection.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let client = open_client(connection_string).await?;
        Ok(Self {
            connection_string: connection_string.to_string(),
            slot: Mutex::new(ClientSlot::new(client)),
        })
    }
}

impl std::fmt::Debug for SqlServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerConnection").finish_non_exhaustive()
    }
}

fn convert(data: ColumnData<'static>, index: usize) -> Result<Value> {
    let value = match data {
        ColumnData::U8(v) => v.map_or(Value::Null, |v| Value::Int(i64::from(v))),
        ColumnData::I16(v) => v.map_or(Value::Null, |v| Value::Int(i64::from(v))),
        ColumnData::I32(v) => v.map_or(Value::Null, |v| Value::Int(i64::from(v))),
        ColumnData::I64(v) => v.map_or(Value::Null, Value::Int),
        ColumnData::F32(v) => v.map_or(Value::Null, |v| Value::Float(f64::from(v))),
        ColumnData::F64(v) => v.map_or(Value::Null, Value::Float),
        ColumnData::Bit(v) => v.map_or(Value::Null, Value::Bool),
        ColumnData::String(v) => v.map_or(Value::Null, |v| Value::Text(v.into_owned())),
        other => {
            return Err(SchemaError::UnexpectedRow(format!(
                "unsupported SQL Server value {other:?} in column {index}"
            )))
        }
    };
    Ok(value)
}

#[async_trait]
impl SchemaConnection for SqlServerConnection {
    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(SqlServerDialect)
    }

    async fn fetch_rows(&self, command: &Command) -> Result<Vec<Row>> {
        debug!(sql = %command.sql, parameters = command.parameters.len(), "Fetching rows");
        let mut query = Query::new(command.sql.as_str());
        for value in &command.parameters {
            match value {
                Value::Null => query.bind(Option::<String>::None),
                Value::Bool(v) => query.bind(*v),
                Value::Int(v) => query.bind(*v),
                Value::Float(v) => query.bind(*v),
                Value::Text(v) => query.bind(v.clone()),
            }
        }

        let mut slot = self.slot.lock().await;
        let client = slot.checkout(|| open_client(&self.connection_string)).await?;
        let rows = query.query(client).await?.into_first_result().await?;
        slot.release();
        drop(slot);

        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .enumerate()
                    .map(|(index, data)| convert(data, index))
                    .collect::<Result<Vec<_>>>()
                    .map(Row::new)
            })
            .collect()
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        debug!(sql = %sql, "Executing SQL");
        let mut slot = self.slot.lock().await;
        let client = slot.checkout(|| open_client(&self.connection_string)).await?;
        let result = client.execute(sql, &[]).await?;
        slot.release();
        Ok(result.total())
    }
}

/// Opens tiberius connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerConnector;

#[async_trait]
impl Connector for SqlServerConnector {
    type Connection = SqlServerConnection;

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::new(SqlServerDialect)
    }

    async fn connect(&self, connection_string: &str) -> Result<SqlServerConnection> {
        SqlServerConnection::connect(connection_string).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_completed_requests_reuse_the_client() {
        let opened = AtomicU32::new(0);
        let counter = &opened;
        let open = move || async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) };
        let mut slot = ClientSlot::new(100_u32);

        for _ in 0..2 {
            assert_eq!(*slot.checkout(open).await.unwrap(), 100);
            slot.release();
        }
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_request_reopens_the_client() {
        let opened = AtomicU32::new(0);
        let counter = &opened;
        let open = move || async move { Ok(counter.fetch_add(1, Ordering::SeqCst)) };
        let slot = Mutex::new(ClientSlot::new(100_u32));
        let cancel = CancellationToken::new();

        let request = async {
            let mut slot = slot.lock().await;
            slot.checkout(open).await?;
            cancel.cancel();
            std::future::pending::<()>().await;
            slot.release();
            Ok::<(), SchemaError>(())
        };
        let result: Result<()> = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(SchemaError::Cancelled),
            result = request => result,
        };
        assert!(matches!(result, Err(SchemaError::Cancelled)));

        let mut slot = slot.lock().await;
        assert_eq!(*slot.checkout(open).await.unwrap(), 0);
        slot.release();
        assert_eq!(*slot.checkout(open).await.unwrap(), 0);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_reopen_is_retried() {
        let mut slot = ClientSlot::new(1_u32);
        slot.checkout(|| async { Ok(0) }).await.unwrap();

        let failed = slot
            .checkout(|| async { Err(SchemaError::InvalidDefinition("refused".to_string())) })
            .await;
        assert!(failed.is_err());
        assert_eq!(*slot.checkout(|| async { Ok(2) }).await.unwrap(), 2);
    }
}
