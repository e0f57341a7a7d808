//! Many databases on one server.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{admin, DatabaseHandle, DatabaseSpecification, ProvisioningCache, ProvisioningOptions};
use crate::connection::{Connector, SchemaConnection};
use crate::error::{Result, SchemaError};

/// Databases sharing one server, addressed by swapping the database part
/// of the master connection string.
pub struct SingleServerDatabaseCollection<K: Connector> {
    connector: K,
    master_connection_string: String,
    specification: DatabaseSpecification,
    options: ProvisioningOptions,
    cache: ProvisioningCache<K::Connection>,
}

impl<K: Connector> SingleServerDatabaseCollection<K> {
    /// Creates a collection on the server behind `master_connection_string`.
    #[must_use]
    pub fn new(connector: K, master_connection_string: impl Into<String>) -> Self {
        Self {
            connector,
            master_connection_string: master_connection_string.into(),
            specification: DatabaseSpecification::default(),
            options: ProvisioningOptions::default(),
            cache: ProvisioningCache::new(),
        }
    }

    /// Sets the settings used for new databases.
    #[must_use]
    pub fn with_specification(mut self, specification: DatabaseSpecification) -> Self {
        self.specification = specification;
        self
    }

    /// Sets the provisioning options.
    #[must_use]
    pub fn with_options(mut self, options: ProvisioningOptions) -> Self {
        self.options = options;
        self
    }

    /// Names of the databases provisioned so far, sorted.
    #[must_use]
    pub fn database_names(&self) -> Vec<String> {
        self.cache.names()
    }

    /// Returns the cached handle for `name`, creating the database first if
    /// this collection has not seen it yet.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::ProvisioningTimeout` when the collection lock is
    /// not acquired within the configured wait, `SchemaError::Cancelled` when
    /// `cancel` fires, and any connection or DDL error.
    pub async fn find_or_create_database(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<std::sync::Arc<DatabaseHandle<K::Connection>>> {
        if let Some(handle) = self.cache.get(name) {
            return Ok(handle);
        }

        let dialect = self.connector.dialect();
        let master_string = self.options.tag(dialect.as_ref(), &self.master_connection_string);
        let master = cancellable(cancel, self.connector.connect(&master_string)).await?;

        let _guard = self.cache.lock(name, self.options.lock_timeout).await?;
        if let Some(handle) = self.cache.get(name) {
            debug!(database = %name, "Database provisioned while waiting for the lock");
            return Ok(handle);
        }

        if self.options.drop_and_recreate {
            warn!(database = %name, "Dropping database before recreating it");
            for sql in admin::drop_database_sql(dialect.as_ref(), name)? {
                master.execute_cancellable(&sql, cancel).await?;
            }
        }

        let exists = !master
            .fetch_rows_cancellable(&admin::database_exists_command(dialect.as_ref(), name)?, cancel)
            .await?
            .is_empty();
        if exists {
            debug!(database = %name, "Database already exists");
        } else {
            info!(database = %name, "Creating database");
            for sql in self.specification.create_database_sql(dialect.as_ref(), name)? {
                master.execute_cancellable(&sql, cancel).await?;
            }
        }

        let connection_string = self.options.tag(
            dialect.as_ref(),
            &dialect.connection_string_for_database(&self.master_connection_string, name)?,
        );
        let connection = cancellable(cancel, self.connector.connect(&connection_string)).await?;
        Ok(self.cache.insert(DatabaseHandle::new(name, connection_string, connection)))
    }
}

async fn cancellable<T>(cancel: &CancellationToken, future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SchemaError::Cancelled),
        result = future => result,
    }
}
