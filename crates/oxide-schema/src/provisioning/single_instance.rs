//! One connection target per database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DatabaseHandle, ProvisioningCache, ProvisioningOptions};
use crate::connection::SchemaConnection;
use crate::error::{Result, SchemaError};

/// Creates and opens standalone database instances.
#[async_trait]
pub trait DatabaseInstanceFactory: Send + Sync {
    /// Connection type produced.
    type Connection: SchemaConnection + 'static;

    /// Connection string of the instance for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDefinition`] for names that can not
    /// address an instance.
    fn connection_string(&self, name: &str) -> Result<String>;

    /// Removes the instance for `name` if it exists.
    ///
    /// # Errors
    ///
    /// Returns any IO or server error other than the instance being absent.
    async fn drop_instance(&self, name: &str) -> Result<()>;

    /// Opens the instance for `name`, creating it when missing.
    async fn open(&self, name: &str) -> Result<Self::Connection>;
}

/// Files SQLite keeps next to a database in WAL mode.
const SQLITE_SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// SQLite database files, one per name, in a directory.
#[derive(Debug, Clone)]
pub struct SqliteFileFactory {
    directory: PathBuf,
    max_connections: u32,
}

impl SqliteFileFactory {
    /// Stores database files in `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            max_connections: 5,
        }
    }

    /// Sets the pool size of each database.
    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Path of the file for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDefinition`] for empty names and names
    /// containing path separators.
    pub fn path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(SchemaError::InvalidDefinition(format!(
                "'{name}' can not be used as a SQLite database file name"
            )));
        }
        Ok(self.directory.join(format!("{name}.db")))
    }

    /// The directory holding the files.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl DatabaseInstanceFactory for SqliteFileFactory {
    type Connection = SqlitePool;

    fn connection_string(&self, name: &str) -> Result<String> {
        Ok(format!("sqlite://{}", self.path(name)?.display()))
    }

    async fn drop_instance(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        // A WAL-mode database leaves its journal beside the main file.
        let mut files = vec![path.clone()];
        files.extend(SQLITE_SIDECAR_SUFFIXES.iter().map(|suffix| {
            let mut sidecar = path.clone().into_os_string();
            sidecar.push(suffix);
            PathBuf::from(sidecar)
        }));
        for file in files {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => debug!(path = %file.display(), "Removed database file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn open(&self, name: &str) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(self.path(name)?)
            .create_if_missing(true);
        Ok(SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?)
    }
}

/// Databases that each live on their own instance.
pub struct SingleInstanceDatabaseCollection<F: DatabaseInstanceFactory> {
    factory: F,
    options: ProvisioningOptions,
    cache: ProvisioningCache<F::Connection>,
}

impl<F: DatabaseInstanceFactory> SingleInstanceDatabaseCollection<F> {
    /// Creates a collection backed by `factory`.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            options: ProvisioningOptions::default(),
            cache: ProvisioningCache::new(),
        }
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

    /// Returns the cached handle for `name`, opening (and creating) the
    /// instance on first use.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::ProvisioningTimeout` when the collection lock is
    /// not acquired within the configured wait, `SchemaError::Cancelled` when
    /// `cancel` fires, and any IO or connection error.
    pub async fn find_or_create_database(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<DatabaseHandle<F::Connection>>> {
        if let Some(handle) = self.cache.get(name) {
            return Ok(handle);
        }

        let _guard = self.cache.lock(name, self.options.lock_timeout).await?;
        if let Some(handle) = self.cache.get(name) {
            debug!(database = %name, "Database provisioned while waiting for the lock");
            return Ok(handle);
        }

        if self.options.drop_and_recreate {
            warn!(database = %name, "Dropping database before recreating it");
            self.factory.drop_instance(name).await?;
        }

        info!(database = %name, "Opening database instance");
        let connection_string = self.factory.connection_string(name)?;
        let connection = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SchemaError::Cancelled),
            connection = self.factory.open(name) => connection?,
        };
        Ok(self.cache.insert(DatabaseHandle::new(name, connection_string, connection)))
    }
}
