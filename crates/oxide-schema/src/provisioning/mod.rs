//! Lazy, race-free creation of named databases.
//!
//! A collection hands out one cached [`DatabaseHandle`] per database name.
//! The first request for a name creates the database; concurrent first
//! requests are serialized by a single lock per collection, acquired with a
//! bounded wait, and the cache is checked again once the lock is held so
//! only one of them ever runs `CREATE DATABASE`. Cache hits never lock.

pub mod admin;
mod single_instance;
mod single_server;
mod specification;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};

pub use single_instance::{DatabaseInstanceFactory, SingleInstanceDatabaseCollection, SqliteFileFactory};
pub use single_server::SingleServerDatabaseCollection;
pub use specification::{DatabaseSpecification, ProvisioningOptions};

use crate::error::{Result, SchemaError};

/// A provisioned database and an open connection to it.
pub struct DatabaseHandle<C> {
    name: String,
    connection_string: String,
    connection: C,
}

impl<C> DatabaseHandle<C> {
    /// Wraps an open connection.
    #[must_use]
    pub fn new(name: impl Into<String>, connection_string: impl Into<String>, connection: C) -> Self {
        Self {
            name: name.into(),
            connection_string: connection_string.into(),
            connection,
        }
    }

    /// Database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Connection string targeting this database.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// The open connection.
    #[must_use]
    pub const fn connection(&self) -> &C {
        &self.connection
    }
}

impl<C> fmt::Debug for DatabaseHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Handle cache plus the lock guarding creation.
struct ProvisioningCache<C> {
    databases: DashMap<String, Arc<DatabaseHandle<C>>>,
    lock: Mutex<()>,
}

impl<C> ProvisioningCache<C> {
    fn new() -> Self {
        Self {
            databases: DashMap::new(),
            lock: Mutex::new(()),
        }
    }

    fn get(&self, name: &str) -> Option<Arc<DatabaseHandle<C>>> {
        self.databases.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn insert(&self, handle: DatabaseHandle<C>) -> Arc<DatabaseHandle<C>> {
        let handle = Arc::new(handle);
        self.databases.insert(handle.name.clone(), Arc::clone(&handle));
        handle
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Waits at most `timeout` for the creation lock.
    async fn lock(&self, database: &str, timeout: Duration) -> Result<MutexGuard<'_, ()>> {
        tokio::time::timeout(timeout, self.lock.lock())
            .await
            .map_err(|_| SchemaError::ProvisioningTimeout {
                database: database.to_string(),
                waited: timeout,
            })
    }
}
