//! Database creation settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, DialectKind};
use crate::error::{Result, SchemaError};

/// Settings applied by `CREATE DATABASE`. Unset fields are left to the
/// server's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpecification {
    /// Character encoding (`UTF8`, ...).
    #[serde(default)]
    pub encoding: Option<String>,
    /// Owning role.
    #[serde(default)]
    pub owner: Option<String>,
    /// Maximum concurrent connections.
    #[serde(default)]
    pub connection_limit: Option<i32>,
    /// Collation (`LC_COLLATE` on Postgres, `COLLATE` on SQL Server).
    #[serde(default)]
    pub collation: Option<String>,
    /// Character classification (`LC_CTYPE`).
    #[serde(default)]
    pub ctype: Option<String>,
    /// Tablespace holding the database.
    #[serde(default)]
    pub tablespace: Option<String>,
    /// Template database to copy.
    #[serde(default)]
    pub template: Option<String>,
}

impl DatabaseSpecification {
    /// Creates a specification with every setting left to the server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the encoding.
    #[must_use]
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Sets the owner.
    #[must_use]
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the connection limit.
    #[must_use]
    pub fn connection_limit(mut self, limit: i32) -> Self {
        self.connection_limit = Some(limit);
        self
    }

    /// Sets the collation.
    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Sets the character classification.
    #[must_use]
    pub fn ctype(mut self, ctype: impl Into<String>) -> Self {
        self.ctype = Some(ctype.into());
        self
    }

    /// Sets the tablespace.
    #[must_use]
    pub fn tablespace(mut self, tablespace: impl Into<String>) -> Self {
        self.tablespace = Some(tablespace.into());
        self
    }

    /// Sets the template database.
    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Statements creating `database` with these settings.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for settings the backend has no
    /// equivalent for, and for SQLite, which has no server.
    pub fn create_database_sql(&self, dialect: &dyn Dialect, database: &str) -> Result<Vec<String>> {
        let name = dialect.quote_identifier(database);
        match dialect.kind() {
            DialectKind::Postgres => {
                let mut clauses = Vec::new();
                if let Some(owner) = &self.owner {
                    clauses.push(format!("OWNER = {}", dialect.quote_identifier(owner)));
                }
                if let Some(template) = &self.template {
                    clauses.push(format!("TEMPLATE = {}", dialect.quote_identifier(template)));
                }
                if let Some(encoding) = &self.encoding {
                    clauses.push(format!("ENCODING = {}", literal(encoding)));
                }
                if let Some(collation) = &self.collation {
                    clauses.push(format!("LC_COLLATE = {}", literal(collation)));
                }
                if let Some(ctype) = &self.ctype {
                    clauses.push(format!("LC_CTYPE = {}", literal(ctype)));
                }
                if let Some(tablespace) = &self.tablespace {
                    clauses.push(format!("TABLESPACE = {}", dialect.quote_identifier(tablespace)));
                }
                if let Some(limit) = self.connection_limit {
                    clauses.push(format!("CONNECTION LIMIT = {limit}"));
                }
                let sql = if clauses.is_empty() {
                    format!("CREATE DATABASE {name}")
                } else {
                    format!("CREATE DATABASE {name} WITH {}", clauses.join(" "))
                };
                Ok(vec![sql])
            }
            DialectKind::SqlServer => {
                let unsupported = [
                    ("encoding", self.encoding.is_some()),
                    ("ctype", self.ctype.is_some()),
                    ("tablespace", self.tablespace.is_some()),
                    ("template", self.template.is_some()),
                    ("connection limit", self.connection_limit.is_some()),
                ];
                if let Some((setting, _)) = unsupported.iter().find(|(_, set)| *set) {
                    return Err(SchemaError::unsupported(
                        format!("Database {setting}"),
                        dialect.name(),
                    ));
                }
                let mut statements = vec![match &self.collation {
                    Some(collation) => format!("CREATE DATABASE {name} COLLATE {collation}"),
                    None => format!("CREATE DATABASE {name}"),
                }];
                if let Some(owner) = &self.owner {
                    statements.push(format!(
                        "ALTER AUTHORIZATION ON DATABASE::{name} TO {}",
                        dialect.quote_identifier(owner)
                    ));
                }
                Ok(statements)
            }
            DialectKind::Sqlite => Err(SchemaError::unsupported("CREATE DATABASE", dialect.name())),
        }
    }
}

fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(60)
}

/// How a provisioning collection creates databases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningOptions {
    /// Drop an existing database before creating it.
    #[serde(default)]
    pub drop_and_recreate: bool,
    /// Longest wait for the collection lock.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout: Duration,
    /// Diagnostic application name added to connection strings.
    #[serde(default)]
    pub application_name: Option<String>,
}

impl Default for ProvisioningOptions {
    fn default() -> Self {
        Self {
            drop_and_recreate: false,
            lock_timeout: default_lock_timeout(),
            application_name: None,
        }
    }
}

impl ProvisioningOptions {
    /// Drops existing databases before creating them.
    #[must_use]
    pub fn drop_and_recreate(mut self) -> Self {
        self.drop_and_recreate = true;
        self
    }

    /// Sets the lock wait limit.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// `connection_string` tagged with the application name, if any.
    #[must_use]
    pub fn tag(&self, dialect: &dyn Dialect, connection_string: &str) -> String {
        match &self.application_name {
            Some(name) => dialect.add_application_name(connection_string, name),
            None => connection_string.to_string(),
        }
    }
}
