//! Schema diffing and DDL generation for Postgres, SQL Server and SQLite.
//!
//! `oxide-schema` compares the schema an application expects (tables with
//! their columns and indexes, views, materialized views, functions and
//! stored procedures) with what a live database actually has, and writes the
//! DDL that reconciles the two:
//!
//! - Every object can write its own create and drop statements
//! - Every object builds catalog queries for its live counterpart and reads
//!   the rows back into a value of the same kind
//! - A delta classifies each object as `None`, `Update` or `Create` and can
//!   write both the forward and the rollback DDL
//! - Provisioning collections create per-name databases on first use without
//!   racing each other
//!
//! # Architecture
//!
//! - **Identity** - `schema.name` pairs parsed per dialect
//! - **Dialect** - per-backend naming, quoting, typing and DDL spelling
//! - **Migrator** - a dialect plus a formatting mode, passed to every writer
//! - **Schema** - the object kinds: tables, views, routines
//! - **Delta / Migration** - expected versus actual comparison, in order
//! - **Connection** - the async driver boundary (sqlx, tiberius)
//! - **Provisioning** - lazily created, cached databases
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_schema::prelude::*;
//!
//! let dialect = DialectKind::Sqlite.provider();
//! let table = Table::new(QualifiedName::parse(dialect.as_ref(), "people")?)
//!     .column(TableColumn::new("id", "INTEGER").primary_key())
//!     .column(TableColumn::new("name", "TEXT").not_null());
//!
//! let cancel = CancellationToken::new();
//! let migration = SchemaMigration::determine(&pool, &[table.into()], &cancel).await?;
//! let migrator = Migrator::new(dialect);
//! println!("{}", migrator.render(&migration.update_script(&migrator)?));
//! migration.apply(&pool, &migrator, &cancel).await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show the DDL needed to reach schema.json
//! oxide-schema --database sqlite:app.db --dialect sqlite --schema-file schema.json diff
//!
//! # Apply it
//! oxide-schema --database sqlite:app.db --dialect sqlite --schema-file schema.json apply
//!
//! # Show how to undo it
//! oxide-schema --database sqlite:app.db --dialect sqlite --schema-file schema.json rollback-sql
//! ```

pub mod canonical;
pub mod command;
pub mod connection;
pub mod connection_string;
pub mod delta;
pub mod dialect;
pub mod error;
pub mod identity;
pub mod migration;
pub mod migrator;
pub mod provisioning;
pub mod schema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::command::{Command, CommandBuilder, PlaceholderStyle, Row, Value};
    pub use crate::connection::{Connector, PostgresConnector, SchemaConnection, SqliteConnector};
    #[cfg(feature = "mssql")]
    pub use crate::connection::{SqlServerConnection, SqlServerConnector};
    pub use crate::delta::{SchemaObjectDelta, SchemaPatchDifference};
    pub use crate::dialect::{
        Dialect, DialectKind, ParameterType, PostgresDialect, SqlServerDialect, SqliteDialect,
    };
    pub use crate::error::{Result, SchemaError};
    pub use crate::identity::QualifiedName;
    pub use crate::migration::SchemaMigration;
    pub use crate::migrator::{Migrator, SqlFormatting, SqlScript};
    pub use crate::provisioning::{
        DatabaseHandle, DatabaseInstanceFactory, DatabaseSpecification, ProvisioningOptions,
        SingleInstanceDatabaseCollection, SingleServerDatabaseCollection, SqliteFileFactory,
    };
    pub use crate::schema::{
        IndexDefinition, Routine, RoutineKind, SchemaObject, Table, TableColumn, View, ViewKind,
    };
    pub use tokio_util::sync::CancellationToken;
}
