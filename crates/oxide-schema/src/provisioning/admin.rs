//! Server administration statements used while provisioning.

use crate::command::{Command, CommandBuilder};
use crate::dialect::{Dialect, DialectKind};
use crate::error::{Result, SchemaError};

/// Query returning one row when `database` exists.
///
/// # Errors
///
/// Returns [`SchemaError::Unsupported`] for SQLite.
pub fn database_exists_command(dialect: &dyn Dialect, database: &str) -> Result<Command> {
    let mut builder = CommandBuilder::new(dialect);
    match dialect.kind() {
        DialectKind::Postgres => builder.append("SELECT 1 FROM pg_database WHERE datname = "),
        DialectKind::SqlServer => builder.append("SELECT 1 FROM sys.databases WHERE name = "),
        DialectKind::Sqlite => return Err(SchemaError::unsupported("Database catalogs", dialect.name())),
    }
    .append_parameter(database);
    Ok(builder.build())
}

/// Statements disconnecting other sessions and dropping `database`.
///
/// # Errors
///
/// Returns [`SchemaError::Unsupported`] for SQLite.
pub fn drop_database_sql(dialect: &dyn Dialect, database: &str) -> Result<Vec<String>> {
    let name = dialect.quote_identifier(database);
    let literal = database.replace('\'', "''");
    match dialect.kind() {
        DialectKind::Postgres => Ok(vec![
            format!(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                 WHERE datname = '{literal}' AND pid <> pg_backend_pid()"
            ),
            format!("DROP DATABASE IF EXISTS {name}"),
        ]),
        DialectKind::SqlServer => Ok(vec![
            format!("IF DB_ID(N'{literal}') IS NOT NULL ALTER DATABASE {name} SET SINGLE_USER WITH ROLLBACK IMMEDIATE"),
            format!("DROP DATABASE IF EXISTS {name}"),
        ]),
        DialectKind::Sqlite => Err(SchemaError::unsupported("DROP DATABASE", dialect.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Value;
    use crate::dialect::{PostgresDialect, SqlServerDialect, SqliteDialect};

    #[test]
    fn test_exists_is_parameterized() {
        let command = database_exists_command(&PostgresDialect, "tenant_a").unwrap();
        assert_eq!(command.sql, "SELECT 1 FROM pg_database WHERE datname = $1");
        assert_eq!(command.parameters, vec![Value::Text("tenant_a".to_string())]);

        let command = database_exists_command(&SqlServerDialect, "tenant_a").unwrap();
        assert_eq!(command.sql, "SELECT 1 FROM sys.databases WHERE name = @P1");
        assert!(database_exists_command(&SqliteDialect, "x").is_err());
    }

    #[test]
    fn test_drop_terminates_sessions_first() {
        let statements = drop_database_sql(&PostgresDialect, "tenant_a").unwrap();
        assert!(statements[0].contains("pg_terminate_backend"));
        assert_eq!(statements[1], "DROP DATABASE IF EXISTS tenant_a");

        let statements = drop_database_sql(&SqlServerDialect, "tenant_a").unwrap();
        assert!(statements[0].contains("SINGLE_USER"));
        assert_eq!(statements[1], "DROP DATABASE IF EXISTS [tenant_a]");
    }
}
