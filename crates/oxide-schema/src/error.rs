//! Error types for schema comparison and provisioning.

use std::time::Duration;

/// Errors that can occur while comparing, migrating or provisioning schemas.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Text could not be parsed (qualified name, routine signature, ...).
    #[error("Failed to parse '{input}': {message}")]
    Parse {
        /// The offending input.
        input: String,
        /// What was wrong with it.
        message: String,
    },

    /// No parameter type mapping exists for a native value type.
    #[error("No database parameter type mapping for native type '{0}'")]
    NoTypeMapping(String),

    /// The provisioning lock could not be acquired in time.
    #[error("Timed out after {waited:?} waiting to provision database '{database}'")]
    ProvisioningTimeout {
        /// Database being provisioned.
        database: String,
        /// How long the caller waited for the lock.
        waited: Duration,
    },

    /// The dialect has no support for the requested schema feature.
    #[error("{feature} is not supported by the {dialect} dialect")]
    Unsupported {
        /// Feature that was requested.
        feature: String,
        /// Dialect name.
        dialect: &'static str,
    },

    /// A schema object definition is invalid.
    #[error("Invalid schema definition: {0}")]
    InvalidDefinition(String),

    /// An introspection query returned a row of unexpected shape.
    #[error("Unexpected introspection row: {0}")]
    UnexpectedRow(String),

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// Database error from a sqlx-backed connection.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database error from the SQL Server connection.
    #[cfg(feature = "mssql")]
    #[error("SQL Server error: {0}")]
    SqlServer(#[from] tiberius::error::Error),

    /// IO error (schema files, SQLite database files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<SchemaError>),
}

impl SchemaError {
    /// Creates a parse error for `input`.
    #[must_use]
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported-feature error.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>, dialect: &'static str) -> Self {
        Self::Unsupported {
            feature: feature.into(),
            dialect,
        }
    }

    /// `Ok` for no errors, the error itself for one, [`SchemaError::Multiple`]
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error whenever `errors` is not empty.
    pub fn from_all(mut errors: Vec<Self>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_names_input() {
        let err = SchemaError::parse("a.b.c", "too many segments");
        assert_eq!(err.to_string(), "Failed to parse 'a.b.c': too many segments");
    }

    #[test]
    fn test_multiple_errors_listed() {
        let err = SchemaError::Multiple(vec![
            SchemaError::Cancelled,
            SchemaError::NoTypeMapping("u128".to_string()),
        ]);
        let text = err.to_string();
        assert!(text.contains("  - Operation cancelled"));
        assert!(text.contains("  - No database parameter type mapping for native type 'u128'"));
    }

    #[test]
    fn test_from_all() {
        assert!(SchemaError::from_all(Vec::new()).is_ok());
        assert!(matches!(
            SchemaError::from_all(vec![SchemaError::Cancelled]),
            Err(SchemaError::Cancelled)
        ));
        assert!(matches!(
            SchemaError::from_all(vec![SchemaError::Cancelled, SchemaError::Cancelled]),
            Err(SchemaError::Multiple(errors)) if errors.len() == 2
        ));
    }
}
