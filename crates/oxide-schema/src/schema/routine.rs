//! Functions and stored procedures.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::canonical;
use crate::command::{Command, CommandBuilder, Row};
use crate::dialect::{Dialect, DialectKind};
use crate::error::{Result, SchemaError};
use crate::identity::QualifiedName;
use crate::migrator::{Migrator, SqlScript};

static ROUTINE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(function|procedure|proc)\b").expect("valid routine keyword regex")
});

/// Function or stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineKind {
    /// `FUNCTION`.
    Function,
    /// `PROCEDURE`.
    Procedure,
}

impl RoutineKind {
    /// SQL keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Function => "FUNCTION",
            Self::Procedure => "PROCEDURE",
        }
    }

    /// Human readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Procedure => "procedure",
        }
    }
}

/// Extracts the routine kind and name from a `CREATE FUNCTION` or
/// `CREATE PROCEDURE` body.
///
/// The name is the text between the keyword and the next `(`.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] when the keyword or the parenthesis is
/// missing, or the name is empty or contains unquoted whitespace.
pub fn parse_routine_identifier(dialect: &dyn Dialect, body: &str) -> Result<(RoutineKind, QualifiedName)> {
    let keyword = ROUTINE_KEYWORD
        .find(body)
        .ok_or_else(|| SchemaError::parse(body, "no FUNCTION or PROCEDURE keyword"))?;
    let kind = if keyword.as_str().eq_ignore_ascii_case("function") {
        RoutineKind::Function
    } else {
        RoutineKind::Procedure
    };

    let rest = &body[keyword.end()..];
    let paren = rest
        .find('(')
        .ok_or_else(|| SchemaError::parse(body, "no '(' after the routine name"))?;
    let name = rest[..paren].trim();
    if name.is_empty() {
        return Err(SchemaError::parse(body, "routine name is empty"));
    }
    if has_unquoted_whitespace(name) {
        return Err(SchemaError::parse(
            body,
            format!("routine name '{name}' contains whitespace"),
        ));
    }

    Ok((kind, QualifiedName::parse(dialect, name)?))
}

fn has_unquoted_whitespace(name: &str) -> bool {
    let mut closing: Option<char> = None;
    for c in name.chars() {
        match closing {
            Some(close) if c == close => closing = None,
            Some(_) => {}
            None => match c {
                '"' => closing = Some('"'),
                '`' => closing = Some('`'),
                '[' => closing = Some(']'),
                c if c.is_whitespace() => return true,
                _ => {}
            },
        }
    }
    false
}

/// A function or stored procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routine {
    /// Function or procedure.
    pub kind: RoutineKind,
    /// Routine name.
    pub identifier: QualifiedName,
    /// Full `CREATE` text.
    #[serde(default)]
    pub body: Option<String>,
    /// Explicit drop statements, used instead of the generated one.
    #[serde(default)]
    pub drop_statements: Option<Vec<String>>,
    /// Marks the routine for removal.
    #[serde(default)]
    pub is_removed: bool,
    /// Bodies of further overloads sharing the name, as read from the
    /// catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overloads: Vec<String>,
}

impl Routine {
    /// Creates a routine from its parts.
    #[must_use]
    pub fn new(kind: RoutineKind, identifier: QualifiedName, body: impl Into<String>) -> Self {
        Self {
            kind,
            identifier,
            body: Some(body.into()),
            drop_statements: None,
            is_removed: false,
            overloads: Vec::new(),
        }
    }

    /// Creates a routine, reading its kind and name from `body`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] when no identifier can be found.
    pub fn for_sql(dialect: &dyn Dialect, body: impl Into<String>) -> Result<Self> {
        let body = body.into();
        let (kind, identifier) = parse_routine_identifier(dialect, &body)?;
        Ok(Self::new(kind, identifier, body))
    }

    /// Creates a function from its `CREATE FUNCTION` text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] when `body` does not declare a function.
    pub fn function_for_sql(dialect: &dyn Dialect, body: impl Into<String>) -> Result<Self> {
        Self::expect_kind(Self::for_sql(dialect, body)?, RoutineKind::Function)
    }

    /// Creates a procedure from its `CREATE PROCEDURE` text.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Parse`] when `body` does not declare a procedure.
    pub fn procedure_for_sql(dialect: &dyn Dialect, body: impl Into<String>) -> Result<Self> {
        Self::expect_kind(Self::for_sql(dialect, body)?, RoutineKind::Procedure)
    }

    fn expect_kind(routine: Self, kind: RoutineKind) -> Result<Self> {
        if routine.kind == kind {
            Ok(routine)
        } else {
            Err(SchemaError::parse(
                routine.body.unwrap_or_default(),
                format!("expected a {}", kind.display_name()),
            ))
        }
    }

    /// A routine that should no longer exist.
    #[must_use]
    pub fn for_removal(kind: RoutineKind, identifier: QualifiedName) -> Self {
        Self {
            kind,
            identifier,
            body: None,
            drop_statements: None,
            is_removed: true,
            overloads: Vec::new(),
        }
    }

    /// Uses `statements` instead of the generated drop.
    #[must_use]
    pub fn with_drop_statements(mut self, statements: Vec<String>) -> Self {
        self.drop_statements = Some(statements);
        self
    }

    /// Statements dropping this routine: the explicit list when given, else
    /// one generated `DROP ... IF EXISTS`, or nothing for a removed routine.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for backends without routines.
    pub fn drop_statements(&self, dialect: &dyn Dialect) -> Result<Vec<String>> {
        match &self.drop_statements {
            Some(statements) => Ok(statements.clone()),
            None if self.is_removed => Ok(Vec::new()),
            None => Ok(vec![dialect.drop_routine_sql(self.kind, &self.identifier)?]),
        }
    }

    /// Writes the drops then runs the body, and each overload body, through
    /// the dialect's dynamic SQL mechanism. A removed routine writes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDefinition`] when there is no body and
    /// [`SchemaError::Unsupported`] for backends without routines.
    pub fn write_create_statement(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        if self.is_removed {
            return Ok(());
        }
        let dialect = migrator.dialect();
        let body = self.body.as_deref().ok_or_else(|| {
            SchemaError::InvalidDefinition(format!(
                "{} {} has no body",
                self.kind.display_name(),
                self.identifier
            ))
        })?;

        script.comment(format!("Creating {} {}", self.kind.display_name(), self.identifier));
        for sql in self.drop_statements(dialect)? {
            script.statement(sql);
        }
        script.statement(dialect.execute_dynamic_sql(body)?);
        for overload in &self.overloads {
            script.statement(dialect.execute_dynamic_sql(overload)?);
        }
        Ok(())
    }

    /// Writes the drop statements.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for backends without routines.
    pub fn write_drop_statement(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        script.comment(format!("Dropping {} {}", self.kind.display_name(), self.identifier));
        for sql in self.drop_statements(migrator.dialect())? {
            script.statement(sql);
        }
        Ok(())
    }

    /// Catalog query returning `(definition, drop_statement)` rows, one per
    /// overload.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Unsupported`] for backends without routines.
    pub fn introspection_command(&self, dialect: &dyn Dialect) -> Result<Command> {
        let mut builder = CommandBuilder::new(dialect);
        match dialect.kind() {
            DialectKind::Postgres => {
                builder
                    .append(
                        "SELECT pg_get_functiondef(p.oid), \
                         format('DROP %s IF EXISTS %I.%I(%s)', \
                           CASE WHEN p.prokind = 'p' THEN 'PROCEDURE' ELSE 'FUNCTION' END, \
                           n.nspname, p.proname, pg_get_function_identity_arguments(p.oid)) \
                         FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace \
                         WHERE n.nspname = ",
                    )
                    .append_parameter(self.identifier.schema())
                    .append(" AND p.proname = ")
                    .append_parameter(self.identifier.name())
                    .append(" AND p.prokind::text = ")
                    .append_parameter(match self.kind {
                        RoutineKind::Function => "f",
                        RoutineKind::Procedure => "p",
                    })
                    .append(" ORDER BY p.oid");
            }
            DialectKind::SqlServer => {
                let types = match self.kind {
                    RoutineKind::Function => "('FN', 'IF', 'TF', 'FS', 'FT')",
                    RoutineKind::Procedure => "('P', 'PC')",
                };
                builder
                    .append(
                        "SELECT m.definition, CAST(NULL AS nvarchar(max)) FROM sys.sql_modules m \
                         JOIN sys.objects o ON o.object_id = m.object_id \
                         WHERE m.object_id = OBJECT_ID(",
                    )
                    .append_parameter(dialect.qualify(&self.identifier))
                    .append(&format!(") AND o.type IN {types}"));
            }
            DialectKind::Sqlite => {
                return Err(SchemaError::unsupported(
                    format!("{}s", self.kind.display_name()),
                    dialect.name(),
                ))
            }
        }
        Ok(builder.build())
    }

    /// Reads the live routine; no rows means it does not exist. Several
    /// overloads are read as one routine that keeps every body and whose
    /// drops cover all of them.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnexpectedRow`] for rows of the wrong shape.
    pub fn read_actual(&self, rows: &[Row]) -> Result<Option<Self>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let mut bodies = Vec::with_capacity(rows.len());
        let mut drops = Vec::new();
        for row in rows {
            bodies.push(row.required_text(0)?);
            if let Some(drop) = row.text(1)? {
                drops.push(drop);
            }
        }
        let overloads = bodies.split_off(1);
        Ok(Some(Self {
            kind: self.kind,
            identifier: self.identifier.clone(),
            body: bodies.pop(),
            drop_statements: if drops.is_empty() { None } else { Some(drops) },
            is_removed: false,
            overloads,
        }))
    }

    /// Compares bodies ignoring case, whitespace and `OR ALTER` /
    /// `OR REPLACE` modifiers.
    #[must_use]
    pub fn is_equivalent(&self, actual: &Self) -> bool {
        match (&self.body, &actual.body) {
            (Some(expected), Some(live)) => {
                canonical::routine(expected) == canonical::routine(live)
                    && self.overloads.len() == actual.overloads.len()
                    && self
                        .overloads
                        .iter()
                        .zip(&actual.overloads)
                        .all(|(e, a)| canonical::routine(e) == canonical::routine(a))
            }
            _ => false,
        }
    }
}
