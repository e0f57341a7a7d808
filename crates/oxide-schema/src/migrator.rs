//! DDL writer configuration and script accumulation.
//!
//! A [`Migrator`] pairs a dialect with a formatting mode and is passed
//! explicitly to every DDL-writing call. Statements are collected into a
//! [`SqlScript`]; formatting only affects how the script is rendered, never
//! which statements it contains.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, DialectKind};

/// How generated DDL is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlFormatting {
    /// Statements only.
    Concise,
    /// Statements with explanatory comments and blank lines.
    #[default]
    Verbose,
}

/// Per-dialect DDL writer configuration.
#[derive(Clone)]
pub struct Migrator {
    dialect: Arc<dyn Dialect>,
    formatting: SqlFormatting,
}

impl Migrator {
    /// Creates a migrator for `dialect` with verbose formatting.
    #[must_use]
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            formatting: SqlFormatting::default(),
        }
    }

    /// Creates a migrator for a backend kind.
    #[must_use]
    pub fn for_kind(kind: DialectKind) -> Self {
        Self::new(kind.provider())
    }

    /// Sets the formatting mode.
    #[must_use]
    pub fn with_formatting(mut self, formatting: SqlFormatting) -> Self {
        self.formatting = formatting;
        self
    }

    /// Returns the dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Returns the formatting mode.
    #[must_use]
    pub const fn formatting(&self) -> SqlFormatting {
        self.formatting
    }

    /// Renders `script` with this migrator's formatting.
    #[must_use]
    pub fn render(&self, script: &SqlScript) -> String {
        script.render(self.formatting)
    }
}

impl fmt::Debug for Migrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrator")
            .field("dialect", &self.dialect.name())
            .field("formatting", &self.formatting)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptEntry {
    Comment(String),
    Statement(String),
    Break,
}

/// An ordered DDL script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlScript {
    entries: Vec<ScriptEntry>,
}

impl SqlScript {
    /// Creates an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an explanatory comment (rendered only in verbose mode).
    pub fn comment(&mut self, text: impl Into<String>) {
        self.entries.push(ScriptEntry::Comment(text.into()));
    }

    /// Adds a statement. Trailing semicolons are removed.
    pub fn statement(&mut self, sql: impl Into<String>) {
        let sql = sql.into();
        let trimmed = sql.trim().trim_end_matches(';').trim_end();
        if !trimmed.is_empty() {
            self.entries.push(ScriptEntry::Statement(trimmed.to_string()));
        }
    }

    /// Adds a blank line between objects (rendered only in verbose mode).
    pub fn break_line(&mut self) {
        self.entries.push(ScriptEntry::Break);
    }

    /// The statements in order, without comments.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                ScriptEntry::Statement(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns true when the script has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self
            .entries
            .iter()
            .any(|e| matches!(e, ScriptEntry::Statement(_)))
    }

    /// Renders the script as SQL text.
    #[must_use]
    pub fn render(&self, formatting: SqlFormatting) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match (entry, formatting) {
                (ScriptEntry::Statement(sql), _) => {
                    out.push_str(sql);
                    out.push_str(";\n");
                }
                (ScriptEntry::Comment(text), SqlFormatting::Verbose) => {
                    for line in text.lines() {
                        out.push_str("-- ");
                        out.push_str(line);
                        out.push('\n');
                    }
                }
                (ScriptEntry::Break, SqlFormatting::Verbose) => out.push('\n'),
                _ => {}
            }
        }
        out
    }
}
