//! Expected versus actual comparison.
//!
//! A [`SchemaObjectDelta`] pairs one desired object with its live
//! counterpart (or its absence) and decides, once, whether the database
//! needs nothing, an update or a create:
//!
//! | live object | desired object       | result   |
//! |-------------|----------------------|----------|
//! | absent      | marked removed       | `None`   |
//! | present     | marked removed       | `Update` |
//! | absent      | anything else        | `Create` |
//! | equivalent  |                      | `None`   |
//! | different   |                      | `Update` |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{Result, SchemaError};
use crate::migrator::{Migrator, SqlScript};
use crate::schema::{SchemaObject, TableDelta};

/// Outcome of comparing a desired object with the live database.
///
/// Ordered by severity so a migration's overall difference is the maximum
/// of its deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPatchDifference {
    /// Nothing to do.
    None,
    /// The object exists but differs.
    Update,
    /// The object does not exist.
    Create,
}

impl fmt::Display for SchemaPatchDifference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Update => write!(f, "update"),
            Self::Create => write!(f, "create"),
        }
    }
}

/// The comparison of one desired object with its live counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObjectDelta {
    expected: SchemaObject,
    actual: Option<SchemaObject>,
    difference: SchemaPatchDifference,
    table_delta: Option<TableDelta>,
}

impl SchemaObjectDelta {
    /// Compares `expected` with the live `actual` object.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidDefinition`] when the two objects are of
    /// different kinds.
    pub fn compute(dialect: &dyn Dialect, expected: SchemaObject, actual: Option<SchemaObject>) -> Result<Self> {
        let mut table_delta = None;
        let difference = match (&expected, &actual) {
            (SchemaObject::Routine(routine), live) if routine.is_removed => match live {
                Some(SchemaObject::Routine(_)) => SchemaPatchDifference::Update,
                None => SchemaPatchDifference::None,
                Some(other) => return Err(kind_mismatch(&expected, other)),
            },
            (_, None) => SchemaPatchDifference::Create,
            (SchemaObject::Table(e), Some(SchemaObject::Table(a))) => {
                let delta = TableDelta::compute(dialect, e, a);
                let difference = if delta.has_changes() {
                    SchemaPatchDifference::Update
                } else {
                    SchemaPatchDifference::None
                };
                table_delta = Some(delta);
                difference
            }
            (SchemaObject::View(e), Some(SchemaObject::View(a))) => equivalence(e.is_equivalent(a)),
            (SchemaObject::Routine(e), Some(SchemaObject::Routine(a))) => equivalence(e.is_equivalent(a)),
            (_, Some(other)) => return Err(kind_mismatch(&expected, other)),
        };

        Ok(Self {
            expected,
            actual,
            difference,
            table_delta,
        })
    }

    /// The desired object.
    #[must_use]
    pub fn expected(&self) -> &SchemaObject {
        &self.expected
    }

    /// The live object, if it exists.
    #[must_use]
    pub fn actual(&self) -> Option<&SchemaObject> {
        self.actual.as_ref()
    }

    /// The comparison outcome.
    #[must_use]
    pub fn difference(&self) -> SchemaPatchDifference {
        self.difference
    }

    /// Column and index differences, for tables that exist.
    #[must_use]
    pub fn table_delta(&self) -> Option<&TableDelta> {
        self.table_delta.as_ref()
    }

    /// Writes the statements moving the database to the desired state.
    ///
    /// # Errors
    ///
    /// Returns an error when a statement cannot be written for the dialect.
    pub fn write_update(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        match self.difference {
            SchemaPatchDifference::None => Ok(()),
            SchemaPatchDifference::Create => self.expected.write_create_statement(migrator, script),
            SchemaPatchDifference::Update => match (&self.expected, &self.actual) {
                (SchemaObject::Routine(routine), Some(actual)) if routine.is_removed => {
                    actual.write_drop_statement(migrator, script)
                }
                (SchemaObject::Table(expected), _) => match &self.table_delta {
                    Some(delta) => delta.write_update(migrator, expected, script),
                    None => self.expected.write_create_statement(migrator, script),
                },
                (SchemaObject::Routine(_), Some(actual)) => {
                    actual.write_drop_statement(migrator, script)?;
                    self.expected.write_create_statement(migrator, script)
                }
                _ => self.expected.write_create_statement(migrator, script),
            },
        }
    }

    /// Writes the statements restoring the live state captured by this
    /// delta: the live object is recreated when it existed, otherwise the
    /// desired object is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error when a statement cannot be written for the dialect.
    pub fn write_rollback(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        match (self.difference, &self.actual) {
            (SchemaPatchDifference::None, _) => Ok(()),
            (_, None) => self.expected.write_drop_statement(migrator, script),
            (_, Some(actual)) => match (&self.expected, actual) {
                (SchemaObject::Routine(routine), _) if routine.is_removed => {
                    actual.write_create_statement(migrator, script)
                }
                (SchemaObject::Table(expected), SchemaObject::Table(live)) => {
                    TableDelta::compute(migrator.dialect(), live, expected).write_update(migrator, live, script)
                }
                (SchemaObject::Routine(_), _) => {
                    self.expected.write_drop_statement(migrator, script)?;
                    actual.write_create_statement(migrator, script)
                }
                _ => actual.write_create_statement(migrator, script),
            },
        }
    }
}

fn equivalence(equivalent: bool) -> SchemaPatchDifference {
    if equivalent {
        SchemaPatchDifference::None
    } else {
        SchemaPatchDifference::Update
    }
}

fn kind_mismatch(expected: &SchemaObject, actual: &SchemaObject) -> SchemaError {
    SchemaError::InvalidDefinition(format!(
        "{} {} can not be compared with {} {}",
        expected.kind_name(),
        expected.identifier(),
        actual.kind_name(),
        actual.identifier()
    ))
}
