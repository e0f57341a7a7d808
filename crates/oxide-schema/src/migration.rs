//! Ordered collections of deltas.
//!
//! A [`SchemaMigration`] is what callers usually work with: hand it the
//! desired objects and a live connection, get back every delta in the order
//! given, then render or apply the update (or rollback) script.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::connection::SchemaConnection;
use crate::delta::{SchemaObjectDelta, SchemaPatchDifference};
use crate::error::{Result, SchemaError};
use crate::migrator::{Migrator, SqlScript};
use crate::schema::SchemaObject;

/// Deltas for a set of desired objects, in caller order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaMigration {
    deltas: Vec<SchemaObjectDelta>,
}

impl SchemaMigration {
    /// Introspects every object on `connection` and computes its delta.
    ///
    /// Every definition is checked before the database is touched.
    ///
    /// # Errors
    ///
    /// Returns every definition problem at once (as
    /// `SchemaError::Multiple` when there are several), then the first
    /// introspection or comparison error, or `SchemaError::Cancelled` when
    /// `cancel` fires.
    pub async fn determine(
        connection: &dyn SchemaConnection,
        objects: &[SchemaObject],
        cancel: &CancellationToken,
    ) -> Result<Self> {
        SchemaError::from_all(definition_errors(objects))?;

        let dialect = connection.dialect();
        let mut deltas = Vec::with_capacity(objects.len());
        for object in objects {
            let mut results = Vec::new();
            for command in object.introspection_commands(dialect.as_ref())? {
                results.push(connection.fetch_rows_cancellable(&command, cancel).await?);
            }
            let delta = object.create_delta(dialect.as_ref(), &results)?;
            debug!(
                object = %object.identifier(),
                kind = object.kind_name(),
                difference = %delta.difference(),
                "Computed delta"
            );
            deltas.push(delta);
        }
        Ok(Self { deltas })
    }

    /// Wraps already computed deltas.
    #[must_use]
    pub fn from_deltas(deltas: Vec<SchemaObjectDelta>) -> Self {
        Self { deltas }
    }

    /// The deltas in order.
    #[must_use]
    pub fn deltas(&self) -> &[SchemaObjectDelta] {
        &self.deltas
    }

    /// The largest difference of any delta; `None` for an empty migration.
    #[must_use]
    pub fn difference(&self) -> SchemaPatchDifference {
        self.deltas
            .iter()
            .map(SchemaObjectDelta::difference)
            .max()
            .unwrap_or(SchemaPatchDifference::None)
    }

    /// Writes schema creation for every non-default schema that a changed
    /// object lives in, then each delta's update in order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while writing a delta.
    pub fn write_all_updates(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        let dialect = migrator.dialect();
        let schemas: BTreeSet<&str> = self
            .deltas
            .iter()
            .filter(|d| d.difference() != SchemaPatchDifference::None)
            .map(|d| d.expected().identifier().schema())
            .filter(|schema| *schema != dialect.default_schema())
            .collect();
        let schema_statements: Vec<String> = schemas
            .into_iter()
            .filter_map(|schema| dialect.create_schema_sql(schema))
            .collect();
        if !schema_statements.is_empty() {
            script.comment("Ensuring schemas exist");
            for sql in schema_statements {
                script.statement(sql);
            }
            script.break_line();
        }

        for delta in self.changed() {
            delta.write_update(migrator, script)?;
            script.break_line();
        }
        Ok(())
    }

    /// Writes each delta's rollback, last delta first.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while writing a delta.
    pub fn write_all_rollbacks(&self, migrator: &Migrator, script: &mut SqlScript) -> Result<()> {
        for delta in self.changed().rev() {
            delta.write_rollback(migrator, script)?;
            script.break_line();
        }
        Ok(())
    }

    /// The full update script.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while writing a delta.
    pub fn update_script(&self, migrator: &Migrator) -> Result<SqlScript> {
        let mut script = SqlScript::new();
        self.write_all_updates(migrator, &mut script)?;
        Ok(script)
    }

    /// The full rollback script.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while writing a delta.
    pub fn rollback_script(&self, migrator: &Migrator) -> Result<SqlScript> {
        let mut script = SqlScript::new();
        self.write_all_rollbacks(migrator, &mut script)?;
        Ok(script)
    }

    /// Executes the update script statement by statement. Execution stops at
    /// the first failure; statements already run stay applied.
    ///
    /// Returns the number of statements executed.
    ///
    /// # Errors
    ///
    /// Returns the failing statement's error, or `SchemaError::Cancelled`.
    pub async fn apply(
        &self,
        connection: &dyn SchemaConnection,
        migrator: &Migrator,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let script = self.update_script(migrator)?;
        let statements = script.statements();
        info!(
            objects = self.changed().count(),
            statements = statements.len(),
            "Applying schema migration"
        );
        for sql in &statements {
            debug!(sql = %sql, "Executing SQL");
            connection.execute_cancellable(sql, cancel).await?;
        }
        Ok(statements.len())
    }

    fn changed(&self) -> impl DoubleEndedIterator<Item = &SchemaObjectDelta> + '_ {
        self.deltas
            .iter()
            .filter(|d| d.difference() != SchemaPatchDifference::None)
    }
}

/// Per-object definition problems plus names declared by more than one
/// object. Routines live in their own namespace.
fn definition_errors(objects: &[SchemaObject]) -> Vec<SchemaError> {
    let mut errors: Vec<SchemaError> = objects.iter().flat_map(SchemaObject::definition_errors).collect();
    let mut seen = BTreeSet::new();
    for object in objects {
        let is_routine = matches!(object, SchemaObject::Routine(_));
        for name in object.all_names() {
            if !seen.insert((is_routine, name.clone())) {
                errors.push(SchemaError::InvalidDefinition(format!(
                    "{name} is declared more than once"
                )));
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Dialect, PostgresDialect, SqliteDialect};
    use crate::identity::QualifiedName;
    use crate::migrator::SqlFormatting;
    use crate::schema::{Routine, RoutineKind, Table, TableColumn, View};
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
    use std::sync::Arc;

    fn concise(dialect: Arc<dyn Dialect>) -> Migrator {
        Migrator::new(dialect).with_formatting(SqlFormatting::Concise)
    }

    fn view(schema: &str, name: &str) -> SchemaObject {
        View::new(QualifiedName::new(schema, name).unwrap(), "SELECT 1").into()
    }

    #[test]
    fn test_schemas_are_created_first_and_once() {
        let dialect = PostgresDialect;
        let migration = SchemaMigration::from_deltas(vec![
            SchemaObjectDelta::compute(&dialect, view("reporting", "a"), None).unwrap(),
            SchemaObjectDelta::compute(&dialect, view("public", "b"), None).unwrap(),
            SchemaObjectDelta::compute(&dialect, view("reporting", "c"), None).unwrap(),
        ]);
        let script = migration.update_script(&concise(Arc::new(dialect))).unwrap();
        let statements = script.statements();
        assert_eq!(statements[0], "CREATE SCHEMA IF NOT EXISTS reporting");
        assert_eq!(statements.iter().filter(|s| s.contains("CREATE SCHEMA")).count(), 1);
        assert_eq!(statements.len(), 7);
        assert_eq!(migration.difference(), SchemaPatchDifference::Create);
    }

    #[test]
    fn test_rollbacks_run_in_reverse() {
        let dialect = PostgresDialect;
        let migration = SchemaMigration::from_deltas(vec![
            SchemaObjectDelta::compute(&dialect, view("public", "a"), None).unwrap(),
            SchemaObjectDelta::compute(&dialect, view("public", "b"), None).unwrap(),
        ]);
        let script = migration.rollback_script(&concise(Arc::new(dialect))).unwrap();
        assert_eq!(
            script.statements(),
            vec!["DROP VIEW IF EXISTS public.b CASCADE", "DROP VIEW IF EXISTS public.a CASCADE"]
        );
    }

    /// Renders a migration's update or rollback script in both modes.
    fn render_both(migration: &SchemaMigration, rollback: bool) -> (String, String) {
        let dialect: Arc<dyn Dialect> = Arc::new(PostgresDialect);
        let render = |formatting: SqlFormatting| {
            let migrator = Migrator::new(Arc::clone(&dialect)).with_formatting(formatting);
            let script = if rollback {
                migration.rollback_script(&migrator)
            } else {
                migration.update_script(&migrator)
            };
            script.unwrap().render(formatting)
        };
        (render(SqlFormatting::Concise), render(SqlFormatting::Verbose))
    }

    /// Verbose output is the concise output plus comment and blank lines.
    fn assert_verbose_only_decorates(concise: &str, verbose: &str, comment: &str) {
        assert!(!concise.is_empty());
        assert!(
            concise.lines().all(|line| !line.is_empty() && !line.starts_with("--")),
            "{concise}"
        );
        let statements: Vec<&str> = verbose
            .lines()
            .filter(|line| !line.is_empty() && !line.starts_with("--"))
            .collect();
        assert_eq!(statements, concise.lines().collect::<Vec<_>>());
        assert!(
            verbose.lines().any(|line| line == format!("-- {comment}")),
            "missing '{comment}' in:\n{verbose}"
        );
        assert!(verbose.ends_with(";\n\n"), "{verbose}");
    }

    struct FormattingCase {
        desired: SchemaObject,
        live: SchemaObject,
        label: &'static str,
        update_comment: &'static str,
        rollback_comment: &'static str,
    }

    fn formatting_cases() -> Vec<FormattingCase> {
        let name = |n: &str| QualifiedName::new("public", n).unwrap();
        let people = |columns: &[&str]| {
            columns.iter().fold(
                Table::new(name("people")).column(TableColumn::new("id", "integer").primary_key()),
                |table, column| table.column(TableColumn::new(*column, "text")),
            )
        };
        let function = |value: u8| {
            Routine::new(
                RoutineKind::Function,
                name("f"),
                format!("CREATE OR REPLACE FUNCTION public.f() RETURNS int AS $$ select {value} $$ LANGUAGE sql"),
            )
        };
        let procedure = |value: u8| {
            Routine::new(
                RoutineKind::Procedure,
                name("p"),
                format!("CREATE OR REPLACE PROCEDURE public.p() LANGUAGE sql AS $$ select {value} $$"),
            )
        };
        let summary = |sql: &str| View::new(name("people_summary"), sql);

        vec![
            FormattingCase {
                desired: people(&["email"]).into(),
                live: people(&[]).into(),
                label: "table public.people",
                update_comment: "Updating table public.people",
                rollback_comment: "Updating table public.people",
            },
            FormattingCase {
                desired: summary("SELECT id, email FROM people").into(),
                live: summary("SELECT id FROM people").into(),
                label: "view public.people_summary",
                update_comment: "Creating view public.people_summary",
                rollback_comment: "Creating view public.people_summary",
            },
            FormattingCase {
                desired: summary("SELECT id, email FROM people").materialized().into(),
                live: summary("SELECT id FROM people").materialized().into(),
                label: "materialized view public.people_summary",
                update_comment: "Creating materialized view public.people_summary",
                rollback_comment: "Creating materialized view public.people_summary",
            },
            FormattingCase {
                desired: function(2).into(),
                live: function(1).into(),
                label: "function public.f",
                update_comment: "Dropping function public.f",
                rollback_comment: "Creating function public.f",
            },
            FormattingCase {
                desired: procedure(2).into(),
                live: procedure(1).into(),
                label: "procedure public.p",
                update_comment: "Creating procedure public.p",
                rollback_comment: "Dropping procedure public.p",
            },
        ]
    }

    #[test]
    fn test_formatting_of_created_objects() {
        for case in formatting_cases() {
            let migration = SchemaMigration::from_deltas(vec![
                SchemaObjectDelta::compute(&PostgresDialect, case.desired, None).unwrap(),
            ]);

            let (concise, verbose) = render_both(&migration, false);
            assert_verbose_only_decorates(&concise, &verbose, &format!("Creating {}", case.label));
            let (concise, verbose) = render_both(&migration, true);
            assert_verbose_only_decorates(&concise, &verbose, &format!("Dropping {}", case.label));
        }
    }

    #[test]
    fn test_formatting_of_updated_objects() {
        for case in formatting_cases() {
            let delta = SchemaObjectDelta::compute(&PostgresDialect, case.desired, Some(case.live)).unwrap();
            assert_eq!(delta.difference(), SchemaPatchDifference::Update, "{}", case.label);
            let migration = SchemaMigration::from_deltas(vec![delta]);

            let (concise, verbose) = render_both(&migration, false);
            assert_verbose_only_decorates(&concise, &verbose, case.update_comment);
            let (concise, verbose) = render_both(&migration, true);
            assert_verbose_only_decorates(&concise, &verbose, case.rollback_comment);
        }
    }

    #[test]
    fn test_view_creation_text_in_both_modes() {
        let migration = SchemaMigration::from_deltas(vec![SchemaObjectDelta::compute(
            &PostgresDialect,
            View::new(QualifiedName::new("public", "people_summary").unwrap(), "SELECT id FROM people;").into(),
            None,
        )
        .unwrap()]);

        let (concise, verbose) = render_both(&migration, false);
        assert_eq!(
            concise,
            "DROP VIEW IF EXISTS public.people_summary CASCADE;\nCREATE VIEW public.people_summary AS\nSELECT id FROM people;\n"
        );
        assert_eq!(
            verbose,
            "-- Creating view public.people_summary\nDROP VIEW IF EXISTS public.people_summary CASCADE;\nCREATE VIEW public.people_summary AS\nSELECT id FROM people;\n\n"
        );

        let (concise, verbose) = render_both(&migration, true);
        assert_eq!(concise, "DROP VIEW IF EXISTS public.people_summary CASCADE;\n");
        assert_eq!(
            verbose,
            "-- Dropping view public.people_summary\nDROP VIEW IF EXISTS public.people_summary CASCADE;\n\n"
        );
    }

    #[test]
    fn test_empty_migration_has_no_difference() {
        let migration = SchemaMigration::default();
        assert_eq!(migration.difference(), SchemaPatchDifference::None);
        assert!(migration
            .update_script(&concise(Arc::new(SqliteDialect)))
            .unwrap()
            .is_empty());
    }

    async fn pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap()
    }

    fn people() -> SchemaObject {
        Table::new(QualifiedName::new("main", "people").unwrap())
            .column(TableColumn::new("id", "INTEGER").primary_key())
            .column(TableColumn::new("name", "TEXT").not_null())
            .into()
    }

    #[tokio::test]
    async fn test_apply_then_nothing_left() {
        let pool = pool().await;
        let cancel = CancellationToken::new();
        let migrator = concise(Arc::new(SqliteDialect));
        let objects = vec![people()];

        let migration = SchemaMigration::determine(&pool, &objects, &cancel).await.unwrap();
        assert_eq!(migration.difference(), SchemaPatchDifference::Create);
        assert!(migration.apply(&pool, &migrator, &cancel).await.unwrap() > 0);

        let again = SchemaMigration::determine(&pool, &objects, &cancel).await.unwrap();
        assert_eq!(again.difference(), SchemaPatchDifference::None);
        assert_eq!(again.apply(&pool, &migrator, &cancel).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_every_definition_problem_is_reported_before_introspection() {
        let pool = pool().await;
        pool.close().await;
        let objects = vec![
            people(),
            Table::new(QualifiedName::new("main", "empty").unwrap()).into(),
            View::new(QualifiedName::new("main", "people").unwrap(), "SELECT 1").into(),
        ];

        match SchemaMigration::determine(&pool, &objects, &CancellationToken::new()).await {
            Err(SchemaError::Multiple(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].to_string().contains("main.empty: has no columns"));
                assert!(errors[1].to_string().contains("main.people is declared more than once"));
            }
            other => panic!("expected every definition problem, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_apply_stops_at_first_failure() {
        let pool = pool().await;
        let cancel = CancellationToken::new();
        let migrator = concise(Arc::new(SqliteDialect));
        let objects = vec![
            people(),
            View::new(QualifiedName::new("main", "broken").unwrap(), "SELECT FROM WHERE").into(),
            view("main", "never_created"),
        ];

        let migration = SchemaMigration::determine(&pool, &objects, &cancel).await.unwrap();
        assert!(migration.apply(&pool, &migrator, &cancel).await.is_err());

        let after = SchemaMigration::determine(&pool, &objects, &cancel).await.unwrap();
        let differences: Vec<_> = after.deltas().iter().map(SchemaObjectDelta::difference).collect();
        assert_eq!(
            differences,
            vec![
                SchemaPatchDifference::None,
                SchemaPatchDifference::Create,
                SchemaPatchDifference::Create
            ]
        );
    }
}
