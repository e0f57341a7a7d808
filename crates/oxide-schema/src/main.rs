//! oxide-schema CLI
//!
//! Compares a JSON schema file with a live database and prints or applies
//! the DDL that reconciles them.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_schema::prelude::*;

/// Schema diffing and migration for Postgres, SQL Server and SQLite.
#[derive(Parser)]
#[command(name = "oxide-schema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string.
    #[arg(short, long, env = "DATABASE_URL")]
    database: String,

    /// Backend dialect (postgres, sqlserver, sqlite). Guessed from the
    /// connection string when omitted.
    #[arg(long, env = "OXIDE_SCHEMA_DIALECT")]
    dialect: Option<DialectKind>,

    /// JSON file listing the desired schema objects.
    #[arg(short, long, default_value = "schema.json")]
    schema_file: PathBuf,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Print statements without explanatory comments.
    #[arg(long)]
    concise: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DDL needed; exits with status 2 when anything differs.
    Diff,

    /// Execute the DDL needed.
    Apply {
        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the DDL undoing what `apply` would do.
    RollbackSql,
}

fn guess_dialect(connection_string: &str) -> DialectKind {
    let lower = connection_string.to_ascii_lowercase();
    if lower.starts_with("postgres") {
        DialectKind::Postgres
    } else if lower.starts_with("sqlite") || lower.ends_with(".db") || lower == ":memory:" {
        DialectKind::Sqlite
    } else {
        DialectKind::SqlServer
    }
}

async fn connect(kind: DialectKind, connection_string: &str) -> anyhow::Result<Arc<dyn SchemaConnection>> {
    let connection: Arc<dyn SchemaConnection> = match kind {
        DialectKind::Sqlite => Arc::new(SqliteConnector::default().connect(connection_string).await?),
        DialectKind::Postgres => Arc::new(PostgresConnector::default().connect(connection_string).await?),
        #[cfg(feature = "mssql")]
        DialectKind::SqlServer => Arc::new(SqlServerConnector.connect(connection_string).await?),
        #[cfg(not(feature = "mssql"))]
        DialectKind::SqlServer => anyhow::bail!("SQL Server support requires the `mssql` feature"),
    };
    Ok(connection)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let kind = cli.dialect.unwrap_or_else(|| guess_dialect(&cli.database));
    let formatting = if cli.concise {
        SqlFormatting::Concise
    } else {
        SqlFormatting::Verbose
    };
    let migrator = Migrator::for_kind(kind).with_formatting(formatting);

    let text = tokio::fs::read_to_string(&cli.schema_file)
        .await
        .with_context(|| format!("reading {}", cli.schema_file.display()))?;
    let objects: Vec<SchemaObject> = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", cli.schema_file.display()))?;
    info!(objects = objects.len(), dialect = %kind, "Loaded schema file");

    let connection = connect(kind, &cli.database).await?;
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let migration = SchemaMigration::determine(connection.as_ref(), &objects, &cancel).await?;
    for delta in migration.deltas() {
        info!(
            object = %delta.expected().identifier(),
            kind = delta.expected().kind_name(),
            difference = %delta.difference(),
            "Compared"
        );
    }

    match cli.command {
        Commands::Diff => {
            print!("{}", migrator.render(&migration.update_script(&migrator)?));
            if migration.difference() == SchemaPatchDifference::None {
                info!("Database matches the schema file.");
                return Ok(ExitCode::SUCCESS);
            }
            Ok(ExitCode::from(2))
        }

        Commands::Apply { dry_run } => {
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
                print!("{}", migrator.render(&migration.update_script(&migrator)?));
            } else {
                let executed = migration.apply(connection.as_ref(), &migrator, &cancel).await?;
                info!(statements = executed, "Schema applied successfully.");
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::RollbackSql => {
            print!("{}", migrator.render(&migration.rollback_script(&migrator)?));
            Ok(ExitCode::SUCCESS)
        }
    }
}
