//! seisdb-etl - Forecast pipeline reconciliation CLI
//!
//! Reconciles dispatcher run scripts against the on-disk forecast archive
//! and records expectations, artifacts, and their status in the seisdb
//! SQLite database. Schema bootstrap, CSV seed loading, and ad-hoc SQL
//! reports ride along as subcommands.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seisdb_common::db::{self, schema, Store};
use seisdb_common::time;
use seisdb_etl::config::{EtlConfig, FileConfigReader};
use seisdb_etl::{report, walk};

/// Run configuration looked for in the working directory when no
/// `--config` is given
const DEFAULT_CONFIG_FILE: &str = "seisdb-etl.toml";

/// Command-line arguments for seisdb-etl
#[derive(Parser, Debug)]
#[command(name = "seisdb-etl")]
#[command(about = "Reconciles forecast pipeline expectations into the seisdb database")]
#[command(version)]
struct Cli {
    /// SQLite database file; overrides the run configuration
    #[arg(short, long, env = "SEISDB_DATABASE")]
    database: Option<PathBuf>,

    /// Run configuration TOML file
    #[arg(short, long, env = "SEISDB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile dispatcher scripts against the archive and record the outcome
    Run {
        /// Dispatcher run scripts; defaults to the configured list
        scripts: Vec<PathBuf>,
    },
    /// Create the database and its schema
    Init {
        /// DDL file applied instead of the built-in schema
        #[arg(long)]
        schema_file: Option<PathBuf>,
    },
    /// Seed tables from per-table CSV exports
    Load {
        /// Directory holding `<Table>.csv` files
        data_dir: PathBuf,
    },
    /// Run a file of SQL statements and print the result sets
    Report {
        /// Statements file, blank-line separated
        statements: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seisdb_etl=info,seisdb_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    info!("seisdb-etl v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let database = cli.database.unwrap_or_else(|| config.database.clone());

    match cli.command {
        Command::Run { scripts } => {
            let scripts = if scripts.is_empty() {
                config.dispatchers.clone()
            } else {
                scripts
            };
            if scripts.is_empty() {
                bail!("no dispatcher scripts on the command line or in the run configuration");
            }
            let pool = db::init_database(&database)
                .await
                .context("opening database")?;
            let store = Store::new(pool);
            let reader = FileConfigReader::new();
            walk::run_pass(
                &store,
                &reader,
                &scripts,
                time::now(),
                config.evaluation_day_offset,
            )
            .await
            .context("reconciliation pass failed")?;
        }
        Command::Init { schema_file } => match schema_file {
            Some(path) => {
                let pool = db::connect(&database).await.context("opening database")?;
                let store = Store::new(pool);
                schema::apply_schema_file(&store, &path)
                    .await
                    .with_context(|| format!("applying schema from {}", path.display()))?;
            }
            None => {
                db::init_database(&database)
                    .await
                    .context("initializing database")?;
            }
        },
        Command::Load { data_dir } => {
            let pool = db::init_database(&database)
                .await
                .context("opening database")?;
            let store = Store::new(pool);
            db::loader::load_directory(&store, &data_dir)
                .await
                .with_context(|| format!("loading CSV exports from {}", data_dir.display()))?;
        }
        Command::Report { statements } => {
            let pool = db::connect(&database).await.context("opening database")?;
            let store = Store::new(pool);
            let mut stdout = std::io::stdout().lock();
            report::run_report_file(&store, &statements, &mut stdout)
                .await
                .with_context(|| format!("running report {}", statements.display()))?;
        }
    }

    Ok(())
}

/// Load the run configuration: an explicit path must parse; the default
/// file is optional
fn load_config(path: Option<&Path>) -> Result<EtlConfig> {
    match path {
        Some(path) => EtlConfig::load(path)
            .with_context(|| format!("reading run configuration {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                EtlConfig::load(default)
                    .with_context(|| format!("reading run configuration {}", default.display()))
            } else {
                Ok(EtlConfig::default())
            }
        }
    }
}
