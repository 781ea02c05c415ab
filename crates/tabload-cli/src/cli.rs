//! `tabload` - bulk import one table into MySQL
//!
//! Jobs are described by the settings file; the command line selects the
//! source table, the fields to import and a few run options.

mod config;
mod logging;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tabload_driver_mysql::MySqlDriver;
use tabload_import::statements::{add_index_statements, create_table_statement, drop_table_statement};
use tabload_import::{ConnectionRegistry, DuplicateStrategy, ImportJob, Importer};

use crate::config::CliConfig;
use crate::logging::LoggingConfig;

#[derive(Parser)]
#[command(name = "tabload", version)]
#[command(about = "Bulk import tables into MySQL through a staging file")]
struct Cli {
    /// Settings file (defaults to `<config dir>/tabload/config.toml`)
    #[arg(long, global = true, env = "TABLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Also write JSON logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Debug logging for every tabload crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one import job
    Import(JobArgs),

    /// Print the DDL of a job without connecting
    Ddl(JobArgs),
}

/// Job selection shared by every subcommand
#[derive(Args, Debug, Clone)]
struct JobArgs {
    #[arg(long)]
    source_connection: String,

    #[arg(long)]
    source_table: String,

    /// Defaults to `default_connection_target` from the settings
    #[arg(long)]
    target_connection: Option<String>,

    /// Origin field to import, repeatable; every configured field when omitted
    #[arg(long = "field", value_name = "ORIGIN")]
    fields: Vec<String>,

    /// Explicit target table name instead of the derived one
    #[arg(long)]
    table_name: Option<String>,

    #[arg(long)]
    target_schema: Option<String>,

    /// Load into the existing table instead of recreating it
    #[arg(long)]
    keep_existing: bool,

    /// Disable non-unique keys during the load
    #[arg(long)]
    disable_keys: bool,

    #[arg(long, value_enum, default_value_t = Duplicate::Fail)]
    duplicate: Duplicate,

    /// Raw SQL appended to the source SELECT, e.g. "WHERE active = 1"
    #[arg(long)]
    condition: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Duplicate {
    Fail,
    Ignore,
    Replace,
}

impl From<Duplicate> for DuplicateStrategy {
    fn from(value: Duplicate) -> Self {
        match value {
            Duplicate::Fail => DuplicateStrategy::Fail,
            Duplicate::Ignore => DuplicateStrategy::Ignore,
            Duplicate::Replace => DuplicateStrategy::Replace,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default()
    };
    if let Some(dir) = &cli.log_dir {
        logging_config = logging_config.with_log_dir(dir);
    }
    let _log_guard = logging::init(logging_config)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => CliConfig::default_path()?,
    };
    let config = CliConfig::load(&config_path)?;

    match cli.command {
        Command::Import(args) => run_import(&config, &args).await,
        Command::Ddl(args) => {
            let importer = Importer::new(config.import.clone(), ConnectionRegistry::new());
            let job = build_job(&importer, &args)?;
            for sql in render_ddl(&importer, &job)? {
                println!("{};", sql);
            }
            Ok(())
        }
    }
}

/// Build the job described by `args` from the settings of its source table
fn build_job(importer: &Importer, args: &JobArgs) -> Result<ImportJob> {
    let fields: Vec<String> = if args.fields.is_empty() {
        importer
            .settings()
            .table(&args.source_connection, &args.source_table)?
            .fields
            .keys()
            .cloned()
            .collect()
    } else {
        args.fields.clone()
    };

    let mut job = importer.create_job(
        &args.source_connection,
        &args.source_table,
        args.target_connection.as_deref(),
        &fields,
    )?;
    job.table_name = args.table_name.clone();
    job.target_schema = args.target_schema.clone();
    job.erase_existing = !args.keep_existing;
    job.disable_keys = args.disable_keys;
    job.duplicate_strategy = args.duplicate.into();
    job.sql_condition = args.condition.clone();
    Ok(job)
}

/// Drop, create and index statements of `job`
fn render_ddl(importer: &Importer, job: &ImportJob) -> Result<Vec<String>> {
    let definition = importer.prepare_table_definition(job)?;
    let mut statements = vec![
        drop_table_statement(&definition, false),
        create_table_statement(&definition)?,
    ];
    statements.extend(add_index_statements(&definition)?);
    Ok(statements)
}

async fn run_import(config: &CliConfig, args: &JobArgs) -> Result<()> {
    let importer = Importer::new(config.import.clone(), ConnectionRegistry::new());
    let job = build_job(&importer, args)?;

    for name in [job.source_connection(), job.target_connection()] {
        if importer.connections().contains(name) {
            continue;
        }
        let options = config.connection(name)?;
        let connection = MySqlDriver
            .connect(options)
            .await
            .with_context(|| format!("Failed to connect to \"{}\"", name))?;
        importer.connections().register(name, connection);
    }

    let outcome = importer.run(&job).await;
    if let Err(e) = importer.connections().close_all().await {
        tracing::warn!(error = %e, "failed to close connections");
    }
    let result = outcome.with_context(|| {
        format!(
            "Import of {}.{} failed",
            job.source_connection(),
            job.source_table()
        )
    })?;

    println!(
        "{}: {} lines staged, {} rows inserted",
        result.table.name, result.lines_staged, result.rows_inserted
    );
    Ok(())
}
