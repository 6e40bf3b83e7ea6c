//! scriptledger CLI - apply git-versioned SQL change scripts exactly once

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use scriptledger_core::adapters::duckdb::DuckDbDatabase;
use scriptledger_core::adapters::fs::FsScriptSource;
use scriptledger_core::adapters::git::GitCli;
use scriptledger_core::adapters::mysql::MysqlDatabase;
use scriptledger_core::{
    ConnectionSettings, Database, Error, ExecutionLedger, MigrationService, Reporter, RunConfig, Settings,
};

mod output;

use output::ConsoleReporter;

/// Environment variable holding the log filter
const LOG_ENV: &str = "SCRIPTLEDGER_LOG";

/// Apply SQL change scripts from a git repository exactly once, in commit order
#[derive(Parser)]
#[command(name = "scriptledger", version, about, long_about = None)]
struct Cli {
    /// Database host
    host: String,
    /// Database user
    user: String,
    /// Database password
    password: String,
    /// Database name (the database file path with --engine duckdb)
    dbname: String,
    /// Database port
    port: u16,
    /// Directory containing SQL change scripts, inside a git repository
    scripts_dir: PathBuf,
    /// File listing scripts to apply regardless of history, one per line
    missed_scripts_file: Option<PathBuf>,

    /// Database engine
    #[arg(long, value_enum, default_value_t = Engine::Mysql)]
    engine: Engine,
    /// Show the pending scripts without executing them
    #[arg(long)]
    dry_run: bool,
    /// Show the execution ledger and exit
    #[arg(long)]
    history: bool,
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Engine {
    Mysql,
    Duckdb,
}

fn main() -> ExitCode {
    init_logging();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return ExitCode::from(report_usage(&e)),
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("Migration failed: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

/// Print a clap error or help text and return the exit status for it
fn report_usage(err: &clap::Error) -> u8 {
    if let Err(print_err) = err.print() {
        warn!(error = %print_err, "failed to print usage");
    }
    // Help and version requests are not failures
    if err.use_stderr() {
        1
    } else {
        0
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let reporter = ConsoleReporter::new(cli.json);

    let run_config = RunConfig::new(&cli.scripts_dir, cli.missed_scripts_file.clone());
    run_config.validate()?;
    let settings = Settings::load(&cli.scripts_dir)
        .with_context(|| format!("failed to load settings from {}", cli.scripts_dir.display()))?;

    if !cli.json && !cli.history {
        output::header("DB Migration Started");
    }

    let mut db = open_database(&cli, &reporter)?;
    reporter.success("Database connection established");

    if cli.history {
        return show_history(&mut *db, &settings, &reporter, cli.json);
    }

    let vcs = GitCli::new(&cli.scripts_dir);
    let source = FsScriptSource::new(&cli.scripts_dir);
    let mut service = MigrationService::new(&mut *db, &vcs, &source, &reporter, run_config, &settings);

    if cli.dry_run {
        let plan = service.plan()?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else if plan.pending.is_empty() {
            reporter.success("No new scripts to execute");
        } else {
            output::header("Pending Scripts");
            println!("{}", output::plan_table(&plan));
        }
        return Ok(());
    }

    service.run()?;
    Ok(())
}

fn open_database(cli: &Cli, reporter: &ConsoleReporter) -> Result<Box<dyn Database>> {
    debug!(engine = ?cli.engine, "opening database");
    match cli.engine {
        Engine::Mysql => {
            reporter.info(&format!(
                "Connecting to database {}@{}:{}/{}...",
                cli.user, cli.host, cli.port, cli.dbname
            ));
            let settings = ConnectionSettings {
                host: cli.host.clone(),
                user: cli.user.clone(),
                password: cli.password.clone(),
                database: cli.dbname.clone(),
                port: cli.port,
            };
            let db = MysqlDatabase::connect(&settings).map_err(Error::Connectivity)?;
            Ok(Box::new(db))
        }
        Engine::Duckdb => {
            reporter.info(&format!("Opening DuckDB database {}...", cli.dbname));
            let db = DuckDbDatabase::open(Path::new(&cli.dbname)).map_err(Error::Connectivity)?;
            Ok(Box::new(db))
        }
    }
}

fn show_history(db: &mut dyn Database, settings: &Settings, reporter: &ConsoleReporter, json: bool) -> Result<()> {
    let ledger = ExecutionLedger::new(settings.ledger_table.clone(), db.dialect());
    ledger.ensure_schema(db)?;
    let records = ledger.all_records(db)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        reporter.warn(&format!("No executions recorded in {}", ledger.table()));
        return Ok(());
    }

    output::header("Execution History");
    println!("{}", output::history_table(&records));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parses_positional_arguments() {
        let cli = Cli::try_parse_from([
            "scriptledger", "localhost", "root", "secret", "app", "3306", "./db", "missed.txt",
        ])
        .unwrap();
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 3306);
        assert_eq!(cli.scripts_dir, PathBuf::from("./db"));
        assert_eq!(cli.missed_scripts_file, Some(PathBuf::from("missed.txt")));
        assert_eq!(cli.engine, Engine::Mysql);
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_engine_and_flags() {
        let cli = Cli::try_parse_from([
            "scriptledger", "-", "-", "-", "ledger.duckdb", "0", "./db", "--engine", "duckdb", "--dry-run", "--json",
        ])
        .unwrap();
        assert_eq!(cli.engine, Engine::Duckdb);
        assert!(cli.dry_run);
        assert!(cli.json);
        assert_eq!(cli.missed_scripts_file, None);
    }

    #[test]
    fn test_usage_errors() {
        let err = Cli::try_parse_from(["scriptledger", "localhost", "root"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());

        let err = Cli::try_parse_from(["scriptledger", "h", "u", "p", "d", "not-a-port", "./db"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);

        let err = Cli::try_parse_from(["scriptledger", "--help"]).err().unwrap();
        assert!(!err.use_stderr());
    }

    #[test]
    fn test_usage_exit_status() {
        let err = Cli::try_parse_from(["scriptledger", "--version"]).err().unwrap();
        assert_eq!(report_usage(&err), 0);

        let err = Cli::try_parse_from(["scriptledger", "localhost"]).err().unwrap();
        assert_eq!(report_usage(&err), 1);
    }
}
