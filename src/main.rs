use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ticket_migrate::{
    CounterLookup, CsvTableReader, MigrationConfig, Migrator, SqlFileWriter,
    SqliteCounterLookup, SqliteLoader, StaticCounterLookup, SystemClock,
};

/// Convert a spreadsheet of ticket-counter sales into INSERT statements
#[derive(Debug, Parser)]
#[command(name = "ticket-migrate", version)]
struct Cli {
    /// Sales sheet exported as CSV
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for tickets_insert.sql, counters_insert.sql, transactions_insert.sql
    #[arg(short, long, default_value = "sql_output")]
    output_dir: PathBuf,

    /// SQLite database holding the existing `counters` table
    #[arg(long)]
    counters_db: Option<PathBuf>,

    /// Execute the statements against this SQLite database instead of writing files
    #[arg(long)]
    load_into: Option<PathBuf>,

    /// JSON file overriding migration constants
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => MigrationConfig::from_json_file(path)?,
        None => MigrationConfig::default(),
    };

    let lookup: Box<dyn CounterLookup> = match &cli.counters_db {
        Some(path) => Box::new(SqliteCounterLookup::new(path)),
        None => Box::new(StaticCounterLookup::default()),
    };

    let clock = SystemClock;
    let migrator = Migrator::new(&config, &clock);
    let reader = CsvTableReader::new();

    let summary = match &cli.load_into {
        Some(db_path) => {
            let conn = Connection::open(db_path)
                .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
            let mut loader = SqliteLoader::new(&conn);
            migrator.run(&reader, &cli.input, lookup.as_ref(), &mut loader)?
        }
        None => {
            let mut writer = SqlFileWriter::new(&cli.output_dir)?;
            let summary = migrator.run(&reader, &cli.input, lookup.as_ref(), &mut writer)?;
            print_files(&writer);
            summary
        }
    };

    println!("\n✅ {}", summary.summary());
    for skipped in &summary.skipped {
        println!(
            "   ⚠️  row {} (s.no {}): {}",
            skipped.position, skipped.serial, skipped.error
        );
    }
    if summary.defaulted_dates > 0 || summary.defaulted_amounts > 0 {
        println!(
            "   ℹ️  {} dates defaulted to processing time, {} totals defaulted to 0.00",
            summary.defaulted_dates, summary.defaulted_amounts
        );
    }

    Ok(())
}

fn print_files(writer: &SqlFileWriter) {
    println!("\n🚀 Execution order:");
    for (step, path) in writer.written().iter().enumerate() {
        println!("   {}. {}", step + 1, path.display());
    }
}
