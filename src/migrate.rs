// 🚚 Migrator - Spreadsheet → tickets / counters / transactions payloads
//
// Flow:
//   1. Seed the registry from the target store (failure = empty seed, logged)
//   2. Read the whole input table (failure = abort, nothing written)
//   3. Build canonical transactions row by row, discovering ids on the way
//   4. Render the three payloads and hand them to the writer in execution order

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::builder::{BuildReport, RecordBuilder, SkippedRow};
use crate::config::MigrationConfig;
use crate::emitter::{ArtifactKind, StatementEmitter};
use crate::lookup::CounterLookup;
use crate::normalize::Clock;
use crate::registry::IdentityRegistry;
use crate::source::{Table, TabularReader};
use crate::writer::BulkWriter;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("nothing to migrate: {rows} rows read, {skipped} skipped, no transactions produced")]
    NothingToMigrate { rows: usize, skipped: usize },
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub kind: ArtifactKind,
    pub row_count: usize,
    /// Content hash without the generation timestamp
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct MigrationSummary {
    pub run_id: Uuid,
    pub source_rows: usize,
    pub seeded_counters: usize,
    pub tickets: usize,
    pub new_counters: usize,
    pub transactions: usize,
    pub skipped: Vec<SkippedRow>,
    pub defaulted_dates: usize,
    pub defaulted_amounts: usize,
    /// In the order they must be executed against the target store
    pub artifacts: Vec<ArtifactSummary>,
}

impl MigrationSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} tickets, {} new counters, {} transactions ({} of {} rows skipped)",
            self.tickets,
            self.new_counters,
            self.transactions,
            self.skipped.len(),
            self.source_rows
        )
    }
}

// ============================================================================
// MIGRATOR
// ============================================================================

pub struct Migrator<'a> {
    config: &'a MigrationConfig,
    clock: &'a dyn Clock,
}

impl<'a> Migrator<'a> {
    pub fn new(config: &'a MigrationConfig, clock: &'a dyn Clock) -> Self {
        Migrator { config, clock }
    }

    /// Registry seeded with the store's counters. A failed lookup seeds nothing.
    pub fn seed_registry(&self, lookup: &dyn CounterLookup) -> IdentityRegistry {
        let mut registry = IdentityRegistry::new(self.config.reserved_counter_threshold);

        let existing = match lookup.existing_counters() {
            Ok(counters) => counters,
            Err(err) => {
                warn!(error = %format!("{:#}", err), "counter lookup failed, continuing with empty seed");
                Vec::new()
            }
        };

        info!(existing = existing.len(), "seeding counters from target store");
        registry.seed(existing);
        registry
    }

    /// Build transactions for a table, growing `registry`.
    /// Errors with `MigrationError::NothingToMigrate` when no row survives.
    pub fn build(&self, table: &Table, registry: &mut IdentityRegistry) -> Result<BuildReport> {
        let report = RecordBuilder::new(self.config, self.clock).build(&table.rows, registry);

        if report.transactions.is_empty() {
            return Err(MigrationError::NothingToMigrate {
                rows: table.len(),
                skipped: report.skipped.len(),
            }
            .into());
        }

        if self.config.always_emit_default_counter {
            registry.ensure_default_counter(&self.config.default_counter_key());
        }

        Ok(report)
    }

    pub fn run(
        &self,
        reader: &dyn TabularReader,
        input: &Path,
        lookup: &dyn CounterLookup,
        writer: &mut dyn BulkWriter,
    ) -> Result<MigrationSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("migration", run_id = %run_id);
        let _guard = span.enter();

        let stamped_at = self.clock.now();
        info!(input = %input.display(), "starting migration");

        let mut registry = self.seed_registry(lookup);
        let seeded_counters = registry.counters().len();

        let table = reader
            .read(input)
            .with_context(|| format!("Failed to read input: {}", input.display()))?;
        info!(rows = table.len(), columns = ?table.columns, "input loaded");

        let report = self.build(&table, &mut registry)?;
        info!(
            tickets = registry.tickets().len(),
            transactions = report.transactions.len(),
            skipped = report.skipped.len(),
            "rows processed"
        );

        let emitter = StatementEmitter::new(self.config, stamped_at).with_dialect(writer.dialect());
        let artifacts = emitter.render_all(&registry, &report.transactions, self.clock.now());

        let mut artifact_summaries = Vec::with_capacity(artifacts.len());
        for artifact in &artifacts {
            writer.write(artifact)?;
            artifact_summaries.push(ArtifactSummary {
                kind: artifact.kind,
                row_count: artifact.row_count,
                fingerprint: artifact.fingerprint(),
            });
        }

        let summary = MigrationSummary {
            run_id,
            source_rows: table.len(),
            seeded_counters,
            tickets: registry.tickets().len(),
            new_counters: registry.new_counters().count(),
            transactions: report.transactions.len(),
            skipped: report.skipped,
            defaulted_dates: report.defaulted_dates,
            defaulted_amounts: report.defaulted_amounts,
            artifacts: artifact_summaries,
        };
        info!("migration complete: {}", summary.summary());

        Ok(summary)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::StaticCounterLookup;
    use crate::normalize::FixedClock;
    use crate::source::CsvTableReader;
    use crate::writer::{SqlFileWriter, SqliteLoader};
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::fs;
    use std::io::Write;

    struct FailingLookup;

    impl CounterLookup for FailingLookup {
        fn existing_counters(&self) -> Result<Vec<(i64, String)>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    fn clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2025, 2, 10)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        )
    }

    fn write_sales_csv(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("sales.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "S.No,Invoice No,Date,Show Name,Category,Counter,Adult,Child,Total Paid").unwrap();
        writeln!(file, "1,INV-007,2024-03-15,Wax Museum,Adult,Raj,2,0,₹120").unwrap();
        writeln!(file, "2,INV-0008,15-03-2024,Wax Museum,Adult,Raj,0,3,₹90").unwrap();
        writeln!(file, "3,,2024-03-16,Horror House,Adult,Priya,1,0,₹60").unwrap();
        writeln!(file, "4,INV-0010,2024-03-16,Combo Wax,Family,ALICE,2,2,\"₹ 1,240.50\"").unwrap();
        path
    }

    #[test]
    fn test_end_to_end_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sales_csv(dir.path());
        let out = dir.path().join("sql_output");

        let config = MigrationConfig::default();
        let clock = clock();
        let lookup = StaticCounterLookup::new(vec![(3, "Alice".to_string())]);
        let mut writer = SqlFileWriter::new(&out).unwrap();

        let summary = Migrator::new(&config, &clock)
            .run(&CsvTableReader::new(), &input, &lookup, &mut writer)
            .unwrap();

        assert_eq!(summary.source_rows, 4);
        assert_eq!(summary.seeded_counters, 1);
        assert_eq!(summary.tickets, 2);
        assert_eq!(summary.transactions, 3);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].position, 3);
        // raj (14) and the injected default counter (15); alice is pre-existing
        assert_eq!(summary.new_counters, 2);

        let kinds: Vec<ArtifactKind> = summary.artifacts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, ArtifactKind::ALL.to_vec());

        let counters = fs::read_to_string(out.join("counters_insert.sql")).unwrap();
        assert!(counters.contains("(14, 'raj',"));
        assert!(counters.contains("(15, 'madhu',"));
        assert!(!counters.contains("'alice'"));

        let transactions = fs::read_to_string(out.join("transactions_insert.sql")).unwrap();
        assert!(transactions.contains("('7', '2024-03-15 00:00:00', 2, 0, 'Adult', 120.00, 1, 14,"));
        assert!(transactions.contains("('8', '2024-03-15 00:00:00', 1, 3, 'Adult', 90.00, 1, 14,"));
        assert!(transactions.contains("('10', '2024-03-16 00:00:00', 2, 2, 'Family', 1240.50, 2, 3,"));

        let tickets = fs::read_to_string(out.join("tickets_insert.sql")).unwrap();
        assert!(tickets.contains("(2, 80, 'Standard', 'Combo Wax',"));
    }

    #[test]
    fn test_lookup_failure_degrades_to_empty_seed() {
        let config = MigrationConfig::default();
        let clock = clock();

        let registry = Migrator::new(&config, &clock).seed_registry(&FailingLookup);

        assert!(registry.counters().is_empty());
        assert_eq!(registry.counters().next_id(), 14);
    }

    #[test]
    fn test_read_failure_is_fatal_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sql_output");

        let config = MigrationConfig::default();
        let clock = clock();
        let mut writer = SqlFileWriter::new(&out).unwrap();

        let result = Migrator::new(&config, &clock).run(
            &CsvTableReader::new(),
            &dir.path().join("missing.csv"),
            &StaticCounterLookup::default(),
            &mut writer,
        );

        assert!(result.is_err());
        assert!(writer.written().is_empty());
    }

    #[test]
    fn test_nothing_to_migrate() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.csv");
        fs::write(&input, "Invoice No,Show Name\n,Wax Museum\n").unwrap();

        let config = MigrationConfig::default();
        let clock = clock();
        let mut writer = SqlFileWriter::new(&dir.path().join("out")).unwrap();

        let err = Migrator::new(&config, &clock)
            .run(&CsvTableReader::new(), &input, &StaticCounterLookup::default(), &mut writer)
            .unwrap_err();

        match err.downcast_ref::<MigrationError>() {
            Some(MigrationError::NothingToMigrate { rows, skipped }) => {
                assert_eq!(*rows, 1);
                assert_eq!(*skipped, 1);
            }
            None => panic!("expected NothingToMigrate, got {err:#}"),
        }
        assert!(writer.written().is_empty());
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sales_csv(dir.path());

        let config = MigrationConfig::default();
        let clock = clock();
        let lookup = StaticCounterLookup::new(vec![(3, "Alice".to_string())]);

        let mut first_writer = SqlFileWriter::new(&dir.path().join("first")).unwrap();
        let mut second_writer = SqlFileWriter::new(&dir.path().join("second")).unwrap();
        let migrator = Migrator::new(&config, &clock);

        let first = migrator
            .run(&CsvTableReader::new(), &input, &lookup, &mut first_writer)
            .unwrap();
        let second = migrator
            .run(&CsvTableReader::new(), &input, &lookup, &mut second_writer)
            .unwrap();

        assert_ne!(first.run_id, second.run_id);
        for (a, b) in first.artifacts.iter().zip(second.artifacts.iter()) {
            assert_eq!(a.fingerprint, b.fingerprint);
        }
    }

    #[test]
    fn test_direct_load_keeps_referential_integrity() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sales_csv(dir.path());

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE tickets (
                id INTEGER PRIMARY KEY, price INTEGER, dropdown_name TEXT, show_name TEXT,
                counter_id INTEGER, is_analytics BOOLEAN, deleted BOOLEAN,
                "createdAt" TEXT, "updatedAt" TEXT
            );
            CREATE TABLE counters (
                id INTEGER PRIMARY KEY, username TEXT, password TEXT, role TEXT,
                special BOOLEAN, "createdAt" TEXT, "updatedAt" TEXT
            );
            INSERT INTO counters (id, username, password, role, special)
                VALUES (3, 'Alice', 'x', 'user', false);
            CREATE TABLE transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT, invoice_no TEXT, date TEXT,
                adult_count INTEGER, child_count INTEGER, category TEXT, total_paid REAL,
                ticket_id INTEGER REFERENCES tickets(id),
                counter_id INTEGER REFERENCES counters(id),
                "createdAt" TEXT, "updatedAt" TEXT
            );
            "#,
        )
        .unwrap();

        let config = MigrationConfig::default();
        let clock = clock();
        let existing = crate::lookup::query_counters(&conn).unwrap();
        let lookup = StaticCounterLookup::new(existing);

        let mut loader = SqliteLoader::new(&conn);
        Migrator::new(&config, &clock)
            .run(&CsvTableReader::new(), &input, &lookup, &mut loader)
            .unwrap();

        let joined: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM transactions t
                 JOIN tickets k ON k.id = t.ticket_id
                 JOIN counters c ON c.id = t.counter_id",
                [],
                |row| row.get(0),
            )
            .unwrap();
        let counters: i64 = conn
            .query_row("SELECT COUNT(*) FROM counters", [], |row| row.get(0))
            .unwrap();

        assert_eq!(joined, 3);
        assert_eq!(counters, 3);
    }
}
