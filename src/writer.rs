// 💾 Bulk Writers - Where rendered payloads go
//
// Each artifact is written only once its pass is complete. There is no
// rollback across artifacts: a failed run is fixed by re-running the whole
// migration, which is safe because discovery is deterministic.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::emitter::{Artifact, SqlDialect};

pub trait BulkWriter {
    fn write(&mut self, artifact: &Artifact) -> Result<()>;

    /// SQL flavour the payloads must be rendered in
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }
}

// ============================================================================
// SQL FILES
// ============================================================================

/// Writes `tickets_insert.sql`, `counters_insert.sql`, `transactions_insert.sql`
pub struct SqlFileWriter {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl SqlFileWriter {
    /// Creates the output directory if needed
    pub fn new(output_dir: &Path) -> Result<Self> {
        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory: {}", output_dir.display())
        })?;

        Ok(SqlFileWriter {
            output_dir: output_dir.to_path_buf(),
            written: Vec::new(),
        })
    }

    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.output_dir.join(artifact.kind.file_name())
    }

    /// Files written so far, in write order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl BulkWriter for SqlFileWriter {
    fn write(&mut self, artifact: &Artifact) -> Result<()> {
        let path = self.path_for(artifact);
        fs::write(&path, &artifact.body)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(
            file = %path.display(),
            rows = artifact.row_count,
            "wrote {} payload",
            artifact.kind.table()
        );
        self.written.push(path);
        Ok(())
    }
}

// ============================================================================
// DIRECT LOAD
// ============================================================================

/// Executes payloads straight against a SQLite connection
pub struct SqliteLoader<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteLoader<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        SqliteLoader { conn }
    }
}

impl BulkWriter for SqliteLoader<'_> {
    fn write(&mut self, artifact: &Artifact) -> Result<()> {
        if artifact.is_noop() {
            return Ok(());
        }

        self.conn
            .execute_batch(&artifact.body)
            .with_context(|| format!("Failed to load {} payload", artifact.kind.table()))?;

        info!(rows = artifact.row_count, "loaded {} payload", artifact.kind.table());
        Ok(())
    }

    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }
}

// ============================================================================
// TESTS
// ============================================================================
