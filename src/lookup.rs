// 🔎 Counter Lookup - Counters that already exist in the target store
//
// A failed lookup is not fatal: the migrator logs it and seeds nothing.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Source of pre-existing (id, username) counter pairs
pub trait CounterLookup {
    fn existing_counters(&self) -> Result<Vec<(i64, String)>>;
}

/// Reads `SELECT id, username FROM counters` from a SQLite database file
pub struct SqliteCounterLookup {
    db_path: PathBuf,
}

impl SqliteCounterLookup {
    pub fn new(db_path: &Path) -> Self {
        SqliteCounterLookup {
            db_path: db_path.to_path_buf(),
        }
    }
}

impl CounterLookup for SqliteCounterLookup {
    fn existing_counters(&self) -> Result<Vec<(i64, String)>> {
        let conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open database: {}", self.db_path.display()))?;
        query_counters(&conn)
    }
}

/// Existing counters from an open connection, ordered by id
pub fn query_counters(conn: &Connection) -> Result<Vec<(i64, String)>> {
    let mut stmt = conn
        .prepare("SELECT id, username FROM counters ORDER BY id")
        .context("Failed to query counters")?;

    let counters = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<(i64, String)>, _>>()?;

    Ok(counters)
}

/// Fixed list of counters (no store available, or tests)
#[derive(Debug, Clone, Default)]
pub struct StaticCounterLookup {
    counters: Vec<(i64, String)>,
}

impl StaticCounterLookup {
    pub fn new(counters: Vec<(i64, String)>) -> Self {
        StaticCounterLookup { counters }
    }
}

impl CounterLookup for StaticCounterLookup {
    fn existing_counters(&self) -> Result<Vec<(i64, String)>> {
        Ok(self.counters.clone())
    }
}

// ============================================================================
// TESTS
// ============================================================================
