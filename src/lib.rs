// Ticket Migration - Core Library
// Spreadsheet sales records → INSERT payloads for tickets, counters, transactions

pub mod config;
pub mod source;
pub mod normalize;
pub mod registry;
pub mod lookup;
pub mod builder;
pub mod emitter;
pub mod writer;
pub mod migrate;

// Re-export commonly used types
pub use config::{MigrationConfig, PriceRules};
pub use source::{
    Cell, RawRow, Table, TabularReader, CsvTableReader,
    normalize_column_name,
};
pub use normalize::{
    Clock, SystemClock, FixedClock, Normalized, DefaultReason,
    normalize_invoice_number, normalize_currency, normalize_date, parse_count,
};
pub use registry::{IdentityRegistry, NameMap};
pub use lookup::{CounterLookup, SqliteCounterLookup, StaticCounterLookup};
pub use builder::{
    BuildReport, CanonicalTransaction, RecordBuilder, RowError, SkippedRow,
};
pub use emitter::{Artifact, ArtifactKind, SqlDialect, StatementEmitter, ticket_price};
pub use writer::{BulkWriter, SqlFileWriter, SqliteLoader};
pub use migrate::{
    ArtifactSummary, MigrationError, MigrationSummary, Migrator,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
