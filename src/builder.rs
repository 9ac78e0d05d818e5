// 🧾 Record Builder - Raw rows → canonical transactions
//
// Per row: extract (with defaults) → normalize → validate → resolve ids → repair.
// A row ends either Emitted or Skipped. Skipped rows leave a diagnostic and
// never allocate ids, because validation runs before any registry lookup.
//
// Rows are processed strictly in input order: the first row naming a ticket or
// counter decides its id.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MigrationConfig;
use crate::normalize::{
    normalize_currency, normalize_date, normalize_invoice_number, parse_count, Clock, Normalized,
};
use crate::registry::{counter_key, IdentityRegistry};
use crate::source::{Cell, RawRow};

/// Column names the builder reads (already normalized)
pub mod columns {
    pub const SERIAL: &str = "s.no";
    pub const INVOICE_NO: &str = "invoice_no";
    pub const DATE: &str = "date";
    pub const SHOW_NAME: &str = "show_name";
    pub const CATEGORY: &str = "category";
    pub const COUNTER: &str = "counter";
    pub const ADULT: &str = "adult";
    pub const CHILD: &str = "child";
    pub const TOTAL_PAID: &str = "total_paid";
}

// ============================================================================
// CANONICAL TRANSACTION
// ============================================================================

/// Fully resolved transaction, ready for the transactions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTransaction {
    /// Digits only, no prefix, no leading zeros
    pub invoice_no: String,
    pub date: NaiveDateTime,
    pub adult_count: u32,
    pub child_count: u32,
    pub category: String,
    pub total_paid: f64,
    pub ticket_id: i64,
    pub counter_id: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ============================================================================
// ROW ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("missing or invalid invoice number")]
    MissingInvoice,

    #[error("empty {field}")]
    EmptyField { field: &'static str },

    #[error("invalid {field} count '{value}'")]
    InvalidCount { field: &'static str, value: String },
}

/// Diagnostic for a row that was not emitted
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based row position in the source
    pub position: usize,
    /// Serial number from the sheet, or the position when absent
    pub serial: String,
    pub error: RowError,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub transactions: Vec<CanonicalTransaction>,
    pub skipped: Vec<SkippedRow>,
    /// Emitted rows whose date fell back to processing time
    pub defaulted_dates: usize,
    /// Emitted rows whose total fell back to 0.0
    pub defaulted_amounts: usize,
}

// ============================================================================
// FIELD EXTRACTION
// ============================================================================

/// The nine known fields of one row after defaulting and normalization
#[derive(Debug, Clone)]
struct RowFields {
    serial: String,
    invoice_no: Option<String>,
    date: Normalized<NaiveDateTime>,
    show_name: String,
    category: String,
    counter_name: String,
    adult_count: u32,
    child_count: u32,
    total_paid: Normalized<f64>,
}

fn text_or(row: &RawRow, column: &str, default: &str) -> String {
    row.get(column)
        .and_then(Cell::to_text)
        .unwrap_or_else(|| default.to_string())
}

fn count_or_zero(row: &RawRow, column: &'static str) -> Result<u32, RowError> {
    match row.get(column) {
        None => Ok(0),
        Some(cell) => parse_count(cell).ok_or_else(|| RowError::InvalidCount {
            field: column,
            value: cell.to_text().unwrap_or_default(),
        }),
    }
}

// ============================================================================
// RECORD BUILDER
// ============================================================================

pub struct RecordBuilder<'a> {
    config: &'a MigrationConfig,
    clock: &'a dyn Clock,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(config: &'a MigrationConfig, clock: &'a dyn Clock) -> Self {
        RecordBuilder { config, clock }
    }

    /// Process every row in order, growing the registry as names are discovered
    pub fn build(&self, rows: &[RawRow], registry: &mut IdentityRegistry) -> BuildReport {
        let mut report = BuildReport::default();

        for (idx, row) in rows.iter().enumerate() {
            let position = if row.position > 0 { row.position } else { idx + 1 };

            match self.build_row(row, position, registry) {
                Ok((tx, fields)) => {
                    if fields.date.is_defaulted() {
                        report.defaulted_dates += 1;
                        if let Some(reason) = fields.date.reason() {
                            debug!(row = position, %reason, "date defaulted to processing time");
                        }
                    }
                    if fields.total_paid.is_defaulted() {
                        report.defaulted_amounts += 1;
                        if let Some(reason) = fields.total_paid.reason() {
                            debug!(row = position, %reason, "total_paid defaulted to 0.0");
                        }
                    }
                    report.transactions.push(tx);
                }
                Err((serial, error)) => {
                    warn!(row = position, serial = %serial, %error, "skipping row");
                    report.skipped.push(SkippedRow {
                        position,
                        serial,
                        error,
                    });
                }
            }

            let interval = self.config.progress_interval;
            if interval > 0 && position % interval == 0 {
                info!("Processed {} rows...", position);
            }
        }

        report
    }

    fn extract(&self, row: &RawRow, position: usize) -> Result<RowFields, (String, RowError)> {
        let serial = text_or(row, columns::SERIAL, &position.to_string());
        let fail = |error| (serial.clone(), error);

        let adult_count = count_or_zero(row, columns::ADULT).map_err(fail)?;
        let child_count = count_or_zero(row, columns::CHILD).map_err(fail)?;

        let missing = Cell::Missing;
        let invoice_no = row.get(columns::INVOICE_NO).and_then(normalize_invoice_number);
        let date = normalize_date(
            row.get(columns::DATE).unwrap_or(&missing),
            &self.config.date_formats,
            self.clock,
        );
        let total_paid = normalize_currency(
            row.get(columns::TOTAL_PAID).unwrap_or(&missing),
            &self.config.currency_glyphs,
        );

        let show_name = text_or(row, columns::SHOW_NAME, &self.config.default_show_name)
            .trim()
            .to_string();
        let category = text_or(row, columns::CATEGORY, &self.config.default_category)
            .trim()
            .to_string();
        let counter_name = counter_key(&text_or(
            row,
            columns::COUNTER,
            &self.config.default_counter_name,
        ));

        Ok(RowFields {
            serial,
            invoice_no,
            date,
            show_name,
            category,
            counter_name,
            adult_count,
            child_count,
            total_paid,
        })
    }

    fn build_row(
        &self,
        row: &RawRow,
        position: usize,
        registry: &mut IdentityRegistry,
    ) -> Result<(CanonicalTransaction, RowFields), (String, RowError)> {
        let fields = self.extract(row, position)?;
        let fail = |error| (fields.serial.clone(), error);

        let invoice_no = fields
            .invoice_no
            .clone()
            .ok_or_else(|| fail(RowError::MissingInvoice))?;

        for (field, value) in [
            (columns::SHOW_NAME, &fields.show_name),
            (columns::CATEGORY, &fields.category),
            (columns::COUNTER, &fields.counter_name),
        ] {
            if value.is_empty() {
                return Err(fail(RowError::EmptyField { field }));
            }
        }

        let ticket_id = registry.resolve_or_create_ticket(&fields.show_name);

        let default_counter = self.config.default_counter_key();
        if fields.counter_name == default_counter && !registry.has_counter(&default_counter) {
            let id = registry.ensure_default_counter(&default_counter);
            info!(counter = %default_counter, id, "registered default counter");
        }
        let counter_id = registry.resolve_or_create_counter(&fields.counter_name);

        // Every transaction carries at least one adult, even when children were
        // recorded and adults were not.
        let adult_count = if fields.adult_count == 0 { 1 } else { fields.adult_count };

        let now = self.clock.now();
        let tx = CanonicalTransaction {
            invoice_no,
            date: *fields.date.value(),
            adult_count,
            child_count: fields.child_count,
            category: fields.category.clone(),
            total_paid: *fields.total_paid.value(),
            ticket_id,
            counter_id,
            created_at: now,
            updated_at: now,
        };

        Ok((tx, fields))
    }
}

// ============================================================================
// TESTS
// ============================================================================
