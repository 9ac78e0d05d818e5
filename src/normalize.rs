// 🧹 Field Normalizer
// Pure functions that canonicalize one cell at a time.
//
// Currency and dates never reject a row: they degrade to 0.0 / "now" and say
// so through `Normalized::Defaulted`, so callers can tell a real value from a
// fallback.

use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::source::Cell;

// ============================================================================
// CLOCK
// ============================================================================

/// Source of "now" for processing timestamps and date fallbacks
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time (the target store keeps naive local timestamps)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

// ============================================================================
// NORMALIZED VALUE
// ============================================================================

/// Why a value fell back to its default
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DefaultReason {
    /// Cell was absent or empty
    Missing,

    /// Text matched no known shape
    Unparseable(String),

    /// Amount parsed but was below zero
    Negative(f64),

    /// Cell type carries no value of this kind
    UnsupportedType(&'static str),
}

impl std::fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultReason::Missing => write!(f, "missing value"),
            DefaultReason::Unparseable(raw) => write!(f, "unparseable value '{}'", raw),
            DefaultReason::Negative(n) => write!(f, "negative amount {}", n),
            DefaultReason::UnsupportedType(kind) => write!(f, "unsupported cell type {}", kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<T> {
    Parsed(T),
    Defaulted { value: T, reason: DefaultReason },
}

impl<T> Normalized<T> {
    pub fn value(&self) -> &T {
        match self {
            Normalized::Parsed(v) => v,
            Normalized::Defaulted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Normalized::Parsed(v) => v,
            Normalized::Defaulted { value, .. } => value,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Normalized::Defaulted { .. })
    }

    pub fn reason(&self) -> Option<&DefaultReason> {
        match self {
            Normalized::Parsed(_) => None,
            Normalized::Defaulted { reason, .. } => Some(reason),
        }
    }
}

// ============================================================================
// INVOICE NUMBERS
// ============================================================================

const INVOICE_PREFIX: &str = "inv-";

/// "Inv-00045" → "45". All-zero or digit-free input is absent, not "0".
pub fn normalize_invoice_number(cell: &Cell) -> Option<String> {
    let text = cell.to_text()?;
    let mut invoice = text.trim();

    if let Some(head) = invoice.get(..INVOICE_PREFIX.len()) {
        if head.eq_ignore_ascii_case(INVOICE_PREFIX) {
            invoice = &invoice[INVOICE_PREFIX.len()..];
        }
    }

    let digits: String = invoice.chars().filter(|c| c.is_ascii_digit()).collect();
    let digits = digits.trim_start_matches('0');

    if digits.is_empty() {
        None
    } else {
        Some(digits.to_string())
    }
}

// ============================================================================
// CURRENCY
// ============================================================================

/// "₹ 1,240.50" → 1240.5. Anything unusable degrades to 0.0.
pub fn normalize_currency(cell: &Cell, glyphs: &[String]) -> Normalized<f64> {
    let zero = |reason| Normalized::Defaulted { value: 0.0, reason };

    match cell {
        Cell::Missing => zero(DefaultReason::Missing),
        Cell::Timestamp(_) => zero(DefaultReason::UnsupportedType("timestamp")),
        Cell::Number(n) if *n < 0.0 => zero(DefaultReason::Negative(*n)),
        Cell::Number(n) => Normalized::Parsed(unsigned_zero(*n)),
        Cell::Text(raw) => {
            let mut cleaned = raw.trim().to_string();
            for glyph in glyphs {
                cleaned = cleaned.replace(glyph.as_str(), "");
            }
            let cleaned: String = cleaned
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();

            match cleaned.parse::<f64>() {
                Ok(n) if !n.is_finite() => zero(DefaultReason::Unparseable(raw.clone())),
                Ok(n) if n < 0.0 => zero(DefaultReason::Negative(n)),
                Ok(n) => Normalized::Parsed(unsigned_zero(n)),
                Err(_) => zero(DefaultReason::Unparseable(raw.clone())),
            }
        }
    }
}

/// -0.0 → 0.0, everything else unchanged
fn unsigned_zero(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

// ============================================================================
// DATES
// ============================================================================

/// Try each format in order; first match wins. Date-only formats land at midnight.
/// Missing or unparseable input falls back to `clock.now()`.
pub fn normalize_date(cell: &Cell, formats: &[String], clock: &dyn Clock) -> Normalized<NaiveDateTime> {
    let now = |reason| Normalized::Defaulted {
        value: clock.now(),
        reason,
    };

    match cell {
        Cell::Missing => now(DefaultReason::Missing),
        Cell::Timestamp(ts) => Normalized::Parsed(*ts),
        Cell::Number(_) => now(DefaultReason::UnsupportedType("number")),
        Cell::Text(raw) => {
            let text = raw.trim();
            for fmt in formats {
                if let Some(parsed) = parse_with_format(text, fmt) {
                    return Normalized::Parsed(parsed);
                }
            }
            now(DefaultReason::Unparseable(raw.clone()))
        }
    }
}

fn parse_with_format(text: &str, fmt: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = NaiveDateTime::parse_from_str(text, fmt) {
        return Some(ts);
    }
    NaiveDate::parse_from_str(text, fmt)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ============================================================================
// COUNTS
// ============================================================================

/// Attendee count from a cell. `None` means the cell holds something that is
/// not a non-negative whole number.
pub fn parse_count(cell: &Cell) -> Option<u32> {
    match cell {
        Cell::Number(n) => whole_number(*n),
        Cell::Text(raw) => {
            let text = raw.trim();
            text.parse::<u32>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(whole_number))
        }
        Cell::Missing | Cell::Timestamp(_) => None,
    }
}

fn whole_number(n: f64) -> Option<u32> {
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
        Some(n as u32)
    } else {
        None
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn fixed_clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_invoice_prefix_and_leading_zeros() {
        assert_eq!(normalize_invoice_number(&text("Inv-00045")), Some("45".to_string()));
        assert_eq!(normalize_invoice_number(&text("INV-007")), Some("7".to_string()));
        assert_eq!(normalize_invoice_number(&text("  inv-0120 ")), Some("120".to_string()));
    }

    #[test]
    fn test_invoice_absent_values() {
        assert_eq!(normalize_invoice_number(&text("0000")), None);
        assert_eq!(normalize_invoice_number(&text("abc")), None);
        assert_eq!(normalize_invoice_number(&text("INV-")), None);
        assert_eq!(normalize_invoice_number(&Cell::Missing), None);
    }

    #[test]
    fn test_invoice_digits_are_extracted_not_split() {
        assert_eq!(normalize_invoice_number(&text("A1-B2/03")), Some("1203".to_string()));
    }

    #[test]
    fn test_invoice_keeps_every_source_digit() {
        let long = Cell::from_raw("12345678901234567891");
        assert_eq!(normalize_invoice_number(&long), Some("12345678901234567891".to_string()));
        assert_eq!(normalize_invoice_number(&Cell::from_raw("1e3")), Some("13".to_string()));
    }

    #[test]
    fn test_invoice_from_number_cell() {
        assert_eq!(normalize_invoice_number(&Cell::Number(45.0)), Some("45".to_string()));
    }

    #[test]
    fn test_currency_parsing() {
        let glyphs = MigrationConfig::default().currency_glyphs;

        assert_eq!(normalize_currency(&text("₹ 1,240.50"), &glyphs), Normalized::Parsed(1240.50));
        assert_eq!(normalize_currency(&text("₹120"), &glyphs), Normalized::Parsed(120.0));
        assert_eq!(normalize_currency(&Cell::Number(90.0), &glyphs), Normalized::Parsed(90.0));
    }

    #[test]
    fn test_currency_negative_zero_is_zero() {
        let glyphs = MigrationConfig::default().currency_glyphs;

        for cell in [text("-0"), text("₹ -0.00"), Cell::Number(-0.0)] {
            let amount = normalize_currency(&cell, &glyphs).into_value();
            assert!(amount.is_sign_positive());
            assert_eq!(format!("{:.2}", amount), "0.00");
        }
    }

    #[test]
    fn test_currency_degrades_to_zero() {
        let glyphs = MigrationConfig::default().currency_glyphs;

        let missing = normalize_currency(&Cell::Missing, &glyphs);
        assert_eq!(*missing.value(), 0.0);
        assert_eq!(missing.reason(), Some(&DefaultReason::Missing));

        let garbage = normalize_currency(&text("garbage"), &glyphs);
        assert_eq!(*garbage.value(), 0.0);
        assert_eq!(
            garbage.reason(),
            Some(&DefaultReason::Unparseable("garbage".to_string()))
        );

        let negative = normalize_currency(&text("-50"), &glyphs);
        assert_eq!(*negative.value(), 0.0);
        assert!(negative.is_defaulted());
    }

    #[test]
    fn test_date_iso_is_midnight() {
        let formats = MigrationConfig::default().date_formats;
        let clock = fixed_clock();

        let result = normalize_date(&text("2024-03-15"), &formats, &clock);
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(result, Normalized::Parsed(expected));
    }

    #[test]
    fn test_date_format_order() {
        let formats = MigrationConfig::default().date_formats;
        let clock = fixed_clock();

        // DD-MM-YYYY
        let d = normalize_date(&text("05-04-2024"), &formats, &clock).into_value();
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 4, 5).unwrap());

        // MM/DD/YYYY
        let d = normalize_date(&text("04/05/2024"), &formats, &clock).into_value();
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 4, 5).unwrap());

        // YYYY/MM/DD
        let d = normalize_date(&text("2024/04/05"), &formats, &clock).into_value();
        assert_eq!(d.date(), NaiveDate::from_ymd_opt(2024, 4, 5).unwrap());
    }

    #[test]
    fn test_date_falls_back_to_clock() {
        let formats = MigrationConfig::default().date_formats;
        let clock = fixed_clock();

        let result = normalize_date(&text("sometime in march"), &formats, &clock);
        assert!(result.is_defaulted());
        assert_eq!(*result.value(), clock.now());

        let missing = normalize_date(&Cell::Missing, &formats, &clock);
        assert_eq!(missing.reason(), Some(&DefaultReason::Missing));
        assert_eq!(*missing.value(), clock.now());

        let number = normalize_date(&Cell::Number(45000.0), &formats, &clock);
        assert_eq!(number.reason(), Some(&DefaultReason::UnsupportedType("number")));
    }

    #[test]
    fn test_date_timestamp_passes_through() {
        let formats = MigrationConfig::default().date_formats;
        let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(18, 45, 10)
            .unwrap();

        let result = normalize_date(&Cell::Timestamp(ts), &formats, &fixed_clock());
        assert_eq!(result, Normalized::Parsed(ts));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(&Cell::Number(3.0)), Some(3));
        assert_eq!(parse_count(&text(" 2 ")), Some(2));
        assert_eq!(parse_count(&text("4.0")), Some(4));
        assert_eq!(parse_count(&text("two")), None);
        assert_eq!(parse_count(&Cell::Number(-1.0)), None);
        assert_eq!(parse_count(&Cell::Number(1.5)), None);
    }
}
