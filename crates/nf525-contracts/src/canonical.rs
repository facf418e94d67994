//! Canonical encoding of chain fields.
//!
//! Stored chains were produced by a system that renders amounts with
//! ECMAScript `Number.prototype.toFixed(2)`, timestamps with
//! `Date.prototype.toISOString()`, and joins fields with `|`.  Every helper
//! here reproduces that byte-for-byte; changing any of them silently
//! invalidates every previously persisted hash.
//!
//! Hash input layout (UTF-8, in order):
//!   canonical field 1 | canonical field 2 | ... | previous hash (or "")

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

use crate::{
    error::{ChainError, ChainResult},
    event::ChainRecord,
};

/// Field separator.  No escaping is applied to field values.
pub const DELIMITER: char = '|';

/// Magnitude at which `toFixed` switches to exponent notation.
const AMOUNT_LIMIT: f64 = 1e21;

/// Render a currency amount with exactly two decimals.
///
/// Matches `toFixed(2)`: the exact binary value is rounded to the nearest
/// hundredth, ties away from zero, and negative zero renders as `0.00`.
///
/// Returns `ContractViolation` for NaN, infinities, and magnitudes of 1e21
/// or more.
pub fn canonical_amount(value: f64) -> ChainResult<String> {
    if !value.is_finite() {
        return Err(ChainError::contract(format!(
            "amount {value} is not a finite number"
        )));
    }
    if value.abs() >= AMOUNT_LIMIT {
        return Err(ChainError::contract(format!(
            "amount {value:e} is outside the fixed-point range"
        )));
    }
    if value == 0.0 {
        return Ok("0.00".to_string());
    }

    let magnitude = value.abs();
    // An exact tie at the third decimal is only representable as an odd
    // multiple of 1/8.  `format!` rounds those half-to-even.
    // Such values are below 2^50, so eighths fit a u64 with room for * 100.
    if (magnitude * 8.0).fract() == 0.0 && (magnitude * 4.0).fract() != 0.0 {
        let eighths = (magnitude * 8.0) as u64;
        let cents = (eighths * 100 + 4) / 8;
        let sign = if value < 0.0 { "-" } else { "" };
        return Ok(format!("{sign}{}.{:02}", cents / 100, cents % 100));
    }

    Ok(format!("{value:.2}"))
}

/// Render a calendar date as `YYYY-MM-DD`.
pub fn canonical_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Render an instant the way the point of sale stamps its rows:
/// millisecond precision, `Z` suffix (`2024-01-15T10:00:00.000Z`).
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Collapse the "no predecessor" sentinel: `None` and `Some("")` are the
/// same empty field.
pub fn canonical_previous(previous_hash: Option<&str>) -> &str {
    previous_hash.unwrap_or("")
}

/// Join canonical fields and the previous hash into the hash source string.
pub fn join_fields<S: AsRef<str>>(fields: &[S], previous_hash: Option<&str>) -> String {
    let mut source = String::new();
    for field in fields {
        source.push_str(field.as_ref());
        source.push(DELIMITER);
    }
    source.push_str(canonical_previous(previous_hash));
    source
}

/// Build the full hash source string for `record` chained onto
/// `previous_hash`.
pub fn canonical_source<R: ChainRecord>(
    record: &R,
    previous_hash: Option<&str>,
) -> ChainResult<String> {
    let fields = record.canonical_fields()?;
    Ok(join_fields(&fields, previous_hash))
}
