//! Hash-chain primitives: the per-family digest builders.
//!
//! Each family hashes its canonical fields joined with `|`, followed by the
//! previous record's stored hash (empty for the first record):
//!
//!   sale    = ticket_number | created_at | total(2dp) | previous_hash
//!   closure = closure_date | total_sales | total_ttc(2dp) | previous_hash
//!   audit   = timestamp | event_type | table_name | record_id | previous_hash
//!
//! The joined string is fed as UTF-8 into SHA-256 and rendered as 64
//! lowercase hex characters.  These orders are fixed: stored chains were
//! produced with them.

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use nf525_contracts::{
    canonical::{canonical_amount, canonical_date, canonical_source, join_fields},
    error::ChainResult,
    event::ChainRecord,
};

/// SHA-256 of `source`, lowercase hex.
pub fn sha256_hex(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash of a sale.
///
/// Returns `ContractViolation` if `total` is not finite.
pub fn compute_sale_hash(
    ticket_number: &str,
    created_at: &str,
    total: f64,
    previous_hash: Option<&str>,
) -> ChainResult<String> {
    let total = canonical_amount(total)?;
    let source = join_fields(&[ticket_number, created_at, total.as_str()], previous_hash);
    Ok(sha256_hex(&source))
}

/// Hash of a daily closure.
///
/// Returns `ContractViolation` if `total_ttc` is not finite.
pub fn compute_closure_hash(
    closure_date: NaiveDate,
    total_sales: u64,
    total_ttc: f64,
    previous_hash: Option<&str>,
) -> ChainResult<String> {
    let fields = [
        canonical_date(closure_date),
        total_sales.to_string(),
        canonical_amount(total_ttc)?,
    ];
    Ok(sha256_hex(&join_fields(&fields, previous_hash)))
}

/// Hash of an audit-log entry.  A missing `record_id` hashes as "".
///
/// Field values are not escaped: a `|` inside `table_name` or `record_id`
/// can make two different entries hash identically.
pub fn compute_audit_hash(
    timestamp: &str,
    event_type: &str,
    table_name: &str,
    record_id: Option<&str>,
    previous_hash: Option<&str>,
) -> String {
    let source = join_fields(
        &[timestamp, event_type, table_name, record_id.unwrap_or("")],
        previous_hash,
    );
    sha256_hex(&source)
}

/// Hash any chained record from its own canonical fields.
pub fn hash_record<R: ChainRecord>(record: &R, previous_hash: Option<&str>) -> ChainResult<String> {
    Ok(sha256_hex(&canonical_source(record, previous_hash)?))
}

/// Link `record` onto `previous_hash` and stamp its hash.
///
/// The record's own `hash`/`previous_hash` columns are overwritten; callers
/// seal a record exactly once, right before persisting it.
pub fn seal<R: ChainRecord>(mut record: R, previous_hash: Option<String>) -> ChainResult<R> {
    let hash = hash_record(&record, previous_hash.as_deref())?;
    record.link(previous_hash, hash);
    Ok(record)
}
