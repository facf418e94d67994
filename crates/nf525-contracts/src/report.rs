//! Verification verdicts.
//!
//! A broken chain is the positive-detection outcome of a verification pass
//! and is returned as data, never as an error.

use serde::{Deserialize, Serialize};

use crate::event::ChainFamily;

/// Why a record was flagged as the first break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    /// The stored `previous_hash` does not point at the preceding record.
    PreviousHashMismatch,
    /// The stored `hash` differs from the hash recomputed from the fields.
    HashMismatch,
    /// The stored fields cannot be canonicalized (e.g. a non-finite total).
    UnreadableFields,
}

/// The result of one verification pass over a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub family: ChainFamily,
    pub valid: bool,

    /// Records examined, including the breaking one.
    pub total_checked: usize,

    /// Zero-based position of the first break.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_broken_index: Option<usize>,

    /// `ChainRecord::record_id` of the first broken record (ticket number for
    /// sales, closure date for closures, entry id for audit).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_broken_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_kind: Option<BreakKind>,
}

impl IntegrityReport {
    /// An unbroken chain of `total_checked` records.
    pub fn intact(family: ChainFamily, total_checked: usize) -> Self {
        Self {
            family,
            valid: true,
            total_checked,
            first_broken_index: None,
            first_broken_id: None,
            break_kind: None,
        }
    }

    /// A chain broken at `index`.
    pub fn broken(family: ChainFamily, index: usize, record_id: String, kind: BreakKind) -> Self {
        Self {
            family,
            valid: false,
            total_checked: index + 1,
            first_broken_index: Some(index),
            first_broken_id: Some(record_id),
            break_kind: Some(kind),
        }
    }
}
