//! Error types for the fiscal integrity chain.
//!
//! A broken chain is NOT an error: verification reports it through
//! `IntegrityReport`.  The variants here cover caller bugs, infrastructure
//! failures and scans that could not reach a verdict.

use thiserror::Error;

use crate::event::ChainFamily;

/// The unified error type for the NF525 crates.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Malformed input handed to the hash builder (e.g. a non-finite total).
    ///
    /// A caller bug; never retried.
    #[error("contract violation: {reason}")]
    ContractViolation { reason: String },

    /// The backing store could not be read or written.
    ///
    /// Retryable by the caller.  Must never be surfaced as a tamper finding.
    #[error("storage failure: {reason}")]
    StorageFailure { reason: String },

    /// A conditional append lost the race for the chain head.
    #[error("append conflict on {family} chain: expected head '{expected}', found '{actual}'")]
    AppendConflict {
        family: ChainFamily,
        expected: String,
        actual: String,
    },

    /// A verification pass was cancelled or ran past its deadline.
    #[error("{family} chain scan interrupted after {checked} event(s): {reason}")]
    ScanInterrupted {
        family: ChainFamily,
        checked: usize,
        reason: String,
    },

    /// A daily closure already exists for this date.
    #[error("day {date} is already closed")]
    AlreadyClosed { date: String },

    /// A business record was committed to its chain, but the audit entry
    /// that should accompany it could not be written.
    ///
    /// The record is stored and must not be submitted again.
    #[error("{family} record '{record_id}' was committed but not journaled: {reason}")]
    JournalFailed {
        family: ChainFamily,
        record_id: String,
        reason: String,
    },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl ChainError {
    /// Shorthand for building a `ContractViolation`.
    pub fn contract(reason: impl Into<String>) -> Self {
        Self::ContractViolation {
            reason: reason.into(),
        }
    }

    /// Shorthand for building a `StorageFailure`.
    pub fn storage(reason: impl Into<String>) -> Self {
        Self::StorageFailure {
            reason: reason.into(),
        }
    }

    /// True for failures a caller may retry (storage and append races).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageFailure { .. } | Self::AppendConflict { .. }
        )
    }
}

/// Convenience alias used throughout the NF525 crates.
pub type ChainResult<T> = Result<T, ChainError>;
