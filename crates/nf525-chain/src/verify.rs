//! Chain verification: replay a family and locate its first break.
//!
//! Rules, checked per record in stored order:
//!
//! 1. **Prev-hash linkage**: the stored `previous_hash` equals the stored
//!    `hash` of the preceding record (the empty sentinel for record 0).
//! 2. **Hash correctness**: when a `hash` is stored, it equals the value
//!    recomputed from the record's own fields and the preceding stored hash.
//!
//! The walk advances on the *stored* hash, not the recomputed one, so a
//! single tampered record is reported once instead of cascading.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use nf525_contracts::{
    canonical::canonical_previous,
    error::{ChainError, ChainResult},
    event::{ChainFamily, ChainRecord},
    report::{BreakKind, IntegrityReport},
};
use nf525_core::traits::ChainStore;

use crate::chain::hash_record;

/// Cooperative interruption for long verification passes.
///
/// Checked once per record.  Clones share the same cancellation flag, so a
/// handle can be given to another thread to abort the scan.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl ScanControl {
    /// A control that never interrupts until `cancel()` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the scan once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Request interruption at the next checkpoint.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn checkpoint(&self, family: ChainFamily, checked: usize) -> ChainResult<()> {
        let reason = if self.is_cancelled() {
            "cancelled"
        } else if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            "deadline exceeded"
        } else {
            return Ok(());
        };

        warn!(family = %family, checked, reason, "chain scan interrupted");
        Err(ChainError::ScanInterrupted {
            family,
            checked,
            reason: reason.to_string(),
        })
    }
}

/// Verify an ordered slice of records from one family.
///
/// Returns a report (valid or broken at the first mismatch), or
/// `ScanInterrupted` if `control` fires before the walk reaches a verdict.
/// An empty slice is valid with zero records checked.
pub fn verify_chain<R: ChainRecord>(
    records: &[R],
    control: &ScanControl,
) -> ChainResult<IntegrityReport> {
    let family = R::FAMILY;
    let mut expected_previous: Option<&str> = None;

    for (index, record) in records.iter().enumerate() {
        control.checkpoint(family, index)?;

        // Rule 1: the stored pointer must match the preceding stored hash.
        if canonical_previous(record.previous_hash()) != canonical_previous(expected_previous) {
            warn!(
                family = %family,
                index,
                record_id = %record.record_id(),
                "previous-hash pointer mismatch"
            );
            return Ok(IntegrityReport::broken(
                family,
                index,
                record.record_id(),
                BreakKind::PreviousHashMismatch,
            ));
        }

        // Rule 2: recompute and compare, when a hash was stored at all.
        if let Some(stored) = record.hash() {
            let kind = match hash_record(record, expected_previous) {
                Ok(recomputed) if recomputed == stored => None,
                Ok(_) => Some(BreakKind::HashMismatch),
                Err(err) => {
                    debug!(error = %err, "stored fields cannot be canonicalized");
                    Some(BreakKind::UnreadableFields)
                }
            };
            if let Some(kind) = kind {
                warn!(
                    family = %family,
                    index,
                    record_id = %record.record_id(),
                    ?kind,
                    "stored hash does not match recomputed hash"
                );
                return Ok(IntegrityReport::broken(family, index, record.record_id(), kind));
            }
        }

        expected_previous = record.hash();
    }

    Ok(IntegrityReport::intact(family, records.len()))
}

/// Load a whole family from `store` and verify it.
///
/// A failed read is returned as `StorageFailure`, never as a broken chain.
pub fn verify_store<R, S>(store: &S, control: &ScanControl) -> ChainResult<IntegrityReport>
where
    R: ChainRecord,
    S: ChainStore<R> + ?Sized,
{
    let records = store.load_chain()?;
    let report = verify_chain(&records, control)?;

    info!(
        family = %report.family,
        valid = report.valid,
        total_checked = report.total_checked,
        first_broken_index = ?report.first_broken_index,
        "chain verified"
    );

    Ok(report)
}
