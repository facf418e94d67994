//! Appending to a chain.
//!
//! `ChainWriter` threads the chain head explicitly through every append:
//! read the head, seal the record onto it, then ask the store to insert
//! only if the head has not moved.  A writer that loses the race re-reads
//! the head and re-seals, up to `max_attempts` times.

use tracing::{info, warn};

use nf525_contracts::{
    error::{ChainError, ChainResult},
    event::ChainRecord,
    report::IntegrityReport,
};
use nf525_core::traits::ChainStore;

use crate::{
    chain::seal,
    verify::{verify_store, ScanControl},
};

/// Compare-and-append writer over a `ChainStore`.
///
/// One writer may serve several families when `S` implements `ChainStore`
/// for each record type.
#[derive(Debug, Clone)]
pub struct ChainWriter<S> {
    store: S,
    max_attempts: u32,
}

impl<S> ChainWriter<S> {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Bound the number of seal-and-insert rounds.  Values below 1 are
    /// raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Seal `record` onto the current head and persist it.
    ///
    /// Returns the sealed record as stored.  Fails with `ContractViolation`
    /// if the record cannot be hashed, `StorageFailure` if the store fails,
    /// or `AppendConflict` once every attempt lost the race.
    pub fn append<R>(&self, record: R) -> ChainResult<R>
    where
        R: ChainRecord,
        S: ChainStore<R>,
    {
        self.append_with(record, || self.store.head_hash())
    }

    /// Like `append`, but `check` first inspects the chain snapshot the
    /// record is about to be sealed onto.
    ///
    /// The head comes from that same snapshot, so a record accepted by
    /// `check` can only land if nothing was appended in between.  After a
    /// lost race the chain is reloaded and `check` runs again.  An error
    /// from `check` is returned unchanged and nothing is written.
    pub fn append_guarded<R, F>(&self, record: R, check: F) -> ChainResult<R>
    where
        R: ChainRecord,
        S: ChainStore<R>,
        F: Fn(&[R]) -> ChainResult<()>,
    {
        self.append_with(record, || {
            let records: Vec<R> = self.store.load_chain()?;
            check(&records)?;
            Ok(records.last().and_then(|r| r.hash()).map(str::to_string))
        })
    }

    fn append_with<R, H>(&self, record: R, read_head: H) -> ChainResult<R>
    where
        R: ChainRecord,
        S: ChainStore<R>,
        H: Fn() -> ChainResult<Option<String>>,
    {
        let mut attempt = 1;
        loop {
            let head = read_head()?;
            let sealed = seal(record.clone(), head.clone())?;

            match self.store.append_if_head(head.as_deref(), sealed.clone()) {
                Ok(()) => {
                    info!(
                        family = %R::FAMILY,
                        record_id = %sealed.record_id(),
                        hash = sealed.hash().unwrap_or_default(),
                        attempt,
                        "record appended to chain"
                    );
                    return Ok(sealed);
                }
                Err(ChainError::AppendConflict { .. }) if attempt < self.max_attempts => {
                    warn!(
                        family = %R::FAMILY,
                        record_id = %sealed.record_id(),
                        attempt,
                        "chain head moved during append; retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Verify the family `R` in the underlying store.
    pub fn verify<R>(&self, control: &ScanControl) -> ChainResult<IntegrityReport>
    where
        R: ChainRecord,
        S: ChainStore<R>,
    {
        verify_store::<R, S>(&self.store, control)
    }
}
