//! In-memory implementation of `ChainStore`.
//!
//! `InMemoryChainStore` keeps one family's records in a `Vec` behind a
//! `Mutex`.  Insertion order is creation order.  It backs the demo mode of
//! the register and every test in the workspace.

use std::sync::{Mutex, MutexGuard};

use nf525_contracts::{
    canonical::canonical_previous,
    error::{ChainError, ChainResult},
    event::ChainRecord,
};
use nf525_core::traits::ChainStore;

/// An append-only, in-memory store for one chain family.
#[derive(Debug)]
pub struct InMemoryChainStore<R> {
    records: Mutex<Vec<R>>,
}

impl<R: ChainRecord> InMemoryChainStore<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Start from already persisted rows, oldest first.  The rows are taken
    /// as-is; nothing is re-sealed or checked.
    pub fn with_records(records: Vec<R>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Copy of every stored record, oldest first.
    pub fn snapshot(&self) -> ChainResult<Vec<R>> {
        Ok(self.lock()?.clone())
    }

    pub fn len(&self) -> ChainResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> ChainResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> ChainResult<MutexGuard<'_, Vec<R>>> {
        self.records
            .lock()
            .map_err(|e| ChainError::storage(format!("chain store lock poisoned: {}", e)))
    }
}

impl<R: ChainRecord> Default for InMemoryChainStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ChainRecord> ChainStore<R> for InMemoryChainStore<R> {
    fn load_chain(&self) -> ChainResult<Vec<R>> {
        self.snapshot()
    }

    fn head_hash(&self) -> ChainResult<Option<String>> {
        let records = self.lock()?;
        Ok(records.last().and_then(|r| r.hash()).map(str::to_string))
    }

    /// Checks the head and pushes under a single lock acquisition.
    fn append_if_head(&self, expected_head: Option<&str>, record: R) -> ChainResult<()> {
        let mut records = self.lock()?;
        guard_append(
            records.last().and_then(|r| r.hash()),
            expected_head,
            &record,
        )?;
        records.push(record);
        Ok(())
    }
}

/// Shared precondition for conditional appends.
///
/// The current head must equal `expected_head`, and the record itself must
/// point at that head.
pub(crate) fn guard_append<R: ChainRecord>(
    current_head: Option<&str>,
    expected_head: Option<&str>,
    record: &R,
) -> ChainResult<()> {
    if canonical_previous(current_head) != canonical_previous(expected_head) {
        return Err(ChainError::AppendConflict {
            family: R::FAMILY,
            expected: canonical_previous(expected_head).to_string(),
            actual: canonical_previous(current_head).to_string(),
        });
    }
    if canonical_previous(record.previous_hash()) != canonical_previous(expected_head) {
        return Err(ChainError::contract(format!(
            "{} record '{}' is not linked to the expected head",
            R::FAMILY,
            record.record_id()
        )));
    }
    Ok(())
}
