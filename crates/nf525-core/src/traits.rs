//! Core trait definitions for the fiscal integrity chain.
//!
//! - `ChainStore`: trusted persistence for one chain family
//! - `Clock`:      wall-clock source for creation stamps
//!
//! The builder and verifier never talk to a database directly.  They are
//! handed a `ChainStore`, which keeps the storage backend (hosted tables,
//! JSON files, memory) out of the chain logic.

use std::sync::Arc;

use chrono::Utc;

use nf525_contracts::{canonical::iso_timestamp, error::ChainResult, event::ChainRecord};

/// Persistence for a single chain family.
///
/// A backend serving several families implements this trait once per
/// record type.
pub trait ChainStore<R: ChainRecord>: Send + Sync {
    /// Every stored record of the family, oldest first.
    ///
    /// The order must be total and stable (creation time or insertion
    /// sequence).  The verifier trusts it and does not re-sort.
    fn load_chain(&self) -> ChainResult<Vec<R>>;

    /// The stored hash of the most recent record, or `None` for an empty
    /// family (or a head stored without a hash).
    fn head_hash(&self) -> ChainResult<Option<String>>;

    /// Append `record` only if the current head hash still equals
    /// `expected_head`.
    ///
    /// Two writers that read the same head must not both succeed: the loser
    /// receives `ChainError::AppendConflict` and nothing is written.
    fn append_if_head(&self, expected_head: Option<&str>, record: R) -> ChainResult<()>;
}

impl<R: ChainRecord, S: ChainStore<R> + ?Sized> ChainStore<R> for Arc<S> {
    fn load_chain(&self) -> ChainResult<Vec<R>> {
        (**self).load_chain()
    }

    fn head_hash(&self) -> ChainResult<Option<String>> {
        (**self).head_hash()
    }

    fn append_if_head(&self, expected_head: Option<&str>, record: R) -> ChainResult<()> {
        (**self).append_if_head(expected_head, record)
    }
}

/// Source of creation timestamps.
///
/// The returned string is hashed verbatim, so it must be exactly what gets
/// stored.
pub trait Clock: Send + Sync {
    fn now_iso(&self) -> String;
}

/// The system clock, rendered as `2024-01-15T10:00:00.000Z`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_iso(&self) -> String {
        iso_timestamp(Utc::now())
    }
}
