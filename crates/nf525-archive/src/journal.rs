//! The audit journal: chained entries for audited mutations.

use std::{collections::HashSet, sync::Arc};

use serde_json::Value;

use nf525_chain::ChainWriter;
use nf525_contracts::{
    error::ChainResult,
    event::{AuditEvent, SaleEvent, SaleStatus},
};
use nf525_core::traits::{ChainStore, Clock};

/// Unhashed context stored with an audit entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub vendor_id: Option<String>,
}

impl Snapshot {
    pub fn created(new_data: Value) -> Self {
        Self {
            new_data: Some(new_data),
            ..Self::default()
        }
    }
}

/// Appends audit entries stamped by a `Clock`.
pub struct AuditJournal<S> {
    writer: ChainWriter<S>,
    clock: Arc<dyn Clock>,
}

impl<S: ChainStore<AuditEvent>> AuditJournal<S> {
    pub fn new(writer: ChainWriter<S>, clock: Arc<dyn Clock>) -> Self {
        Self { writer, clock }
    }

    pub fn writer(&self) -> &ChainWriter<S> {
        &self.writer
    }

    /// Append one entry and return it sealed.
    pub fn record(
        &self,
        event_type: &str,
        table_name: &str,
        record_id: Option<&str>,
        snapshot: Snapshot,
    ) -> ChainResult<AuditEvent> {
        let mut entry = AuditEvent::new(
            self.clock.now_iso(),
            event_type,
            table_name,
            record_id.map(str::to_string),
        );
        entry.old_data = snapshot.old_data;
        entry.new_data = snapshot.new_data;
        entry.vendor_id = snapshot.vendor_id;

        self.writer.append(entry)
    }
}

/// Tickets with a `sale_cancelled` entry in the journal.
pub fn cancelled_tickets(entries: &[AuditEvent]) -> HashSet<&str> {
    entries
        .iter()
        .filter(|e| e.event_type == AuditEvent::SALE_CANCELLED && e.table_name == "sales")
        .filter_map(|e| e.record_id.as_deref())
        .collect()
}

/// Apply journaled cancellations to stored sales.
///
/// The sales chain is append-only, so a cancellation never rewrites the
/// stored row; its status is restored from the journal instead.
pub fn with_journaled_status(mut sales: Vec<SaleEvent>, entries: &[AuditEvent]) -> Vec<SaleEvent> {
    let cancelled = cancelled_tickets(entries);
    for sale in &mut sales {
        if cancelled.contains(sale.ticket_number.as_str()) {
            sale.status = SaleStatus::Cancelled;
        }
    }
    sales
}
