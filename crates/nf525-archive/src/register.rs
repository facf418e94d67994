//! The fiscal register: one object owning the three chains.
//!
//! Every business action that must be tamper-evident goes through here:
//!
//! 1. `record_sale`   → sales chain, then a `sale_created` audit entry
//! 2. `record_cancellation` → `sale_cancelled` audit entry
//! 3. `close_day`     → closures chain, then a `daily_closure_created` entry
//!
//! Each append reads the family head and inserts conditionally on it (see
//! `ChainWriter`), so the "last hash" is never held as shared state.  The
//! uniqueness rules (one sale per ticket, one closure per day) are checked
//! against the same snapshot the record is sealed onto.
//!
//! The business record is committed before its audit entry.  If the entry
//! cannot be written the caller gets `JournalFailed`, naming the record that
//! is already stored.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use nf525_chain::{ChainWriter, InMemoryChainStore, JsonFileStore};
use nf525_contracts::{
    canonical::canonical_date,
    error::{ChainError, ChainResult},
    event::{AuditEvent, ChainFamily, ClosureEvent, SaleEvent},
    report::IntegrityReport,
};
use nf525_core::traits::{ChainStore, Clock, SystemClock};

use crate::{
    closure::aggregate_day,
    config::{ArchiveConfig, VerificationConfig},
    journal::{cancelled_tickets, with_journaled_status, AuditJournal, Snapshot},
    totals::{grand_total, GrandTotal},
};

pub type SaleStore = Arc<dyn ChainStore<SaleEvent>>;
pub type ClosureStore = Arc<dyn ChainStore<ClosureEvent>>;
pub type AuditStore = Arc<dyn ChainStore<AuditEvent>>;

pub struct FiscalRegister {
    sales: ChainWriter<SaleStore>,
    closures: ChainWriter<ClosureStore>,
    journal: AuditJournal<AuditStore>,
    clock: Arc<dyn Clock>,
    verification: VerificationConfig,
}

impl FiscalRegister {
    pub fn new(
        sales: SaleStore,
        closures: ClosureStore,
        audit: AuditStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sales: ChainWriter::new(sales),
            closures: ChainWriter::new(closures),
            journal: AuditJournal::new(ChainWriter::new(audit), Arc::clone(&clock)),
            clock,
            verification: VerificationConfig::default(),
        }
    }

    /// A register with no persistence, for demos and tests.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(InMemoryChainStore::<SaleEvent>::new()),
            Arc::new(InMemoryChainStore::<ClosureEvent>::new()),
            Arc::new(InMemoryChainStore::<AuditEvent>::new()),
            clock,
        )
    }

    /// A register backed by one JSON file per family, stamped by the system
    /// clock.
    pub fn from_config(config: &ArchiveConfig) -> Self {
        let store = &config.store;
        let max_attempts = config.append.max_attempts;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let sales: SaleStore = Arc::new(JsonFileStore::<SaleEvent>::new(store.sales_path()));
        let closures: ClosureStore =
            Arc::new(JsonFileStore::<ClosureEvent>::new(store.closures_path()));
        let audit: AuditStore = Arc::new(JsonFileStore::<AuditEvent>::new(store.audit_path()));

        Self {
            sales: ChainWriter::new(sales).with_max_attempts(max_attempts),
            closures: ChainWriter::new(closures).with_max_attempts(max_attempts),
            journal: AuditJournal::new(
                ChainWriter::new(audit).with_max_attempts(max_attempts),
                Arc::clone(&clock),
            ),
            clock,
            verification: config.verification.clone(),
        }
    }

    pub fn with_verification(mut self, verification: VerificationConfig) -> Self {
        self.verification = verification;
        self
    }

    pub fn sales_store(&self) -> &SaleStore {
        self.sales.store()
    }

    pub fn closures_store(&self) -> &ClosureStore {
        self.closures.store()
    }

    pub fn audit_store(&self) -> &AuditStore {
        self.journal.writer().store()
    }

    /// Finalize a sale: stamp `created_at` from the register clock, seal it
    /// onto the sales chain and journal it.
    ///
    /// Any `created_at`, `hash` or `previous_hash` already set on `sale` is
    /// replaced.  A ticket number already on the chain is a
    /// `ContractViolation`, which also makes resubmitting a sale after
    /// `JournalFailed` harmless.
    pub fn record_sale(&self, mut sale: SaleEvent) -> ChainResult<SaleEvent> {
        sale.created_at = self.clock.now_iso();
        let ticket = sale.ticket_number.clone();
        let sale = self.sales.append_guarded(sale, |chain| {
            if chain.iter().any(|s| s.ticket_number == ticket) {
                return Err(ChainError::contract(format!(
                    "ticket '{}' is already on the sales chain",
                    ticket
                )));
            }
            Ok(())
        })?;

        self.journal_committed(
            ChainFamily::Sales,
            &sale.ticket_number,
            AuditEvent::SALE_CREATED,
            "sales",
            &sale,
        )?;
        Ok(sale)
    }

    /// Journal the cancellation of a sale.
    ///
    /// The sales chain is untouched: status is not a hashed column.  Closures
    /// and the grand total read the cancellation back from the journal.
    pub fn record_cancellation(&self, ticket_number: &str, reason: &str) -> ChainResult<AuditEvent> {
        let sales: Vec<SaleEvent> = self.sales.store().load_chain()?;
        if !sales.iter().any(|s| s.ticket_number == ticket_number) {
            return Err(ChainError::contract(format!(
                "no sale with ticket '{}' to cancel",
                ticket_number
            )));
        }
        let entries: Vec<AuditEvent> = self.audit_store().load_chain()?;
        if cancelled_tickets(&entries).contains(ticket_number) {
            return Err(ChainError::contract(format!(
                "sale '{}' is already cancelled",
                ticket_number
            )));
        }

        info!(ticket_number, reason, "sale cancelled");
        self.journal.record(
            AuditEvent::SALE_CANCELLED,
            "sales",
            Some(ticket_number),
            Snapshot::created(json!({ "status": "cancelled", "notes": reason })),
        )
    }

    /// Close `date`: aggregate its completed sales into a sealed closure.
    ///
    /// Fails with `AlreadyClosed` if `date` already has a closure, including
    /// one appended by a concurrent caller while this one was aggregating.
    pub fn close_day(&self, date: NaiveDate, closed_by: Option<String>) -> ChainResult<ClosureEvent> {
        let totals = aggregate_day(&self.effective_sales()?, date);
        let closure = self.closures.append_guarded(
            totals.into_closure(date, self.clock.now_iso(), closed_by),
            |chain| {
                if chain.iter().any(|c| c.closure_date == date) {
                    warn!(date = %date, "refusing second closure for the same day");
                    return Err(ChainError::AlreadyClosed {
                        date: canonical_date(date),
                    });
                }
                Ok(())
            },
        )?;

        info!(
            date = %date,
            total_sales = closure.total_sales,
            total_ttc = closure.total_ttc,
            "day closed"
        );

        self.journal_committed(
            ChainFamily::Closures,
            &canonical_date(date),
            AuditEvent::DAILY_CLOSURE_CREATED,
            "daily_closures",
            &closure,
        )?;
        Ok(closure)
    }

    pub fn grand_total(&self) -> ChainResult<GrandTotal> {
        let closures: Vec<ClosureEvent> = self.closures.store().load_chain()?;
        Ok(grand_total(&closures, &self.effective_sales()?))
    }

    /// Stored sales with journaled cancellations applied.
    fn effective_sales(&self) -> ChainResult<Vec<SaleEvent>> {
        let sales: Vec<SaleEvent> = self.sales.store().load_chain()?;
        let entries: Vec<AuditEvent> = self.audit_store().load_chain()?;
        Ok(with_journaled_status(sales, &entries))
    }

    /// Journal a record that is already committed to `family`.
    fn journal_committed<T: Serialize>(
        &self,
        family: ChainFamily,
        record_id: &str,
        event_type: &str,
        table_name: &str,
        record: &T,
    ) -> ChainResult<()> {
        let result = serde_json::to_value(record)
            .map_err(|e| ChainError::contract(format!("record is not serializable: {}", e)))
            .and_then(|snapshot| {
                self.journal.record(
                    event_type,
                    table_name,
                    Some(record_id),
                    Snapshot::created(snapshot),
                )
            });

        result.map(|_| ()).map_err(|err| {
            error!(family = %family, record_id, error = %err, "committed record left unjournaled");
            ChainError::JournalFailed {
                family,
                record_id: record_id.to_string(),
                reason: err.to_string(),
            }
        })
    }

    /// Verify one family.  A broken chain is `Ok` with `valid == false`.
    pub fn verify(&self, family: ChainFamily) -> ChainResult<IntegrityReport> {
        let control = self.verification.scan_control();
        match family {
            ChainFamily::Sales => self.sales.verify::<SaleEvent>(&control),
            ChainFamily::Closures => self.closures.verify::<ClosureEvent>(&control),
            ChainFamily::Audit => self.journal.writer().verify::<AuditEvent>(&control),
        }
    }

    /// Verify every family; stops at the first infrastructure error.
    pub fn verify_all(&self) -> ChainResult<Vec<IntegrityReport>> {
        ChainFamily::ALL
            .iter()
            .map(|family| self.verify(*family))
            .collect()
    }
}
