//! # nf525-archive
//!
//! The fiscal register built on the NF525 hash chains.
//!
//! ## Overview
//!
//! This crate provides [`FiscalRegister`], which owns the sales, closures
//! and audit chains and exposes the business actions that feed them:
//! recording a sale, journaling a cancellation, closing a day.  It also
//! computes the perpetual grand total and loads its storage layout from a
//! TOML file.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use nf525_archive::{ArchiveConfig, FiscalRegister};
//! use nf525_contracts::ChainFamily;
//!
//! let config = ArchiveConfig::from_file(Path::new("nf525.toml"))?;
//! let register = FiscalRegister::from_config(&config);
//! let report = register.verify(ChainFamily::Sales)?;
//! if !report.valid {
//!     // integrity alert
//! }
//! ```

pub mod closure;
pub mod config;
pub mod journal;
pub mod register;
pub mod totals;

pub use closure::{aggregate_day, sale_day, DailyTotals};
pub use config::{AppendConfig, ArchiveConfig, StoreConfig, VerificationConfig};
pub use journal::{cancelled_tickets, with_journaled_status, AuditJournal, Snapshot};
pub use register::FiscalRegister;
pub use totals::{grand_total, GrandTotal};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicU32, Ordering},
            Arc, Barrier,
        },
        thread,
        time::Duration,
    };

    use chrono::NaiveDate;

    use nf525_chain::InMemoryChainStore;
    use nf525_contracts::{
        error::{ChainError, ChainResult},
        event::{AuditEvent, ChainFamily, ClosureEvent, PaymentMethod, SaleEvent, SaleStatus},
        report::BreakKind,
    };
    use nf525_core::traits::{ChainStore, Clock};

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// A clock that advances one second per call, starting 2024-01-15 10:00.
    #[derive(Default)]
    struct StepClock {
        tick: AtomicU32,
    }

    impl Clock for StepClock {
        fn now_iso(&self) -> String {
            let n = self.tick.fetch_add(1, Ordering::SeqCst);
            format!("2024-01-15T10:{:02}:{:02}.000Z", n / 60, n % 60)
        }
    }

    /// A `StepClock` that sleeps before answering, widening the window
    /// between reading a chain and appending to it.
    #[derive(Default)]
    struct SlowClock {
        inner: StepClock,
    }

    impl Clock for SlowClock {
        fn now_iso(&self) -> String {
            thread::sleep(Duration::from_millis(30));
            self.inner.now_iso()
        }
    }

    /// An audit store that is always down.
    struct UnreachableAudit;

    impl ChainStore<AuditEvent> for UnreachableAudit {
        fn load_chain(&self) -> ChainResult<Vec<AuditEvent>> {
            Err(ChainError::storage("audit database unreachable"))
        }

        fn head_hash(&self) -> ChainResult<Option<String>> {
            Err(ChainError::storage("audit database unreachable"))
        }

        fn append_if_head(&self, _: Option<&str>, _: AuditEvent) -> ChainResult<()> {
            Err(ChainError::storage("audit database unreachable"))
        }
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn register() -> FiscalRegister {
        FiscalRegister::in_memory(Arc::new(StepClock::default()))
    }

    fn cash_sale(ticket: &str, total: f64) -> SaleEvent {
        SaleEvent::new(ticket, "", total).with_payment(PaymentMethod::Cash, total)
    }

    fn stored_sales(register: &FiscalRegister) -> Vec<SaleEvent> {
        register.sales_store().load_chain().unwrap()
    }

    fn stored_audit(register: &FiscalRegister) -> Vec<AuditEvent> {
        register.audit_store().load_chain().unwrap()
    }

    // ── 1. configuration ─────────────────────────────────────────────────────

    #[test]
    fn empty_config_uses_defaults() {
        let config = ArchiveConfig::from_toml_str("").unwrap();
        assert_eq!(config, ArchiveConfig::default());
        assert_eq!(config.append.max_attempts, 3);
        assert!(config.store.sales_path().ends_with("sales.json"));
        assert_eq!(config.verification.timeout_ms, None);
    }

    #[test]
    fn config_sections_override_defaults() {
        let config = ArchiveConfig::from_toml_str(
            r#"
            [store]
            data_dir = "/srv/caisse"
            audit_file = "journal.json"

            [append]
            max_attempts = 5

            [verification]
            timeout_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(
            config.store.audit_path(),
            std::path::Path::new("/srv/caisse/journal.json")
        );
        assert_eq!(config.store.closures_file, "closures.json");
        assert_eq!(config.append.max_attempts, 5);
        assert_eq!(config.verification.timeout_ms, Some(250));
    }

    #[test]
    fn malformed_config_is_config_error() {
        let err = ArchiveConfig::from_toml_str("[store\ndata_dir = 1").unwrap_err();
        assert!(matches!(err, ChainError::ConfigError { .. }));
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let err = ArchiveConfig::from_toml_str("[append]\nmax_attempts = 0").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn shared_store_file_is_rejected() {
        let err = ArchiveConfig::from_toml_str("[store]\naudit_file = \"sales.json\"").unwrap_err();
        assert!(matches!(err, ChainError::ConfigError { .. }));
    }

    #[test]
    fn missing_config_file_is_config_error() {
        let err = ArchiveConfig::from_file(std::path::Path::new("/nonexistent/nf525.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    // ── 2. daily aggregation ─────────────────────────────────────────────────

    #[test]
    fn sale_day_is_the_utc_calendar_day() {
        let east = SaleEvent::new("T-1", "2024-01-15T23:30:00+02:00", 1.0);
        let west = SaleEvent::new("T-2", "2024-01-15T23:30:00-02:00", 1.0);
        assert_eq!(sale_day(&east).unwrap(), jan(15));
        assert_eq!(sale_day(&west).unwrap(), jan(16));
    }

    #[test]
    fn unreadable_created_at_is_contract_violation() {
        let sale = SaleEvent::new("T-1", "yesterday", 1.0);
        let err = sale_day(&sale).unwrap_err();
        assert!(matches!(err, ChainError::ContractViolation { .. }));
    }

    #[test]
    fn aggregate_counts_only_completed_sales_of_the_day() {
        let mut first = SaleEvent::new("T-1", "2024-01-15T09:00:00.000Z", 24.0)
            .with_payment(PaymentMethod::Cash, 4.0)
            .with_payment(PaymentMethod::Card, 20.0);
        first.subtotal_ht = 20.0;
        first.total_tva = 4.0;

        let mut second = SaleEvent::new("T-2", "2024-01-15T11:00:00.000Z", 12.0)
            .with_payment(PaymentMethod::GiftCard, 10.0)
            .with_payment(PaymentMethod::Amex, 2.0);
        second.discount_amount = 1.5;

        let mut cancelled = SaleEvent::new("T-3", "2024-01-15T12:00:00.000Z", 99.0)
            .with_payment(PaymentMethod::Cash, 99.0);
        cancelled.status = SaleStatus::Cancelled;

        let next_day = SaleEvent::new("T-4", "2024-01-16T08:00:00.000Z", 50.0)
            .with_payment(PaymentMethod::Cash, 50.0);

        let totals = aggregate_day(&[first, second, cancelled, next_day], jan(15));

        assert_eq!(totals.sales_count, 2);
        assert_eq!(totals.total_ttc, 36.0);
        assert_eq!(totals.total_ht, 20.0);
        assert_eq!(totals.total_tva, 4.0);
        assert_eq!(totals.total_discounts, 1.5);
        assert_eq!(totals.total_cash, 4.0);
        assert_eq!(totals.total_card, 20.0);
        assert_eq!(totals.total_gift_card, 10.0);
        assert_eq!(totals.total_contactless, 0.0);
    }

    #[test]
    fn unreadable_sale_does_not_block_aggregation() {
        let good = SaleEvent::new("T-1", "2024-01-15T09:00:00.000Z", 10.0)
            .with_payment(PaymentMethod::Cash, 10.0);
        let garbled = SaleEvent::new("T-2", "not a timestamp", 99.0);

        let totals = aggregate_day(&[garbled.clone(), good], jan(15));
        assert_eq!(totals.sales_count, 1);
        assert_eq!(totals.total_ttc, 10.0);

        let total = grand_total(&[], &[garbled]);
        assert_eq!(total.open_sales, 1);
        assert_eq!(total.open_ttc, 99.0);
    }

    #[test]
    fn totals_become_an_unsealed_closure() {
        let totals = DailyTotals {
            sales_count: 2,
            total_ttc: 36.0,
            total_cash: 16.0,
            ..DailyTotals::default()
        };
        let closure = totals.into_closure(jan(15), "ts".to_string(), Some("vendor-1".to_string()));
        assert_eq!(closure.total_sales, 2);
        assert_eq!(closure.total_ttc, 36.0);
        assert_eq!(closure.total_cash, 16.0);
        assert_eq!(closure.total_refunds, 0.0);
        assert_eq!(closure.closed_by.as_deref(), Some("vendor-1"));
        assert!(closure.hash.is_none());
    }

    // ── 3. register: sales and audit journal ─────────────────────────────────

    #[test]
    fn recorded_sales_are_chained_and_journaled() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.00)).unwrap();
        register.record_sale(cash_sale("T-002", 30.00)).unwrap();
        let third = register.record_sale(cash_sale("T-003", 45.50)).unwrap();

        assert!(third.created_at.starts_with("2024-01-15T10:"));

        let sales = stored_sales(&register);
        assert_eq!(sales.len(), 3);
        assert_eq!(sales[0].previous_hash, None);
        assert_eq!(sales[2].previous_hash, sales[1].hash);

        let audit = stored_audit(&register);
        assert_eq!(audit.len(), 3);
        assert!(audit.iter().all(|e| e.event_type == AuditEvent::SALE_CREATED));
        assert_eq!(audit[1].record_id.as_deref(), Some("T-002"));
        assert_eq!(audit[1].new_data.as_ref().unwrap()["ticket_number"], "T-002");

        for report in register.verify_all().unwrap() {
            assert!(report.valid, "{} chain must be valid", report.family);
        }
    }

    #[test]
    fn cancellation_is_journaled_without_touching_sales() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();
        let before = stored_sales(&register);

        let entry = register.record_cancellation("T-001", "customer changed mind").unwrap();
        assert_eq!(entry.event_type, AuditEvent::SALE_CANCELLED);
        assert_eq!(entry.new_data.as_ref().unwrap()["status"], "cancelled");

        assert_eq!(stored_sales(&register), before);
        assert!(register.verify(ChainFamily::Audit).unwrap().valid);
    }

    #[test]
    fn duplicate_ticket_is_rejected() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();

        let err = register.record_sale(cash_sale("T-001", 35.0)).unwrap_err();
        assert!(matches!(err, ChainError::ContractViolation { .. }));
        assert_eq!(stored_sales(&register).len(), 1);
        assert_eq!(stored_audit(&register).len(), 1);
    }

    #[test]
    fn unjournaled_sale_is_reported_as_committed() {
        let register = FiscalRegister::new(
            Arc::new(InMemoryChainStore::<SaleEvent>::new()),
            Arc::new(InMemoryChainStore::<ClosureEvent>::new()),
            Arc::new(UnreachableAudit),
            Arc::new(StepClock::default()),
        );

        let err = register.record_sale(cash_sale("T-001", 20.0)).unwrap_err();
        match err {
            ChainError::JournalFailed {
                family, record_id, ..
            } => {
                assert_eq!(family, ChainFamily::Sales);
                assert_eq!(record_id, "T-001");
            }
            other => panic!("expected JournalFailed, got {other:?}"),
        }
        assert_eq!(stored_sales(&register).len(), 1);

        // Resubmitting the same ticket does not seal a second sale.
        let retry = register.record_sale(cash_sale("T-001", 20.0)).unwrap_err();
        assert!(matches!(retry, ChainError::ContractViolation { .. }));
        assert_eq!(stored_sales(&register).len(), 1);
    }

    #[test]
    fn cancelled_sale_is_left_out_of_closure_and_grand_total() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();
        register.record_sale(cash_sale("T-002", 30.0)).unwrap();
        register.record_cancellation("T-001", "refused by customer").unwrap();

        let open = register.grand_total().unwrap();
        assert_eq!(open.open_sales, 1);
        assert_eq!(open.open_ttc, 30.0);

        let closure = register.close_day(jan(15), None).unwrap();
        assert_eq!(closure.total_sales, 1);
        assert_eq!(closure.total_ttc, 30.0);
        assert_eq!(closure.total_cash, 30.0);
    }

    #[test]
    fn only_cancelled_sale_closes_an_empty_day() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();
        register.record_cancellation("T-001", "void").unwrap();

        let closure = register.close_day(jan(15), None).unwrap();
        assert_eq!(closure.total_sales, 0);
        assert_eq!(closure.total_ttc, 0.0);
    }

    #[test]
    fn cancelling_twice_is_rejected() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();
        register.record_cancellation("T-001", "void").unwrap();

        let err = register.record_cancellation("T-001", "void again").unwrap_err();
        assert!(matches!(err, ChainError::ContractViolation { .. }));
        assert_eq!(stored_audit(&register).len(), 2);
    }

    #[test]
    fn cancelling_unknown_ticket_is_rejected() {
        let register = register();
        let err = register.record_cancellation("T-404", "typo").unwrap_err();
        assert!(matches!(err, ChainError::ContractViolation { .. }));
        assert!(stored_audit(&register).is_empty());
    }

    /// T-001..T-003 with totals 20.00 / 30.00 / 45.50; T-002 rewritten to
    /// 35.00 in storage is reported at index 1.
    #[test]
    fn tampered_sale_total_is_reported() {
        let register = register();
        for (ticket, total) in [("T-001", 20.00), ("T-002", 30.00), ("T-003", 45.50)] {
            register.record_sale(cash_sale(ticket, total)).unwrap();
        }

        let mut rows = stored_sales(&register);
        rows[1].total = 35.00;

        let tampered = FiscalRegister::new(
            Arc::new(InMemoryChainStore::with_records(rows)),
            Arc::new(InMemoryChainStore::<ClosureEvent>::new()),
            Arc::new(InMemoryChainStore::<AuditEvent>::new()),
            Arc::new(StepClock::default()),
        );
        let report = tampered.verify(ChainFamily::Sales).unwrap();

        assert!(!report.valid);
        assert_eq!(report.first_broken_index, Some(1));
        assert_eq!(report.first_broken_id.as_deref(), Some("T-002"));
        assert_eq!(report.break_kind, Some(BreakKind::HashMismatch));
    }

    // ── 4. register: closures and grand total ────────────────────────────────

    #[test]
    fn close_day_seals_the_days_totals() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();
        register
            .record_sale(SaleEvent::new("T-002", "", 30.0).with_payment(PaymentMethod::Card, 30.0))
            .unwrap();

        let closure = register.close_day(jan(15), Some("manager".to_string())).unwrap();
        assert_eq!(closure.total_sales, 2);
        assert_eq!(closure.total_ttc, 50.0);
        assert_eq!(closure.total_cash, 20.0);
        assert_eq!(closure.total_card, 30.0);
        assert!(closure.hash.is_some());
        assert_eq!(closure.previous_hash, None);

        let audit = stored_audit(&register);
        let last = audit.last().unwrap();
        assert_eq!(last.event_type, AuditEvent::DAILY_CLOSURE_CREATED);
        assert_eq!(last.table_name, "daily_closures");
        assert_eq!(last.record_id.as_deref(), Some("2024-01-15"));

        assert!(register.verify(ChainFamily::Closures).unwrap().valid);
    }

    #[test]
    fn closing_a_day_twice_is_refused() {
        let register = register();
        let first = register.close_day(jan(14), None).unwrap();
        assert_eq!(first.total_sales, 0);

        let err = register.close_day(jan(14), None).unwrap_err();
        assert!(matches!(err, ChainError::AlreadyClosed { ref date } if date == "2024-01-14"));

        let second = register.close_day(jan(15), None).unwrap();
        assert_eq!(second.previous_hash, first.hash);
    }

    #[test]
    fn concurrent_closures_of_one_day_store_one() {
        let register = FiscalRegister::in_memory(Arc::new(SlowClock::default()));
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();

        let barrier = Barrier::new(2);
        let close = || {
            barrier.wait();
            register.close_day(jan(15), None)
        };
        let results = thread::scope(|scope| {
            let first = scope.spawn(&close);
            let second = scope.spawn(&close);
            vec![first.join().unwrap(), second.join().unwrap()]
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(ChainError::AlreadyClosed { .. }))));

        let closures: Vec<ClosureEvent> = register.closures_store().load_chain().unwrap();
        assert_eq!(closures.len(), 1);
        assert!(register.verify(ChainFamily::Closures).unwrap().valid);
    }

    #[test]
    fn grand_total_spans_closed_and_open_days() {
        let register = register();
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();
        register.record_sale(cash_sale("T-002", 30.0)).unwrap();

        let open = register.grand_total().unwrap();
        assert_eq!(open.open_sales, 2);
        assert_eq!(open.closures, 0);
        assert_eq!(open.perpetual(), 50.0);

        register.close_day(jan(15), None).unwrap();
        let closed = register.grand_total().unwrap();
        assert_eq!(closed.closures, 1);
        assert_eq!(closed.closed_ttc, 50.0);
        assert_eq!(closed.open_sales, 0);
        assert_eq!(closed.perpetual(), 50.0);
    }

    // ── 5. verification limits and file-backed registers ─────────────────────

    #[test]
    fn zero_timeout_interrupts_verification() {
        let register = register().with_verification(VerificationConfig {
            timeout_ms: Some(0),
        });
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();

        let err = register.verify(ChainFamily::Sales).unwrap_err();
        assert!(matches!(err, ChainError::ScanInterrupted { .. }));
    }

    #[test]
    fn file_backed_register_persists_chains() {
        let dir = std::env::temp_dir().join(format!("nf525-archive-{}", uuid::Uuid::new_v4()));
        let config = ArchiveConfig {
            store: StoreConfig {
                data_dir: dir.clone(),
                ..StoreConfig::default()
            },
            ..ArchiveConfig::default()
        };

        let register = FiscalRegister::from_config(&config);
        register.record_sale(cash_sale("T-001", 20.0)).unwrap();
        register.record_sale(cash_sale("T-002", 12.5)).unwrap();
        drop(register);

        let reopened = FiscalRegister::from_config(&config);
        let report = reopened.verify(ChainFamily::Sales).unwrap();
        assert!(report.valid);
        assert_eq!(report.total_checked, 2);
        assert_eq!(reopened.verify(ChainFamily::Audit).unwrap().total_checked, 2);
        assert!(config.store.sales_path().exists());

        let _ = std::fs::remove_dir_all(dir);
    }
}
