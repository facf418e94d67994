//! Chained event types.
//!
//! Three independent families form their own hash chains: sales, daily
//! closures and audit-log entries.  Each stored row carries the `hash`
//! computed when it was created and the `previous_hash` of the row before
//! it.  Only the canonical fields listed by `ChainRecord::canonical_fields`
//! contribute to the hash; the remaining columns are business data.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    canonical::{canonical_amount, canonical_date},
    error::ChainResult,
};

/// One of the three independent hash chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    Sales,
    Closures,
    Audit,
}

impl ChainFamily {
    /// Every family, in the order the register verifies them.
    pub const ALL: [ChainFamily; 3] = [Self::Sales, Self::Closures, Self::Audit];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sales => "sales",
            Self::Closures => "closures",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A stored row that participates in a hash chain.
///
/// Implementors only describe their canonical fields; hashing and
/// verification live in `nf525-chain`.
pub trait ChainRecord: Clone + Send + Sync + 'static {
    /// The chain this record belongs to.
    const FAMILY: ChainFamily;

    /// Canonical field strings in hash order, previous hash excluded.
    fn canonical_fields(&self) -> ChainResult<Vec<String>>;

    /// Human-facing identifier reported when this record breaks the chain.
    fn record_id(&self) -> String;

    /// The stored hash, if one was recorded.
    fn hash(&self) -> Option<&str>;

    /// The stored pointer to the previous record's hash.
    fn previous_hash(&self) -> Option<&str>;

    /// Set both chain columns.  Called exactly once, when sealing.
    fn link(&mut self, previous_hash: Option<String>, hash: String);
}

// ── Sales ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Pending,
    #[default]
    Completed,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Contactless,
    Amex,
    Check,
    GiftCard,
    Free,
}

/// One tender line of a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount: f64,
}

/// A completed sale.  Hash fields: `ticket_number | created_at | total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub id: Uuid,

    /// Unique per sale, e.g. `T-20240115-0042`.
    pub ticket_number: String,

    /// ISO-8601 creation stamp, hashed verbatim.
    pub created_at: String,

    /// Amount due after discount, tax included.
    pub total: f64,

    #[serde(default)]
    pub subtotal_ht: f64,
    #[serde(default)]
    pub total_tva: f64,
    #[serde(default)]
    pub subtotal_ttc: f64,
    #[serde(default)]
    pub discount_amount: f64,
    #[serde(default)]
    pub status: SaleStatus,
    #[serde(default)]
    pub payments: Vec<Payment>,

    pub hash: Option<String>,
    pub previous_hash: Option<String>,
}

impl SaleEvent {
    /// An unsealed, completed sale with no discount and no tender lines.
    pub fn new(ticket_number: impl Into<String>, created_at: impl Into<String>, total: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_number: ticket_number.into(),
            created_at: created_at.into(),
            total,
            subtotal_ht: 0.0,
            total_tva: 0.0,
            subtotal_ttc: total,
            discount_amount: 0.0,
            status: SaleStatus::Completed,
            payments: Vec::new(),
            hash: None,
            previous_hash: None,
        }
    }

    /// Add a tender line.
    pub fn with_payment(mut self, method: PaymentMethod, amount: f64) -> Self {
        self.payments.push(Payment { method, amount });
        self
    }
}

impl ChainRecord for SaleEvent {
    const FAMILY: ChainFamily = ChainFamily::Sales;

    fn canonical_fields(&self) -> ChainResult<Vec<String>> {
        Ok(vec![
            self.ticket_number.clone(),
            self.created_at.clone(),
            canonical_amount(self.total)?,
        ])
    }

    fn record_id(&self) -> String {
        self.ticket_number.clone()
    }

    fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    fn link(&mut self, previous_hash: Option<String>, hash: String) {
        self.previous_hash = previous_hash;
        self.hash = Some(hash);
    }
}

// ── Daily closures ────────────────────────────────────────────────────────────

/// End-of-day totals.  Hash fields: `closure_date | total_sales | total_ttc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureEvent {
    pub id: Uuid,
    pub closure_date: NaiveDate,

    /// Number of completed sales closed by this row.
    pub total_sales: u64,

    pub total_ht: f64,
    pub total_tva: f64,
    pub total_ttc: f64,
    pub total_discounts: f64,
    pub total_cash: f64,
    pub total_card: f64,
    pub total_contactless: f64,
    pub total_check: f64,
    pub total_gift_card: f64,
    pub total_refunds: f64,
    pub refund_count: u64,
    pub closed_by: Option<String>,
    pub created_at: String,

    pub hash: Option<String>,
    pub previous_hash: Option<String>,
}

impl ClosureEvent {
    /// An unsealed closure with every tender bucket at zero.
    pub fn new(
        closure_date: NaiveDate,
        total_sales: u64,
        total_ttc: f64,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            closure_date,
            total_sales,
            total_ht: 0.0,
            total_tva: 0.0,
            total_ttc,
            total_discounts: 0.0,
            total_cash: 0.0,
            total_card: 0.0,
            total_contactless: 0.0,
            total_check: 0.0,
            total_gift_card: 0.0,
            total_refunds: 0.0,
            refund_count: 0,
            closed_by: None,
            created_at: created_at.into(),
            hash: None,
            previous_hash: None,
        }
    }
}

impl ChainRecord for ClosureEvent {
    const FAMILY: ChainFamily = ChainFamily::Closures;

    fn canonical_fields(&self) -> ChainResult<Vec<String>> {
        Ok(vec![
            canonical_date(self.closure_date),
            self.total_sales.to_string(),
            canonical_amount(self.total_ttc)?,
        ])
    }

    fn record_id(&self) -> String {
        canonical_date(self.closure_date)
    }

    fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    fn link(&mut self, previous_hash: Option<String>, hash: String) {
        self.previous_hash = previous_hash;
        self.hash = Some(hash);
    }
}

// ── Audit log ─────────────────────────────────────────────────────────────────

/// An audited mutation.
/// Hash fields: `timestamp | event_type | table_name | record_id`.
///
/// `old_data`, `new_data` and `vendor_id` are stored alongside but are not
/// covered by the hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: String,
    pub event_type: String,
    pub table_name: String,
    pub record_id: Option<String>,
    #[serde(default)]
    pub old_data: Option<Value>,
    #[serde(default)]
    pub new_data: Option<Value>,
    #[serde(default)]
    pub vendor_id: Option<String>,

    pub hash: Option<String>,
    pub previous_hash: Option<String>,
}

impl AuditEvent {
    pub const SALE_CREATED: &'static str = "sale_created";
    pub const SALE_CANCELLED: &'static str = "sale_cancelled";
    pub const DAILY_CLOSURE_CREATED: &'static str = "daily_closure_created";

    /// An unsealed entry with no data snapshots.
    pub fn new(
        timestamp: impl Into<String>,
        event_type: impl Into<String>,
        table_name: impl Into<String>,
        record_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: timestamp.into(),
            event_type: event_type.into(),
            table_name: table_name.into(),
            record_id,
            old_data: None,
            new_data: None,
            vendor_id: None,
            hash: None,
            previous_hash: None,
        }
    }
}

impl ChainRecord for AuditEvent {
    const FAMILY: ChainFamily = ChainFamily::Audit;

    fn canonical_fields(&self) -> ChainResult<Vec<String>> {
        Ok(vec![
            self.timestamp.clone(),
            self.event_type.clone(),
            self.table_name.clone(),
            self.record_id.clone().unwrap_or_default(),
        ])
    }

    fn record_id(&self) -> String {
        self.id.to_string()
    }

    fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    fn link(&mut self, previous_hash: Option<String>, hash: String) {
        self.previous_hash = previous_hash;
        self.hash = Some(hash);
    }
}
