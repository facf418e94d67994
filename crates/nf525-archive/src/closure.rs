//! Daily closure aggregation.
//!
//! A closure sums the day's completed sales.  Sales are bucketed by the UTC
//! calendar day of their `created_at` stamp.  Cancelled, pending and
//! refunded sales stay in the sales chain but are not counted.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use nf525_contracts::{
    error::{ChainError, ChainResult},
    event::{ClosureEvent, PaymentMethod, SaleEvent, SaleStatus},
};

/// The UTC calendar day a sale belongs to.
///
/// Returns `ContractViolation` if `created_at` is not RFC 3339.
pub fn sale_day(sale: &SaleEvent) -> ChainResult<NaiveDate> {
    DateTime::parse_from_rfc3339(&sale.created_at)
        .map(|at| at.with_timezone(&Utc).date_naive())
        .map_err(|e| {
            ChainError::contract(format!(
                "sale '{}' has an unreadable created_at '{}': {}",
                sale.ticket_number, sale.created_at, e
            ))
        })
}

/// Sums over the completed sales of one day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyTotals {
    pub sales_count: u64,
    pub total_ht: f64,
    pub total_tva: f64,
    pub total_ttc: f64,
    pub total_discounts: f64,
    pub total_cash: f64,
    pub total_card: f64,
    pub total_contactless: f64,
    pub total_check: f64,
    pub total_gift_card: f64,
}

impl DailyTotals {
    fn add_sale(&mut self, sale: &SaleEvent) {
        self.sales_count += 1;
        self.total_ht += sale.subtotal_ht;
        self.total_tva += sale.total_tva;
        self.total_ttc += sale.subtotal_ttc;
        self.total_discounts += sale.discount_amount;

        for payment in &sale.payments {
            let bucket = match payment.method {
                PaymentMethod::Cash => &mut self.total_cash,
                PaymentMethod::Card => &mut self.total_card,
                PaymentMethod::Contactless => &mut self.total_contactless,
                PaymentMethod::Check => &mut self.total_check,
                PaymentMethod::GiftCard => &mut self.total_gift_card,
                // No dedicated closure column.
                PaymentMethod::Amex | PaymentMethod::Free => continue,
            };
            *bucket += payment.amount;
        }
    }

    /// Turn the totals into an unsealed closure row.  Refund columns are
    /// zero: refunds are not tracked by the register.
    pub fn into_closure(
        self,
        closure_date: NaiveDate,
        created_at: String,
        closed_by: Option<String>,
    ) -> ClosureEvent {
        let mut closure = ClosureEvent::new(closure_date, self.sales_count, self.total_ttc, created_at);
        closure.total_ht = self.total_ht;
        closure.total_tva = self.total_tva;
        closure.total_discounts = self.total_discounts;
        closure.total_cash = self.total_cash;
        closure.total_card = self.total_card;
        closure.total_contactless = self.total_contactless;
        closure.total_check = self.total_check;
        closure.total_gift_card = self.total_gift_card;
        closure.closed_by = closed_by;
        closure
    }
}

/// Aggregate the completed sales of `date`.
///
/// A sale whose `created_at` cannot be read belongs to no day: it is logged
/// and left out rather than blocking every later closure.
pub fn aggregate_day(sales: &[SaleEvent], date: NaiveDate) -> DailyTotals {
    let mut totals = DailyTotals::default();
    for sale in sales {
        if sale.status != SaleStatus::Completed {
            continue;
        }
        match sale_day(sale) {
            Ok(day) if day == date => totals.add_sale(sale),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "sale skipped by daily aggregation"),
        }
    }
    totals
}
