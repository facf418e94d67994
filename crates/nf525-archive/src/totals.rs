//! Perpetual grand total ("GT").
//!
//! The grand total is the cumulative tax-inclusive turnover since the
//! register opened: everything already sealed in a daily closure, plus the
//! completed sales of days that have not been closed yet.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use nf525_contracts::event::{ClosureEvent, SaleEvent, SaleStatus};

use crate::closure::sale_day;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrandTotal {
    /// Sum of `total_ttc` over every closure.
    pub closed_ttc: f64,
    pub closures: usize,
    /// Sum of `subtotal_ttc` over completed sales on unclosed days.
    pub open_ttc: f64,
    pub open_sales: usize,
}

impl GrandTotal {
    pub fn perpetual(&self) -> f64 {
        self.closed_ttc + self.open_ttc
    }
}

/// Sales with an unreadable `created_at` cannot belong to a closed day and
/// are counted as open.
pub fn grand_total(closures: &[ClosureEvent], sales: &[SaleEvent]) -> GrandTotal {
    let closed_days: HashSet<_> = closures.iter().map(|c| c.closure_date).collect();

    let mut total = GrandTotal {
        closed_ttc: closures.iter().map(|c| c.total_ttc).sum(),
        closures: closures.len(),
        ..GrandTotal::default()
    };

    for sale in sales.iter().filter(|s| s.status == SaleStatus::Completed) {
        let closed = match sale_day(sale) {
            Ok(day) => closed_days.contains(&day),
            Err(err) => {
                warn!(error = %err, "sale counted as open");
                false
            }
        };
        if !closed {
            total.open_ttc += sale.subtotal_ttc;
            total.open_sales += 1;
        }
    }

    total
}
