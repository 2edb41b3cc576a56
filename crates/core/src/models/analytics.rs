use serde::{Deserialize, Serialize};

use super::holding::Holding;
use super::portfolio::SyncStatus;

/// Portfolio-level figures folded out of the holdings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioTotals {
    /// Σ holding.current_value
    pub total_value: f64,

    /// Σ holding.invested_value
    pub total_invested: f64,

    /// total_value − total_invested
    pub total_gain: f64,

    /// total_gain / total_invested × 100, or 0 when nothing is invested
    pub return_pct: f64,
}

impl PortfolioTotals {
    /// Fold holdings into totals. An empty slice yields all zeros.
    pub fn from_holdings(holdings: &[Holding]) -> Self {
        let (total_value, total_invested) = holdings.iter().fold((0.0, 0.0), |(value, invested), h| {
            (value + h.current_value(), invested + h.invested_value())
        });
        let total_gain = total_value - total_invested;
        let return_pct = if total_invested > 0.0 {
            total_gain / total_invested * 100.0
        } else {
            0.0
        };
        Self {
            total_value,
            total_invested,
            total_gain,
            return_pct,
        }
    }
}

/// One slice of the allocation pie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSlice {
    pub ticker: String,

    /// Current value of the holding
    pub value: f64,

    /// value / portfolio total_value × 100
    pub allocation_pct: f64,
}

/// Summary card shown for each portfolio in list mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub holding_count: usize,
    pub totals: PortfolioTotals,
    pub sync: SyncStatus,
}
