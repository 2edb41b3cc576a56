use crate::models::analytics::{AllocationSlice, PortfolioSummary, PortfolioTotals};
use crate::models::holding::HoldingView;
use crate::models::portfolio::Portfolio;

/// Read-only figures for the portfolio page: totals, cards, pie slices.
///
/// Nothing here is cached. Every call folds the current holdings again, so
/// what is displayed can never disagree with what is held.
pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        Self
    }

    pub fn totals(&self, portfolio: &Portfolio) -> PortfolioTotals {
        PortfolioTotals::from_holdings(&portfolio.holdings)
    }

    /// Totals across every portfolio, for the dashboard header.
    pub fn combined_totals(&self, portfolios: &[Portfolio]) -> PortfolioTotals {
        let all: Vec<_> = portfolios
            .iter()
            .flat_map(|p| p.holdings.iter().cloned())
            .collect();
        PortfolioTotals::from_holdings(&all)
    }

    /// Card data for list mode, in portfolio order.
    pub fn summaries(&self, portfolios: &[Portfolio]) -> Vec<PortfolioSummary> {
        portfolios
            .iter()
            .map(|p| PortfolioSummary {
                id: p.id.clone(),
                name: p.name.clone(),
                currency: p.currency.clone(),
                holding_count: p.holdings.len(),
                totals: self.totals(p),
                sync: p.sync.clone(),
            })
            .collect()
    }

    /// Table rows for detail mode, in display order.
    pub fn holding_rows(&self, portfolio: &Portfolio) -> Vec<HoldingView> {
        portfolio.holdings.iter().map(|h| h.view()).collect()
    }

    /// Pie chart slices, largest first. Percentages are 0 when the portfolio
    /// has no value.
    pub fn allocations(&self, portfolio: &Portfolio) -> Vec<AllocationSlice> {
        let total_value = self.totals(portfolio).total_value;
        let mut slices: Vec<AllocationSlice> = portfolio
            .holdings
            .iter()
            .map(|h| {
                let value = h.current_value();
                AllocationSlice {
                    ticker: h.ticker.clone(),
                    value,
                    allocation_pct: if total_value > 0.0 {
                        value / total_value * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        slices.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        slices
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}
