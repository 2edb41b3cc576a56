use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::analytics::PortfolioTotals;
use super::holding::Holding;

/// Whether the local copy of a portfolio matches what the backend holds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Local state equals the last confirmed backend state (or there is no backend).
    #[default]
    Synced,
    /// A local change was applied and is waiting for backend confirmation.
    Pending,
    /// The backend rejected or never received a local change.
    Unsynced { reason: String },
}

/// A named collection of holdings.
///
/// Totals are not stored here. Call [`Portfolio::totals`] to fold them out of
/// the holdings every time they are needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Opaque identifier (backend id in connected mode, UUID offline)
    pub id: String,

    /// Display name chosen by the user
    pub name: String,

    /// Currency all prices are quoted in (e.g., "INR")
    pub currency: String,

    /// Holdings in insertion / display order. One entry per ticker.
    pub holdings: Vec<Holding>,

    /// Backend sync state of this portfolio
    #[serde(default)]
    pub sync: SyncStatus,
}

impl Portfolio {
    /// Create an empty portfolio with a freshly generated local id.
    pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, currency)
    }

    /// Create an empty portfolio with a known id (e.g., assigned by the backend).
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            currency: currency.into().to_uppercase(),
            holdings: Vec::new(),
            sync: SyncStatus::Synced,
        }
    }

    /// Look up a holding by ticker (case-insensitive).
    pub fn holding(&self, ticker: &str) -> Option<&Holding> {
        let upper = ticker.trim().to_uppercase();
        self.holdings.iter().find(|h| h.ticker == upper)
    }

    pub fn holding_mut(&mut self, ticker: &str) -> Option<&mut Holding> {
        let upper = ticker.trim().to_uppercase();
        self.holdings.iter_mut().find(|h| h.ticker == upper)
    }

    pub fn totals(&self) -> PortfolioTotals {
        PortfolioTotals::from_holdings(&self.holdings)
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}
