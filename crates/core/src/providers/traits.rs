use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::CoreError;
use crate::models::market::SymbolInfo;
use crate::models::price::{PricePoint, Quote};

use super::dto::{HoldingCreate, HoldingRecord, HoldingUpdate, PerformanceResponse, PortfolioRecord};

/// Source of market prices for tickers.
///
/// The Clarity backend and Yahoo Finance both implement this. The registry
/// tries them in order, so a dead source only costs one failed call.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Latest price and day change.
    async fn get_quote(&self, ticker: &str) -> Result<Quote, CoreError>;

    /// Closing price on `date` (or the nearest trading day).
    async fn get_price_at_date(&self, ticker: &str, date: NaiveDate) -> Result<f64, CoreError>;

    /// Daily closes in `[from, to]`, sorted by date.
    async fn get_price_range(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError>;

    /// First day the ticker traded. Used to bound historical date pickers.
    async fn get_listing_date(&self, ticker: &str) -> Result<NaiveDate, CoreError>;

    /// Symbol lookup for the ticker autocomplete.
    async fn search(&self, query: &str) -> Result<Vec<SymbolInfo>, CoreError>;
}

/// The backend that owns durable portfolios.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PortfolioBackend: Send + Sync {
    async fn list_portfolios(&self) -> Result<Vec<PortfolioRecord>, CoreError>;

    async fn create_portfolio(&self, name: &str, currency: &str) -> Result<PortfolioRecord, CoreError>;

    async fn delete_portfolio(&self, portfolio_id: &str) -> Result<(), CoreError>;

    /// Insert a holding row and return it with its id. The backend does not
    /// merge rows itself.
    async fn add_holding(
        &self,
        portfolio_id: &str,
        holding: &HoldingCreate,
    ) -> Result<HoldingRecord, CoreError>;

    /// Overwrite the given fields of one holding row.
    async fn update_holding(&self, holding_id: &str, update: &HoldingUpdate) -> Result<(), CoreError>;

    async fn delete_holding(&self, holding_id: &str) -> Result<(), CoreError>;

    /// Holdings with live prices and server-side totals.
    async fn get_performance(&self, portfolio_id: &str) -> Result<PerformanceResponse, CoreError>;

    /// Credentials changed (sign in / sign out). Backends without
    /// authentication ignore this.
    fn set_access_token(&mut self, _token: Option<String>) {}
}
