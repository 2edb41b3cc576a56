//! JSON shapes exchanged with the Clarity REST backend.

use serde::{Deserialize, Serialize};

use crate::models::holding::Holding;
use crate::models::transaction::Transaction;

fn default_currency() -> String {
    "INR".to_string()
}

/// Row of `GET /portfolios/` and the body returned by `POST /portfolios/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRecord {
    pub id: String,
    pub name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioCreate<'a> {
    pub name: &'a str,
    pub currency: &'a str,
}

/// Body of `POST /portfolios/{id}/holdings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingCreate {
    pub ticker: String,
    pub exchange: String,
    pub shares: f64,
    pub avg_price: f64,
    #[serde(default)]
    pub allocation_percent: f64,
}

impl HoldingCreate {
    /// Row for a single buy, priced at the trade price.
    pub fn from_buy(transaction: &Transaction, exchange: &str) -> Self {
        Self {
            ticker: transaction.ticker.clone(),
            exchange: exchange.to_string(),
            shares: transaction.shares,
            avg_price: transaction.price,
            allocation_percent: 0.0,
        }
    }
}

/// Row returned by `POST /portfolios/{id}/holdings`. Only the id is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub id: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub avg_price: f64,
}

/// Body of `PUT /portfolios/holdings/{holding_id}`. Absent fields are left
/// unchanged by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HoldingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
}

impl HoldingUpdate {
    pub fn shares(shares: f64) -> Self {
        Self {
            shares: Some(shares),
            avg_price: None,
        }
    }

    pub fn avg_price(avg_price: f64) -> Self {
        Self {
            shares: None,
            avg_price: Some(avg_price),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_none() && self.avg_price.is_none()
    }
}

/// One holding row of the performance payload.
///
/// The backend also sends `current_value`, `invested_value`, `gain` and
/// `gain_pct`. They are ignored and recomputed from the fields below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceHolding {
    /// Row id, when the backend includes it
    #[serde(default)]
    pub id: Option<String>,
    pub ticker: String,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub avg_price: f64,
    #[serde(default)]
    pub current_price: f64,
}

impl From<&PerformanceHolding> for Holding {
    fn from(h: &PerformanceHolding) -> Self {
        Holding::new(h.ticker.as_str(), h.shares, h.avg_price, h.current_price)
            .with_lot_ids(h.id.iter().cloned().collect())
    }
}

/// `GET /portfolios/{id}/performance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResponse {
    #[serde(default)]
    pub portfolio_id: Option<String>,
    #[serde(default)]
    pub total_value: f64,
    #[serde(default)]
    pub total_invested: f64,
    #[serde(default)]
    pub total_gain: f64,
    #[serde(default)]
    pub return_pct: f64,
    #[serde(default)]
    pub holdings: Vec<PerformanceHolding>,
}

/// Price block of `GET /stocks/{symbol}`. A price of 0 means no source
/// answered.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarketData {
    #[serde(default, alias = "current_price")]
    pub price: f64,
    #[serde(default)]
    pub change: f64,
    #[serde(default, alias = "changePercent", alias = "percent_change")]
    pub change_percent: f64,
    #[serde(default)]
    pub status: Option<String>,
}

/// `GET /stocks/{symbol}`: aggregated details. Fundamentals and news are
/// ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteResponse {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub market_data: MarketData,
}

/// `GET /stocks/price/{symbol}/{date}`. `null` or 0 when there is no close.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceAtDateResponse {
    #[serde(default, alias = "close")]
    pub price: Option<f64>,
}

/// One row of `GET /stocks/{symbol}/history`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryPoint {
    /// ISO date, optionally with a time part (`2024-01-05T00:00:00+05:30`)
    pub date: String,
    pub close: f64,
}

/// `GET /stocks/listing-date/{symbol}`. An empty string when unknown.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListingDateResponse {
    #[serde(default)]
    pub listing_date: Option<String>,
}
