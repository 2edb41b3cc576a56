use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Profit and loss of a position between two prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlResult {
    pub shares: f64,
    pub invested_value: f64,
    pub current_value: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
}

/// How densely the backtest value series is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleInterval {
    Daily,
    Weekly,
    Monthly,
}

/// Position value on one day of the backtest window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestPoint {
    pub date: NaiveDate,
    pub price: f64,
    pub value: f64,
}

/// Outcome of a "what if I had bought on X and sold on Y" simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub buy_price: f64,
    pub sell_price: f64,
    pub pnl: PnlResult,
    pub interval: SampleInterval,
    pub series: Vec<BacktestPoint>,
}
