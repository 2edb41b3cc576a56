use serde::{Deserialize, Serialize};

/// A single ticker's position within a portfolio.
///
/// Only the four primary fields are stored. Value, invested amount and gain
/// are always derived from them, so they can never drift out of sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Ticker symbol, uppercased (e.g., "RELIANCE", "TCS")
    pub ticker: String,

    /// Number of shares held (never negative)
    pub shares: f64,

    /// Weighted-average cost per share
    pub avg_price: f64,

    /// Latest known market price per share
    pub current_price: f64,

    /// Ids of the backend rows this position was merged from. Empty offline,
    /// or when the backend did not report them.
    #[serde(default)]
    pub lot_ids: Vec<String>,
}

impl Holding {
    pub fn new(ticker: impl Into<String>, shares: f64, avg_price: f64, current_price: f64) -> Self {
        Self {
            ticker: normalize_ticker(&ticker.into()),
            shares,
            avg_price,
            current_price,
            lot_ids: Vec::new(),
        }
    }

    pub fn with_lot_ids(mut self, lot_ids: Vec<String>) -> Self {
        self.lot_ids = lot_ids;
        self
    }

    /// shares × current_price
    pub fn current_value(&self) -> f64 {
        self.shares * self.current_price
    }

    /// shares × avg_price
    pub fn invested_value(&self) -> f64 {
        self.shares * self.avg_price
    }

    pub fn gain(&self) -> f64 {
        self.current_value() - self.invested_value()
    }

    /// Percentage gain on the invested amount. 0 when nothing is invested.
    pub fn gain_pct(&self) -> f64 {
        let invested = self.invested_value();
        if invested > 0.0 {
            self.gain() / invested * 100.0
        } else {
            0.0
        }
    }

    /// Flatten into the row shape the UI tables consume.
    pub fn view(&self) -> HoldingView {
        HoldingView {
            ticker: self.ticker.clone(),
            shares: self.shares,
            avg_price: self.avg_price,
            current_price: self.current_price,
            current_value: self.current_value(),
            invested_value: self.invested_value(),
            gain: self.gain(),
            gain_pct: self.gain_pct(),
        }
    }
}

/// Read-only row with every derived figure filled in.
///
/// Same field names as the backend's performance payload, so a UI table can
/// render either without caring where the numbers came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingView {
    pub ticker: String,
    pub shares: f64,
    pub avg_price: f64,
    pub current_price: f64,
    pub current_value: f64,
    pub invested_value: f64,
    pub gain: f64,
    pub gain_pct: f64,
}

/// Trim and uppercase a user-typed ticker.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}
