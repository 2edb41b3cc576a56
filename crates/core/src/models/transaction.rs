use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::holding::normalize_ticker;

/// Direction of a transaction. Serialized as `"BUY"` / `"SELL"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Buying shares. Merges into an existing holding by weighted-average cost.
    Buy,
    /// Selling shares. Removes the holding once it reaches zero.
    Sell,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Buy => write!(f, "BUY"),
            TransactionType::Sell => write!(f, "SELL"),
        }
    }
}

/// How the transaction entry form obtains the trade price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PriceMode {
    /// User types the price in.
    #[default]
    Manual,
    /// Latest quote for the ticker.
    Present,
    /// Closing price on the transaction date.
    Historical,
}

/// A single buy/sell instruction.
///
/// Transient: produced by the entry form, applied once by the aggregator,
/// then dropped. It is never stored inside a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Ticker symbol, uppercased
    pub ticker: String,

    /// Number of shares (must be positive)
    pub shares: f64,

    /// Trade price per share (must be positive)
    pub price: f64,

    /// Buy or Sell
    pub tx_type: TransactionType,

    /// Trade date, when the user supplied one
    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Latest market price to stamp on the holding after applying
    #[serde(default)]
    pub current_price: Option<f64>,
}

impl Transaction {
    pub fn new(tx_type: TransactionType, ticker: impl Into<String>, shares: f64, price: f64) -> Self {
        Self {
            ticker: normalize_ticker(&ticker.into()),
            shares,
            price,
            tx_type,
            date: None,
            current_price: None,
        }
    }

    pub fn buy(ticker: impl Into<String>, shares: f64, price: f64) -> Self {
        Self::new(TransactionType::Buy, ticker, shares, price)
    }

    pub fn sell(ticker: impl Into<String>, shares: f64, price: f64) -> Self {
        Self::new(TransactionType::Sell, ticker, shares, price)
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_current_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }
}

/// What the transaction entry form collects before a price is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub ticker: String,
    pub shares: f64,
    pub tx_type: TransactionType,
    pub mode: PriceMode,
    /// Trade date; required in `Historical` mode
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Typed price; required in `Manual` mode
    #[serde(default)]
    pub manual_price: Option<f64>,
}

impl TransactionEntry {
    pub fn manual(tx_type: TransactionType, ticker: impl Into<String>, shares: f64, price: f64) -> Self {
        Self {
            ticker: normalize_ticker(&ticker.into()),
            shares,
            tx_type,
            mode: PriceMode::Manual,
            date: None,
            manual_price: Some(price),
        }
    }

    pub fn present(tx_type: TransactionType, ticker: impl Into<String>, shares: f64) -> Self {
        Self {
            ticker: normalize_ticker(&ticker.into()),
            shares,
            tx_type,
            mode: PriceMode::Present,
            date: None,
            manual_price: None,
        }
    }

    pub fn historical(
        tx_type: TransactionType,
        ticker: impl Into<String>,
        shares: f64,
        date: NaiveDate,
    ) -> Self {
        Self {
            ticker: normalize_ticker(&ticker.into()),
            shares,
            tx_type,
            mode: PriceMode::Historical,
            date: Some(date),
            manual_price: None,
        }
    }

    /// The transaction to apply once the price is resolved.
    pub fn into_transaction(self, price: f64) -> Transaction {
        Transaction {
            ticker: self.ticker,
            shares: self.shares,
            price,
            tx_type: self.tx_type,
            date: self.date,
            current_price: None,
        }
    }
}
