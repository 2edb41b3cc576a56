use log::debug;

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::portfolio::Portfolio;
use crate::models::price::Quote;
use crate::models::settings::OversellPolicy;
use crate::models::transaction::{Transaction, TransactionType};
use crate::providers::dto::{HoldingUpdate, PerformanceResponse, PortfolioRecord};

/// Shares below this are treated as zero (float noise after partial sells).
pub const SHARE_EPSILON: f64 = 1e-9;

/// What applying a transaction did to the holding set.
#[derive(Debug, Clone, PartialEq)]
pub enum HoldingChange {
    /// A new holding was appended.
    Opened { ticker: String },
    /// An existing holding changed size (and cost basis on buys).
    Adjusted { ticker: String, shares: f64, avg_price: f64 },
    /// The holding was sold down to zero and removed.
    Closed { ticker: String },
}

/// Folds transactions into holdings and manages the portfolio collection.
///
/// Pure business logic with no I/O.
pub struct PortfolioService {
    oversell_policy: OversellPolicy,
}

impl PortfolioService {
    pub fn new() -> Self {
        Self::with_policy(OversellPolicy::default())
    }

    pub fn with_policy(oversell_policy: OversellPolicy) -> Self {
        Self { oversell_policy }
    }

    pub fn oversell_policy(&self) -> OversellPolicy {
        self.oversell_policy
    }

    pub fn set_oversell_policy(&mut self, policy: OversellPolicy) {
        self.oversell_policy = policy;
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Apply a buy or sell to the portfolio in place.
    ///
    /// On error the portfolio is left untouched.
    pub fn apply_transaction(
        &self,
        portfolio: &mut Portfolio,
        tx: &Transaction,
    ) -> Result<HoldingChange, CoreError> {
        self.validate_transaction(portfolio, tx)?;

        let change = match tx.tx_type {
            TransactionType::Buy => Self::merge_buy(portfolio, tx),
            TransactionType::Sell => self.reduce_sell(portfolio, tx)?,
        };
        debug!("{} {} x{} @ {} on {}: {:?}", tx.tx_type, tx.ticker, tx.shares, tx.price, portfolio.id, change);
        Ok(change)
    }

    /// Return a new portfolio value with the transaction applied.
    pub fn applied(&self, portfolio: &Portfolio, tx: &Transaction) -> Result<Portfolio, CoreError> {
        let mut next = portfolio.clone();
        self.apply_transaction(&mut next, tx)?;
        Ok(next)
    }

    /// Reject malformed input before anything is mutated.
    ///
    /// Rules:
    /// - Ticker must not be blank
    /// - Shares and price must be finite and positive
    /// - A supplied current price must be finite and non-negative
    /// - Under `OversellPolicy::Reject`, a sell cannot exceed the held shares
    pub fn validate_transaction(&self, portfolio: &Portfolio, tx: &Transaction) -> Result<(), CoreError> {
        if tx.ticker.trim().is_empty() {
            return Err(CoreError::ValidationError("Ticker must not be empty".into()));
        }
        if !tx.shares.is_finite() || tx.shares <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Shares must be a positive number, got {}",
                tx.shares
            )));
        }
        if !tx.price.is_finite() || tx.price <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Price must be a positive number, got {}",
                tx.price
            )));
        }
        if let Some(current) = tx.current_price {
            if !current.is_finite() || current < 0.0 {
                return Err(CoreError::ValidationError(format!(
                    "Current price must be a non-negative number, got {current}"
                )));
            }
        }

        if tx.tx_type == TransactionType::Sell {
            let held = portfolio
                .holding(&tx.ticker)
                .map(|h| h.shares)
                .ok_or_else(|| CoreError::HoldingNotFound {
                    portfolio_id: portfolio.id.clone(),
                    ticker: tx.ticker.clone(),
                })?;
            if self.oversell_policy == OversellPolicy::Reject && tx.shares > held + SHARE_EPSILON {
                return Err(CoreError::Oversell {
                    ticker: tx.ticker.clone(),
                    requested: tx.shares,
                    held,
                });
            }
        }
        Ok(())
    }

    /// Weighted-average merge. Several lots collapse into one position.
    fn merge_buy(portfolio: &mut Portfolio, tx: &Transaction) -> HoldingChange {
        if let Some(holding) = portfolio.holding_mut(&tx.ticker) {
            let total_shares = holding.shares + tx.shares;
            holding.avg_price =
                (holding.shares * holding.avg_price + tx.shares * tx.price) / total_shares;
            holding.shares = total_shares;
            if let Some(current) = tx.current_price {
                holding.current_price = current;
            }
            return HoldingChange::Adjusted {
                ticker: holding.ticker.clone(),
                shares: holding.shares,
                avg_price: holding.avg_price,
            };
        }

        let current = tx.current_price.unwrap_or(tx.price);
        let holding = Holding::new(tx.ticker.as_str(), tx.shares, tx.price, current);
        let ticker = holding.ticker.clone();
        portfolio.holdings.push(holding);
        HoldingChange::Opened { ticker }
    }

    fn reduce_sell(&self, portfolio: &mut Portfolio, tx: &Transaction) -> Result<HoldingChange, CoreError> {
        let idx = portfolio
            .holdings
            .iter()
            .position(|h| h.ticker.eq_ignore_ascii_case(tx.ticker.trim()))
            .ok_or_else(|| CoreError::HoldingNotFound {
                portfolio_id: portfolio.id.clone(),
                ticker: tx.ticker.clone(),
            })?;

        let remaining = (portfolio.holdings[idx].shares - tx.shares).max(0.0);

        if remaining <= SHARE_EPSILON {
            let removed = portfolio.holdings.remove(idx);
            return Ok(HoldingChange::Closed {
                ticker: removed.ticker,
            });
        }

        let holding = &mut portfolio.holdings[idx];
        holding.shares = remaining;
        if let Some(current) = tx.current_price {
            holding.current_price = current;
        }
        Ok(HoldingChange::Adjusted {
            ticker: holding.ticker.clone(),
            shares: holding.shares,
            avg_price: holding.avg_price,
        })
    }

    // ── Direct edits ────────────────────────────────────────────────

    /// Overwrite the share count and/or average cost of a holding, e.g. to
    /// correct a mistyped entry. Selling down to zero goes through
    /// [`remove_holding`](Self::remove_holding) instead.
    pub fn update_holding(
        &self,
        portfolio: &mut Portfolio,
        ticker: &str,
        update: &HoldingUpdate,
    ) -> Result<HoldingChange, CoreError> {
        if update.is_empty() {
            return Err(CoreError::ValidationError("Nothing to update".into()));
        }
        if let Some(shares) = update.shares {
            if !shares.is_finite() || shares <= 0.0 {
                return Err(CoreError::ValidationError(format!(
                    "Shares must be a positive number, got {shares}"
                )));
            }
        }
        if let Some(avg_price) = update.avg_price {
            if !avg_price.is_finite() || avg_price < 0.0 {
                return Err(CoreError::ValidationError(format!(
                    "Average price must be a non-negative number, got {avg_price}"
                )));
            }
        }

        let portfolio_id = portfolio.id.clone();
        let holding = portfolio
            .holding_mut(ticker)
            .ok_or_else(|| CoreError::HoldingNotFound {
                portfolio_id: portfolio_id.clone(),
                ticker: ticker.trim().to_uppercase(),
            })?;
        if let Some(shares) = update.shares {
            holding.shares = shares;
        }
        if let Some(avg_price) = update.avg_price {
            holding.avg_price = avg_price;
        }
        debug!("edited {} on {portfolio_id}: {:?}", holding.ticker, update);
        Ok(HoldingChange::Adjusted {
            ticker: holding.ticker.clone(),
            shares: holding.shares,
            avg_price: holding.avg_price,
        })
    }

    /// Drop a holding outright, whatever its size.
    pub fn remove_holding(&self, portfolio: &mut Portfolio, ticker: &str) -> Result<HoldingChange, CoreError> {
        let idx = portfolio
            .holdings
            .iter()
            .position(|h| h.ticker.eq_ignore_ascii_case(ticker.trim()))
            .ok_or_else(|| CoreError::HoldingNotFound {
                portfolio_id: portfolio.id.clone(),
                ticker: ticker.trim().to_uppercase(),
            })?;
        let removed = portfolio.holdings.remove(idx);
        Ok(HoldingChange::Closed {
            ticker: removed.ticker,
        })
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Set the market price of one holding.
    pub fn reprice(&self, portfolio: &mut Portfolio, ticker: &str, price: f64) -> Result<(), CoreError> {
        if !price.is_finite() || price < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Current price must be a non-negative number, got {price}"
            )));
        }
        let portfolio_id = portfolio.id.clone();
        let holding = portfolio
            .holding_mut(ticker)
            .ok_or_else(|| CoreError::HoldingNotFound {
                portfolio_id,
                ticker: ticker.trim().to_uppercase(),
            })?;
        holding.current_price = price;
        Ok(())
    }

    /// Apply a batch of quotes. Quotes for tickers not held are ignored.
    /// Returns how many holdings were updated.
    pub fn reprice_all(&self, portfolio: &mut Portfolio, quotes: &[Quote]) -> usize {
        let mut updated = 0;
        for quote in quotes {
            if !quote.price.is_finite() || quote.price < 0.0 {
                continue;
            }
            if let Some(holding) = portfolio.holding_mut(&quote.ticker) {
                holding.current_price = quote.price;
                updated += 1;
            }
        }
        updated
    }

    // ── Portfolio collection ────────────────────────────────────────

    /// Create an empty, locally-identified portfolio and append it.
    pub fn create_portfolio(
        &self,
        portfolios: &mut Vec<Portfolio>,
        name: &str,
        currency: &str,
    ) -> Result<String, CoreError> {
        let name = Self::validate_name(name)?;
        let portfolio = Portfolio::new(name, currency);
        let id = portfolio.id.clone();
        portfolios.push(portfolio);
        Ok(id)
    }

    /// Trimmed name, or a validation error if blank.
    pub fn validate_name(name: &str) -> Result<&str, CoreError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CoreError::ValidationError("Portfolio name must not be empty".into()));
        }
        Ok(trimmed)
    }

    /// Remove a portfolio and all its holdings. Irreversible.
    pub fn delete_portfolio(&self, portfolios: &mut Vec<Portfolio>, id: &str) -> Result<Portfolio, CoreError> {
        let idx = portfolios
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| CoreError::PortfolioNotFound(id.to_string()))?;
        Ok(portfolios.remove(idx))
    }

    /// Reconcile the local list with the backend's portfolio list.
    ///
    /// Known ids keep their local holdings; new ids are added empty; ids the
    /// backend no longer lists are dropped. Backend order wins.
    pub fn merge_records(&self, portfolios: &mut Vec<Portfolio>, records: &[PortfolioRecord]) {
        let mut existing = std::mem::take(portfolios);
        for record in records {
            let portfolio = match existing.iter().position(|p| p.id == record.id) {
                Some(idx) => {
                    let mut p = existing.swap_remove(idx);
                    p.name = record.name.clone();
                    p.currency = record.currency.to_uppercase();
                    p
                }
                None => Portfolio::with_id(record.id.as_str(), record.name.as_str(), record.currency.as_str()),
            };
            portfolios.push(portfolio);
        }
    }

    /// Replace a portfolio's holdings with the backend's performance rows.
    ///
    /// The backend stores one row per buy, so rows for the same ticker are
    /// merged with the same weighted-average rule used for local buys. Rows
    /// with no shares are skipped. Server-side totals are ignored.
    ///
    /// Row ids are collected per ticker. When the payload carries none for a
    /// ticker, the ids already known locally are kept.
    pub fn apply_performance(&self, portfolio: &mut Portfolio, performance: &PerformanceResponse) {
        let previous = std::mem::take(&mut portfolio.holdings);
        let mut holdings: Vec<Holding> = Vec::new();
        for row in &performance.holdings {
            if !row.shares.is_finite() || row.shares <= SHARE_EPSILON {
                continue;
            }
            let incoming = Holding::from(row);
            match holdings.iter_mut().find(|h| h.ticker == incoming.ticker) {
                Some(h) => {
                    let total = h.shares + incoming.shares;
                    h.avg_price = (h.shares * h.avg_price + incoming.shares * incoming.avg_price) / total;
                    h.shares = total;
                    h.current_price = incoming.current_price;
                    h.lot_ids.extend(incoming.lot_ids);
                }
                None => holdings.push(incoming),
            }
        }
        for holding in holdings.iter_mut().filter(|h| h.lot_ids.is_empty()) {
            if let Some(known) = previous.iter().find(|p| p.ticker == holding.ticker) {
                holding.lot_ids = known.lot_ids.clone();
            }
        }
        portfolio.holdings = holdings;
    }

    /// Replace the backend row ids of a holding. Unknown tickers are ignored.
    pub fn set_lot_ids(&self, portfolio: &mut Portfolio, ticker: &str, lot_ids: Vec<String>) {
        if let Some(holding) = portfolio.holding_mut(ticker) {
            holding.lot_ids = lot_ids;
        }
    }
}

impl Default for PortfolioService {
    fn default() -> Self {
        Self::new()
    }
}
