use chrono::{Datelike, NaiveDate};

use crate::errors::CoreError;
use crate::models::backtest::{BacktestPoint, BacktestResult, PnlResult, SampleInterval};
use crate::models::price::{PriceCache, PricePoint};
use crate::services::price_service::PriceService;

/// How the position size of a backtest is given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionSize {
    /// A fixed number of shares.
    Shares(f64),
    /// An amount of money invested at the initial price.
    Amount(f64),
}

/// "What if" simulator: buy on one date, value the position on another.
pub struct BacktestService;

impl BacktestService {
    pub fn new() -> Self {
        Self
    }

    /// P&L between an initial and a current price.
    ///
    /// With an amount, shares = amount / initial (0 if the initial price is 0).
    /// `pnl_percent` is 0 when nothing was invested.
    pub fn calculate_pnl(&self, initial_price: f64, current_price: f64, size: PositionSize) -> PnlResult {
        let (shares, invested_value) = match size {
            PositionSize::Amount(amount) => {
                let shares = if initial_price > 0.0 { amount / initial_price } else { 0.0 };
                (shares, amount)
            }
            PositionSize::Shares(shares) => (shares, shares * initial_price),
        };
        let current_value = current_price * shares;
        let pnl = current_value - invested_value;
        let pnl_percent = if invested_value > 0.0 {
            pnl / invested_value * 100.0
        } else {
            0.0
        };
        PnlResult {
            shares,
            invested_value,
            current_value,
            pnl,
            pnl_percent,
        }
    }

    /// Sampling density for a window: daily up to 90 days, weekly up to a
    /// year, monthly beyond.
    pub fn interval_for(&self, start: NaiveDate, end: NaiveDate) -> SampleInterval {
        let days = (end - start).num_days();
        if days <= 90 {
            SampleInterval::Daily
        } else if days <= 365 {
            SampleInterval::Weekly
        } else {
            SampleInterval::Monthly
        }
    }

    /// Thin a daily series to the interval. The first and last points are
    /// always kept so the P&L endpoints stay on the chart.
    pub fn sample(&self, points: &[PricePoint], interval: SampleInterval) -> Vec<PricePoint> {
        let mut out: Vec<PricePoint> = Vec::new();
        for (i, p) in points.iter().enumerate() {
            let keep = match (interval, out.last()) {
                (_, None) => true,
                (SampleInterval::Daily, _) => true,
                (SampleInterval::Weekly, Some(prev)) => (p.date - prev.date).num_days() >= 7,
                (SampleInterval::Monthly, Some(prev)) => {
                    (p.date.year(), p.date.month()) != (prev.date.year(), prev.date.month())
                }
            };
            if keep || i + 1 == points.len() {
                out.push(p.clone());
            }
        }
        out
    }

    /// Run a backtest from a daily price series already in hand.
    pub fn backtest_from_points(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
        size: PositionSize,
        points: &[PricePoint],
    ) -> Result<BacktestResult, CoreError> {
        Self::validate_window(start, end)?;
        let mut in_window: Vec<PricePoint> = points
            .iter()
            .filter(|p| p.date >= start && p.date <= end && p.price.is_finite())
            .cloned()
            .collect();
        in_window.sort_by_key(|p| p.date);

        let (first, last) = match (in_window.first(), in_window.last()) {
            (Some(f), Some(l)) => (f.clone(), l.clone()),
            _ => {
                return Err(CoreError::PriceNotAvailable {
                    ticker: ticker.to_uppercase(),
                    date: start.to_string(),
                })
            }
        };

        let pnl = self.calculate_pnl(first.price, last.price, size);
        let interval = self.interval_for(start, end);
        let series = self
            .sample(&in_window, interval)
            .into_iter()
            .map(|p| BacktestPoint {
                date: p.date,
                price: p.price,
                value: p.price * pnl.shares,
            })
            .collect();

        Ok(BacktestResult {
            ticker: ticker.to_uppercase(),
            start_date: start,
            end_date: end,
            buy_price: first.price,
            sell_price: last.price,
            pnl,
            interval,
            series,
        })
    }

    /// Fetch the price history and run the backtest.
    ///
    /// Without an `end` the position is held until today and valued at the
    /// live quote.
    pub async fn backtest(
        &self,
        price_service: &PriceService,
        cache: &mut PriceCache,
        ticker: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
        size: PositionSize,
    ) -> Result<BacktestResult, CoreError> {
        let today = chrono::Utc::now().date_naive();
        self.backtest_as_of(price_service, cache, ticker, start, end, size, today)
            .await
    }

    /// [`backtest`](Self::backtest) with an explicit "today".
    #[allow(clippy::too_many_arguments)]
    pub async fn backtest_as_of(
        &self,
        price_service: &PriceService,
        cache: &mut PriceCache,
        ticker: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
        size: PositionSize,
        today: NaiveDate,
    ) -> Result<BacktestResult, CoreError> {
        let Some(end) = end else {
            Self::validate_window(start, today)?;
            let mut points = price_service
                .get_price_range_as_of(cache, ticker, start, today, today)
                .await?;
            let quote = price_service.get_quote(ticker).await?;
            points.retain(|p| p.date < today);
            points.push(PricePoint {
                date: today,
                price: quote.price,
            });
            return self.backtest_from_points(ticker, start, today, size, &points);
        };

        Self::validate_window(start, end)?;
        let points = price_service
            .get_price_range_as_of(cache, ticker, start, end, today)
            .await?;
        self.backtest_from_points(ticker, start, end, size, &points)
    }

    fn validate_window(start: NaiveDate, end: NaiveDate) -> Result<(), CoreError> {
        if start > end {
            return Err(CoreError::ValidationError(format!(
                "Start date ({start}) must not be after end date ({end})"
            )));
        }
        Ok(())
    }
}

impl Default for BacktestService {
    fn default() -> Self {
        Self::new()
    }
}
