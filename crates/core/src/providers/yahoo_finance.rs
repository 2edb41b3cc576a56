use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use time::OffsetDateTime;

use crate::errors::CoreError;
use crate::models::market::SymbolInfo;
use crate::models::price::{PricePoint, Quote};
use super::traits::MarketDataProvider;

const PROVIDER: &str = "Yahoo Finance";

/// Yahoo Finance fallback for reference prices.
///
/// - **Free**: No API key required.
/// - **Coverage**: NSE/BSE equities, ETFs, indices, commodity futures.
///
/// Bare NSE symbols are mapped to Yahoo's `.NS` form (see [`yahoo_symbol`]).
/// No symbol search: the autocomplete relies on the backend's master list.
///
/// **Note**: Not WASM-compatible (uses native reqwest/tokio).
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

/// Map an exchange symbol to Yahoo's ticker format.
///
/// `RELIANCE` → `RELIANCE.NS`. Symbols that already carry an exchange suffix
/// (`INFY.BO`), futures (`GC=F`) and indices (`^NSEI`) pass through.
pub fn yahoo_symbol(ticker: &str) -> String {
    let upper = ticker.trim().to_uppercase();
    if upper.contains('.') || upper.ends_with("=F") || upper.starts_with('^') {
        upper
    } else {
        format!("{upper}.NS")
    }
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| api_error(format!(
            "Failed to create connector: {e}"
        )))?;
        Ok(Self { connector })
    }

    /// Midnight UTC of `date` in the `time` crate's representation.
    fn to_offset_datetime(date: NaiveDate) -> Result<OffsetDateTime, CoreError> {
        let month = time::Month::try_from(date.month() as u8)
            .map_err(|e| api_error(format!("Invalid month in {date}: {e}")))?;
        let odt = time::Date::from_calendar_date(date.year(), month, date.day() as u8)
            .map_err(|e| api_error(format!("Invalid date {date}: {e}")))?
            .midnight()
            .assume_utc();
        Ok(odt)
    }

    fn timestamp_to_naive_date(ts: i64) -> Option<NaiveDate> {
        chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
    }
}

fn api_error(message: String) -> CoreError {
    CoreError::Api {
        provider: PROVIDER.into(),
        message,
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, CoreError> {
        let symbol = yahoo_symbol(ticker);
        let resp = self
            .connector
            .get_latest_quotes(&symbol, "1d")
            .await
            .map_err(|e| api_error(format!("Failed to fetch latest quote for {symbol}: {e}")))?;

        let quotes = resp
            .quotes()
            .map_err(|e| api_error(format!("No quote data for {symbol}: {e}")))?;

        let last = quotes
            .last()
            .ok_or_else(|| api_error(format!("Empty quote list for {symbol}")))?;
        let prev_close = quotes
            .len()
            .checked_sub(2)
            .and_then(|i| quotes.get(i))
            .map(|q| q.close)
            .unwrap_or(last.close);

        let change = last.close - prev_close;
        let change_percent = if prev_close > 0.0 {
            change / prev_close * 100.0
        } else {
            0.0
        };

        Ok(Quote {
            ticker: ticker.trim().to_uppercase(),
            price: last.close,
            change,
            change_percent,
        })
    }

    async fn get_price_at_date(&self, ticker: &str, date: NaiveDate) -> Result<f64, CoreError> {
        // Window of a few days so weekends and holidays still resolve to a close.
        let points = self
            .get_price_range(ticker, date, date + chrono::Duration::days(4))
            .await?;

        points
            .iter()
            .min_by_key(|p| (p.date - date).num_days().abs())
            .map(|p| p.price)
            .ok_or_else(|| CoreError::PriceNotAvailable {
                ticker: ticker.trim().to_uppercase(),
                date: date.to_string(),
            })
    }

    async fn get_price_range(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let symbol = yahoo_symbol(ticker);
        let start = Self::to_offset_datetime(from)?;
        let end = Self::to_offset_datetime(to + chrono::Duration::days(1))?;

        let resp = self
            .connector
            .get_quote_history(&symbol, start, end)
            .await
            .map_err(|e| api_error(format!("Failed to fetch history for {symbol}: {e}")))?;

        let quotes = resp
            .quotes()
            .map_err(|e| api_error(format!("Failed to parse quotes for {symbol}: {e}")))?;

        let mut points: Vec<PricePoint> = quotes
            .iter()
            .filter_map(|q| {
                let date = Self::timestamp_to_naive_date(q.timestamp as i64)?;
                (date >= from && date <= to).then_some(PricePoint {
                    date,
                    price: q.close,
                })
            })
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    async fn get_listing_date(&self, ticker: &str) -> Result<NaiveDate, CoreError> {
        let symbol = yahoo_symbol(ticker);
        let resp = self
            .connector
            .get_quote_range(&symbol, "1mo", "max")
            .await
            .map_err(|e| api_error(format!("Failed to fetch full history for {symbol}: {e}")))?;

        let quotes = resp
            .quotes()
            .map_err(|e| api_error(format!("Failed to parse quotes for {symbol}: {e}")))?;

        quotes
            .iter()
            .filter_map(|q| Self::timestamp_to_naive_date(q.timestamp as i64))
            .min()
            .ok_or_else(|| api_error(format!("No history for {symbol}")))
    }

    async fn search(&self, _query: &str) -> Result<Vec<SymbolInfo>, CoreError> {
        Err(api_error("Symbol search is not supported".into()))
    }
}
