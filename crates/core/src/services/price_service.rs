use chrono::NaiveDate;
use log::debug;

use crate::errors::CoreError;
use crate::models::market::SymbolInfo;
use crate::models::price::{PriceCache, PricePoint, Quote};
use crate::models::transaction::PriceMode;
use crate::providers::registry::MarketDataRegistry;
use crate::providers::traits::MarketDataProvider;

/// Fetches reference prices from market data providers with caching.
///
/// Cache strategy:
/// - **Historical dates (< today)**: fetch once, cache forever. Past closes don't change.
/// - **Today's date**: fetch once per day.
/// - Every provider call falls back to the next registered provider on failure.
pub struct PriceService {
    registry: MarketDataRegistry,
}

impl PriceService {
    pub fn new(registry: MarketDataRegistry) -> Self {
        Self { registry }
    }

    pub fn has_provider(&self) -> bool {
        !self.registry.is_empty()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.registry.provider_names()
    }

    /// Latest quote, not cached. Used to refresh holdings' current prices.
    pub async fn get_quote(&self, ticker: &str) -> Result<Quote, CoreError> {
        let ticker = ticker.trim().to_uppercase();
        let mut last_error = None;
        for provider in self.providers()? {
            match provider.get_quote(&ticker).await {
                Ok(quote) => match Self::check_price(provider, &ticker, quote.price) {
                    Ok(_) => return Ok(quote),
                    Err(e) => last_error = Some(e),
                },
                Err(e) => {
                    debug!("{} failed quote for {ticker}: {e}", provider.name());
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider("quote".into())))
    }

    /// Price of `ticker` on `date`, served from cache when possible.
    ///
    /// 1. Historical date cached → return it.
    /// 2. Today cached and already refreshed today → return it.
    /// 3. Otherwise fetch (quote for today, close for past dates) and cache.
    pub async fn get_price(
        &self,
        cache: &mut PriceCache,
        ticker: &str,
        date: NaiveDate,
    ) -> Result<f64, CoreError> {
        let today = chrono::Utc::now().date_naive();
        self.get_price_as_of(cache, ticker, date, today).await
    }

    /// [`get_price`](Self::get_price) with an explicit "today".
    pub async fn get_price_as_of(
        &self,
        cache: &mut PriceCache,
        ticker: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<f64, CoreError> {
        let ticker = ticker.trim().to_uppercase();

        if let Some(price) = cache.get_price(&ticker, date) {
            if date < today || cache.is_today_fresh(&ticker, today) {
                return Ok(price);
            }
        }

        let price = if date >= today {
            self.get_quote(&ticker).await?.price
        } else {
            self.fetch_price_at_date(&ticker, date).await?
        };

        let stored_date = date.min(today);
        cache.set_price(&ticker, stored_date, price);
        if stored_date == today {
            cache.mark_updated_today(&ticker, today);
        }
        Ok(price)
    }

    /// Resolve the trade price for the transaction entry form.
    ///
    /// - `Manual`: the typed price, which must be given
    /// - `Present`: today's price
    /// - `Historical`: the close on `date`, which must be given
    pub async fn resolve_entry_price(
        &self,
        cache: &mut PriceCache,
        ticker: &str,
        mode: PriceMode,
        date: Option<NaiveDate>,
        manual_price: Option<f64>,
    ) -> Result<f64, CoreError> {
        if ticker.trim().is_empty() {
            return Err(CoreError::ValidationError("Ticker must not be empty".into()));
        }
        match mode {
            PriceMode::Manual => manual_price.ok_or_else(|| {
                CoreError::ValidationError("A price is required in manual mode".into())
            }),
            PriceMode::Present => {
                let today = chrono::Utc::now().date_naive();
                self.get_price_as_of(cache, ticker, today, today).await
            }
            PriceMode::Historical => {
                let date = date.ok_or_else(|| {
                    CoreError::ValidationError("A date is required for a historical price".into())
                })?;
                self.get_price(cache, ticker, date).await
            }
        }
    }

    /// Daily closes for a range.
    pub async fn get_price_range(
        &self,
        cache: &mut PriceCache,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let today = chrono::Utc::now().date_naive();
        self.get_price_range_as_of(cache, ticker, from, to, today).await
    }

    /// [`get_price_range`](Self::get_price_range) with an explicit "today".
    ///
    /// Served from the cache only when an earlier range fetch covered all of
    /// `[from, to]`. Days before `today` are recorded as covered after a
    /// fetch; today's close is not final yet, so it is never trusted.
    pub async fn get_price_range_as_of(
        &self,
        cache: &mut PriceCache,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let ticker = ticker.trim().to_uppercase();
        if cache.is_covered(&ticker, from, to) {
            debug!("price range {ticker} {from}..{to} served from cache");
            return Ok(cache.get_price_range(&ticker, from, to));
        }

        let mut last_error = None;
        for provider in self.providers()? {
            match provider.get_price_range(&ticker, from, to).await {
                Ok(points) => {
                    cache.set_prices(&ticker, &points);
                    if let Some(yesterday) = today.pred_opt() {
                        cache.mark_covered(&ticker, from, to.min(yesterday));
                    }
                    return Ok(points);
                }
                Err(e) => {
                    debug!("{} failed range for {ticker}: {e}", provider.name());
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider("price range".into())))
    }

    pub async fn get_listing_date(&self, ticker: &str) -> Result<NaiveDate, CoreError> {
        let ticker = ticker.trim().to_uppercase();
        let mut last_error = None;
        for provider in self.providers()? {
            match provider.get_listing_date(&ticker).await {
                Ok(date) => return Ok(date),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider("listing date".into())))
    }

    /// Raw symbol lookup from the first provider that supports it.
    pub async fn search(&self, query: &str) -> Result<Vec<SymbolInfo>, CoreError> {
        let mut last_error = None;
        for provider in self.providers()? {
            match provider.search(query).await {
                Ok(results) => return Ok(results),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider("search".into())))
    }

    fn providers(&self) -> Result<Vec<&dyn MarketDataProvider>, CoreError> {
        let providers = self.registry.providers();
        if providers.is_empty() {
            return Err(CoreError::NoProvider("market data".into()));
        }
        Ok(providers)
    }

    async fn fetch_price_at_date(&self, ticker: &str, date: NaiveDate) -> Result<f64, CoreError> {
        let mut last_error = None;
        for provider in self.providers()? {
            match provider.get_price_at_date(ticker, date).await {
                Ok(price) => match Self::check_price(provider, ticker, price) {
                    Ok(p) => return Ok(p),
                    Err(e) => last_error = Some(e),
                },
                Err(e) => {
                    debug!("{} failed price for {ticker} on {date}: {e}", provider.name());
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CoreError::NoProvider("historical price".into())))
    }

    /// Prices must be finite and non-negative.
    fn check_price(provider: &dyn MarketDataProvider, ticker: &str, price: f64) -> Result<f64, CoreError> {
        if !price.is_finite() || price < 0.0 {
            return Err(CoreError::Api {
                provider: provider.name().to_string(),
                message: format!("Invalid price returned for {ticker}: {price}"),
            });
        }
        Ok(price)
    }
}
