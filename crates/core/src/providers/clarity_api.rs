use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use crate::errors::CoreError;
use crate::models::market::SymbolInfo;
use crate::models::price::{PricePoint, Quote};
use crate::models::settings::Settings;

use super::dto::{
    HistoryPoint, HoldingCreate, HoldingRecord, HoldingUpdate, ListingDateResponse,
    PerformanceResponse, PortfolioCreate, PortfolioRecord, PriceAtDateResponse, QuoteResponse,
};
use super::traits::{MarketDataProvider, PortfolioBackend};

const PROVIDER: &str = "Clarity API";

/// Mount point of the market data router.
const STOCKS: &str = "/stocks";

/// HTTP client for the Clarity REST backend.
///
/// - **Portfolios**: `/portfolios/...` (bearer token required)
/// - **Holding rows**: `/portfolios/holdings/{holding_id}` (bearer token required)
/// - **Market data**: `/stocks/...` (public)
///
/// One client serves both [`PortfolioBackend`] and [`MarketDataProvider`].
pub struct ClarityApiClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl ClarityApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, 30)
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::with_timeout(settings.api_base_url.clone(), settings.request_timeout_secs)
    }

    #[cfg_attr(target_arch = "wasm32", allow(unused_variables))]
    fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(timeout_secs));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// Attach the bearer token of the signed-in user.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.access_token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join the base URL and a path that starts with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CoreError> {
        let resp = self.authorized(self.client.get(self.url(path))).send().await?;
        let resp = Self::check_status(resp, path).await?;
        Self::parse_json(resp, path).await
    }

    async fn parse_json<T: DeserializeOwned>(resp: Response, path: &str) -> Result<T, CoreError> {
        resp.json().await.map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse response from {path}: {e}"),
        })
    }

    /// Turn non-2xx responses into errors, keeping FastAPI's `detail` text.
    async fn check_status(resp: Response, path: &str) -> Result<Response, CoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, path, &body))
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Build the error for a failed call. 404s on portfolio paths become not-found.
pub fn status_error(status: StatusCode, path: &str, body: &str) -> CoreError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| body.trim().to_string());

    if status == StatusCode::NOT_FOUND {
        if let Some(id) = portfolio_id_from_path(path) {
            return CoreError::PortfolioNotFound(id.to_string());
        }
    }

    CoreError::Api {
        provider: PROVIDER.into(),
        message: if detail.is_empty() {
            format!("HTTP {} for {path}", status.as_u16())
        } else {
            format!("HTTP {} for {path}: {detail}", status.as_u16())
        },
    }
}

fn portfolio_id_from_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/portfolios/")?;
    let id = rest.split(['/', '?']).next()?;
    (!id.is_empty() && id != "holdings").then_some(id)
}

/// History periods the backend accepts, with the days each reaches back.
const HISTORY_PERIODS: [(i64, &str); 8] = [
    (5, "5d"),
    (30, "1mo"),
    (90, "3mo"),
    (180, "6mo"),
    (365, "1y"),
    (730, "2y"),
    (1825, "5y"),
    (3650, "10y"),
];

/// Smallest history period the backend accepts that reaches back to `from`.
pub fn history_period(from: NaiveDate, today: NaiveDate) -> &'static str {
    let days = (today - from).num_days();
    HISTORY_PERIODS
        .iter()
        .find(|(max_days, _)| days <= *max_days)
        .map(|(_, period)| *period)
        .unwrap_or("max")
}

/// Quote keyed by the requested ticker, never by the symbol the backend
/// echoes (which may carry an exchange suffix such as `.NS`). A zero price
/// means no source answered.
pub fn quote_from_response(ticker: &str, resp: QuoteResponse) -> Result<Quote, CoreError> {
    let data = resp.market_data;
    if !data.price.is_finite() || data.price <= 0.0 {
        return Err(CoreError::PriceNotAvailable {
            ticker: ticker.to_string(),
            date: "today".into(),
        });
    }
    Ok(Quote {
        ticker: ticker.to_string(),
        price: data.price,
        change: data.change,
        change_percent: data.change_percent,
    })
}

fn parse_history_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PortfolioBackend for ClarityApiClient {
    async fn list_portfolios(&self) -> Result<Vec<PortfolioRecord>, CoreError> {
        self.get_json("/portfolios/").await
    }

    async fn create_portfolio(&self, name: &str, currency: &str) -> Result<PortfolioRecord, CoreError> {
        let path = "/portfolios/";
        let body = PortfolioCreate { name, currency };
        let resp = self
            .authorized(self.client.post(self.url(path)).json(&body))
            .send()
            .await?;
        let resp = Self::check_status(resp, path).await?;
        Self::parse_json(resp, path).await
    }

    async fn delete_portfolio(&self, portfolio_id: &str) -> Result<(), CoreError> {
        let path = format!("/portfolios/{portfolio_id}");
        let resp = self
            .authorized(self.client.delete(self.url(&path)))
            .send()
            .await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    async fn add_holding(
        &self,
        portfolio_id: &str,
        holding: &HoldingCreate,
    ) -> Result<HoldingRecord, CoreError> {
        let path = format!("/portfolios/{portfolio_id}/holdings");
        debug!("POST {path} ticker={} shares={}", holding.ticker, holding.shares);
        let resp = self
            .authorized(self.client.post(self.url(&path)).json(holding))
            .send()
            .await?;
        let resp = Self::check_status(resp, &path).await?;
        Self::parse_json(resp, &path).await
    }

    async fn update_holding(&self, holding_id: &str, update: &HoldingUpdate) -> Result<(), CoreError> {
        let path = format!("/portfolios/holdings/{holding_id}");
        debug!("PUT {path} shares={:?} avg_price={:?}", update.shares, update.avg_price);
        let resp = self
            .authorized(self.client.put(self.url(&path)).json(update))
            .send()
            .await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    async fn delete_holding(&self, holding_id: &str) -> Result<(), CoreError> {
        let path = format!("/portfolios/holdings/{holding_id}");
        debug!("DELETE {path}");
        let resp = self
            .authorized(self.client.delete(self.url(&path)))
            .send()
            .await?;
        Self::check_status(resp, &path).await?;
        Ok(())
    }

    async fn get_performance(&self, portfolio_id: &str) -> Result<PerformanceResponse, CoreError> {
        self.get_json(&format!("/portfolios/{portfolio_id}/performance"))
            .await
    }

    fn set_access_token(&mut self, token: Option<String>) {
        self.set_token(token);
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl MarketDataProvider for ClarityApiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, CoreError> {
        let ticker = ticker.to_uppercase();
        let resp: QuoteResponse = self.get_json(&format!("{STOCKS}/{ticker}")).await?;
        quote_from_response(&ticker, resp)
    }

    async fn get_price_at_date(&self, ticker: &str, date: NaiveDate) -> Result<f64, CoreError> {
        let ticker = ticker.to_uppercase();
        let not_available = || CoreError::PriceNotAvailable {
            ticker: ticker.clone(),
            date: date.to_string(),
        };
        let resp: PriceAtDateResponse = self
            .get_json(&format!("{STOCKS}/price/{ticker}/{}", date.format("%Y-%m-%d")))
            .await
            .map_err(|e| match e {
                CoreError::Api { message, .. } if message.starts_with("HTTP 404") => not_available(),
                other => other,
            })?;
        match resp.price {
            Some(price) if price > 0.0 => Ok(price),
            _ => Err(not_available()),
        }
    }

    /// The history route takes a period ending today, so the smallest
    /// period reaching `from` is fetched and cut to `[from, to]`.
    async fn get_price_range(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let ticker = ticker.to_uppercase();
        let today = chrono::Utc::now().date_naive();
        let path = format!("{STOCKS}/{ticker}/history?period={}", history_period(from, today));
        let rows: Vec<HistoryPoint> = self.get_json(&path).await?;

        let mut points: Vec<PricePoint> = rows
            .iter()
            .filter_map(|row| {
                let date = parse_history_date(&row.date)?;
                (date >= from && date <= to).then_some(PricePoint {
                    date,
                    price: row.close,
                })
            })
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    async fn get_listing_date(&self, ticker: &str) -> Result<NaiveDate, CoreError> {
        let ticker = ticker.to_uppercase();
        let resp: ListingDateResponse = self
            .get_json(&format!("{STOCKS}/listing-date/{ticker}"))
            .await?;
        resp.listing_date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
            .ok_or_else(|| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("No listing date for {ticker}"),
            })
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolInfo>, CoreError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let path = format!("{STOCKS}/search");
        let resp = self
            .authorized(self.client.get(self.url(&path)).query(&[("q", query)]))
            .send()
            .await?;
        let resp = Self::check_status(resp, &path).await?;
        Self::parse_json(resp, &path).await
    }
}
