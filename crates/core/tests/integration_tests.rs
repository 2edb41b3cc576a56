// ═══════════════════════════════════════════════════════════════════
// Integration Tests: the Clarity facade, offline and against a mock
// backend
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use clarity_core::errors::CoreError;
use clarity_core::models::market::{SymbolInfo, MarketStatus};
use clarity_core::models::notice::NoticeLevel;
use clarity_core::models::portfolio::SyncStatus;
use clarity_core::models::price::{PricePoint, Quote};
use clarity_core::models::session::{Session, UserProfile};
use clarity_core::models::settings::{OversellPolicy, SyncFailurePolicy};
use clarity_core::models::transaction::{Transaction, TransactionEntry, TransactionType};
use clarity_core::models::view::ViewState;
use clarity_core::providers::dto::{
    HoldingCreate, HoldingRecord, HoldingUpdate, PerformanceHolding, PerformanceResponse,
    PortfolioRecord,
};
use clarity_core::providers::registry::MarketDataRegistry;
use clarity_core::providers::traits::{MarketDataProvider, PortfolioBackend};
use clarity_core::services::backtest_service::PositionSize;
use clarity_core::services::portfolio_service::HoldingChange;
use clarity_core::services::sync_service::SyncOutcome;
use clarity_core::Clarity;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

// ═══════════════════════════════════════════════════════════════════
// Mock Backend
// ═══════════════════════════════════════════════════════════════════

#[derive(Default)]
struct BackendState {
    portfolios: Vec<PortfolioRecord>,
    performance: HashMap<String, PerformanceResponse>,
    /// (row id, portfolio id, row)
    rows: Vec<(String, String, HoldingCreate)>,
    updates: Vec<(String, HoldingUpdate)>,
    deletes: Vec<String>,
    token: Option<String>,
    fail_writes: bool,
    next_id: u32,
}

#[derive(Clone, Default)]
struct MockBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    fn with_portfolio(self, id: &str, name: &str) -> Self {
        self.state.lock().unwrap().portfolios.push(PortfolioRecord {
            id: id.into(),
            name: name.into(),
            currency: "INR".into(),
        });
        self
    }

    fn with_performance(self, id: &str, rows: Vec<PerformanceHolding>) -> Self {
        self.state.lock().unwrap().performance.insert(
            id.into(),
            PerformanceResponse {
                portfolio_id: Some(id.into()),
                total_value: 0.0,
                total_invested: 0.0,
                total_gain: 0.0,
                return_pct: 0.0,
                holdings: rows,
            },
        );
        self
    }

    fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    fn write_guard(&self) -> Result<(), CoreError> {
        if self.state.lock().unwrap().fail_writes {
            return Err(CoreError::Network("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PortfolioBackend for MockBackend {
    async fn list_portfolios(&self) -> Result<Vec<PortfolioRecord>, CoreError> {
        Ok(self.state.lock().unwrap().portfolios.clone())
    }

    async fn create_portfolio(&self, name: &str, currency: &str) -> Result<PortfolioRecord, CoreError> {
        self.write_guard()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let record = PortfolioRecord {
            id: format!("srv-{}", state.next_id),
            name: name.into(),
            currency: currency.into(),
        };
        state.portfolios.push(record.clone());
        Ok(record)
    }

    async fn delete_portfolio(&self, portfolio_id: &str) -> Result<(), CoreError> {
        self.write_guard()?;
        let mut state = self.state.lock().unwrap();
        let before = state.portfolios.len();
        state.portfolios.retain(|p| p.id != portfolio_id);
        if state.portfolios.len() == before {
            return Err(CoreError::PortfolioNotFound(portfolio_id.into()));
        }
        Ok(())
    }

    async fn add_holding(
        &self,
        portfolio_id: &str,
        holding: &HoldingCreate,
    ) -> Result<HoldingRecord, CoreError> {
        self.write_guard()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("row-{}", state.next_id);
        state.rows.push((id.clone(), portfolio_id.into(), holding.clone()));
        Ok(HoldingRecord {
            id,
            ticker: holding.ticker.clone(),
            shares: holding.shares,
            avg_price: holding.avg_price,
        })
    }

    async fn update_holding(&self, holding_id: &str, update: &HoldingUpdate) -> Result<(), CoreError> {
        self.write_guard()?;
        let mut state = self.state.lock().unwrap();
        // Rows reported through performance payloads are not tracked here
        if let Some(row) = state.rows.iter_mut().find(|(id, _, _)| id == holding_id) {
            if let Some(shares) = update.shares {
                row.2.shares = shares;
            }
            if let Some(avg_price) = update.avg_price {
                row.2.avg_price = avg_price;
            }
        }
        state.updates.push((holding_id.into(), update.clone()));
        Ok(())
    }

    async fn delete_holding(&self, holding_id: &str) -> Result<(), CoreError> {
        self.write_guard()?;
        let mut state = self.state.lock().unwrap();
        state.rows.retain(|(id, _, _)| id != holding_id);
        state.deletes.push(holding_id.into());
        Ok(())
    }

    async fn get_performance(&self, portfolio_id: &str) -> Result<PerformanceResponse, CoreError> {
        self.state
            .lock()
            .unwrap()
            .performance
            .get(portfolio_id)
            .cloned()
            .ok_or_else(|| CoreError::PortfolioNotFound(portfolio_id.into()))
    }

    fn set_access_token(&mut self, token: Option<String>) {
        self.state.lock().unwrap().token = token;
    }
}

// ═══════════════════════════════════════════════════════════════════
// Mock Market Data
// ═══════════════════════════════════════════════════════════════════

struct MockMarketData {
    closes: HashMap<(String, NaiveDate), f64>,
    quotes: HashMap<String, f64>,
}

impl MockMarketData {
    fn new() -> Self {
        let mut closes = HashMap::new();
        closes.insert(("TCS".to_string(), date(2023, 5, 2)), 3200.0);
        closes.insert(("INFY".to_string(), date(2024, 1, 2)), 1500.0);
        closes.insert(("INFY".to_string(), date(2024, 1, 31)), 1650.0);
        let mut quotes = HashMap::new();
        quotes.insert("TCS".to_string(), 3800.0);
        quotes.insert("RELIANCE".to_string(), 2985.40);
        quotes.insert("INFY".to_string(), 1700.0);
        Self { closes, quotes }
    }
}

#[async_trait]
impl MarketDataProvider for MockMarketData {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn get_quote(&self, ticker: &str) -> Result<Quote, CoreError> {
        self.quotes
            .get(ticker)
            .map(|&price| Quote {
                ticker: ticker.into(),
                price,
                change: 0.0,
                change_percent: 0.0,
            })
            .ok_or_else(|| CoreError::PriceNotAvailable {
                ticker: ticker.into(),
                date: "today".into(),
            })
    }

    async fn get_price_at_date(&self, ticker: &str, d: NaiveDate) -> Result<f64, CoreError> {
        self.closes
            .get(&(ticker.to_string(), d))
            .copied()
            .ok_or_else(|| CoreError::PriceNotAvailable {
                ticker: ticker.into(),
                date: d.to_string(),
            })
    }

    async fn get_price_range(
        &self,
        ticker: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let mut points: Vec<PricePoint> = self
            .closes
            .iter()
            .filter(|((t, d), _)| t == ticker && *d >= from && *d <= to)
            .map(|((_, d), &price)| PricePoint { date: *d, price })
            .collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    async fn get_listing_date(&self, _ticker: &str) -> Result<NaiveDate, CoreError> {
        Ok(date(2002, 8, 25))
    }

    async fn search(&self, _query: &str) -> Result<Vec<SymbolInfo>, CoreError> {
        Ok(vec![
            SymbolInfo { symbol: "TCS".into(), name: "Tata Consultancy Services".into() },
            SymbolInfo { symbol: "TATAMOTORS".into(), name: "Tata Motors".into() },
            SymbolInfo { symbol: "WIPRO".into(), name: "Wipro".into() },
        ])
    }
}

fn mock_registry() -> MarketDataRegistry {
    let mut registry = MarketDataRegistry::new();
    registry.register(Box::new(MockMarketData::new()));
    registry
}

fn offline() -> Clarity {
    Clarity::create_new().with_registry(mock_registry())
}

fn connected(backend: &MockBackend) -> Clarity {
    Clarity::create_new()
        .with_registry(mock_registry())
        .with_backend(Box::new(backend.clone()))
}

fn perf_row(ticker: &str, shares: f64, avg: f64, current: f64) -> PerformanceHolding {
    PerformanceHolding {
        id: None,
        ticker: ticker.into(),
        shares,
        avg_price: avg,
        current_price: current,
    }
}

fn perf_row_with_id(id: &str, ticker: &str, shares: f64, avg: f64, current: f64) -> PerformanceHolding {
    PerformanceHolding {
        id: Some(id.into()),
        ..perf_row(ticker, shares, avg, current)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Offline aggregation
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_offline_buy_buy_sell_scenario() {
    let mut app = offline();
    assert!(!app.is_connected());
    let id = app.create_portfolio("Long term").await.unwrap();
    assert!(app.has_unsaved_changes());

    app.apply_transaction(&id, Transaction::buy("RELIANCE", 50.0, 2450.0)).await.unwrap();
    let outcome = app
        .apply_transaction(&id, Transaction::buy("RELIANCE", 25.0, 2900.0))
        .await
        .unwrap();
    assert_eq!(outcome.sync, SyncOutcome::Committed);

    let rows = app.holding_rows(&id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].shares, 75.0);
    assert!(approx(rows[0].avg_price, 2600.0));
    assert!(approx(app.totals(&id).unwrap().total_invested, 195_000.0));

    let outcome = app
        .apply_transaction(&id, Transaction::sell("RELIANCE", 75.0, 3000.0))
        .await
        .unwrap();
    assert_eq!(outcome.change, HoldingChange::Closed { ticker: "RELIANCE".into() });
    assert!(app.holding_rows(&id).is_empty());
    assert_eq!(app.totals(&id).unwrap().return_pct, 0.0);
}

#[tokio::test]
async fn test_totals_never_drift_from_holdings() {
    let mut app = offline();
    let id = app.create_portfolio("Mixed").await.unwrap();
    let trades = [
        Transaction::buy("TCS", 3.0, 3500.0),
        Transaction::buy("INFY", 10.0, 1500.0),
        Transaction::sell("TCS", 1.0, 3700.0),
        Transaction::buy("TCS", 4.0, 3300.0),
        Transaction::sell("INFY", 2.5, 1600.0),
    ];
    for tx in trades {
        app.apply_transaction(&id, tx).await.unwrap();
        let totals = app.totals(&id).unwrap();
        let rows = app.holding_rows(&id);
        let value: f64 = rows.iter().map(|r| r.current_value).sum();
        let invested: f64 = rows.iter().map(|r| r.invested_value).sum();
        assert!(approx(totals.total_value, value));
        assert!(approx(totals.total_invested, invested));
        assert!(approx(totals.total_gain, value - invested));
    }
}

#[tokio::test]
async fn test_validation_errors_leave_state_and_queue_untouched() {
    let mut app = offline();
    let id = app.create_portfolio("Core").await.unwrap();
    let err = app
        .apply_transaction(&id, Transaction::buy("TCS", -1.0, 3500.0))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(app.holding_rows(&id).is_empty());
    assert!(app.notices().is_empty());

    assert!(app.create_portfolio("   ").await.unwrap_err().is_validation());
    assert_eq!(app.portfolios().len(), 1);
}

#[tokio::test]
async fn test_reject_policy_blocks_oversell() {
    let mut app = offline();
    app.set_oversell_policy(OversellPolicy::Reject);
    let id = app.create_portfolio("Core").await.unwrap();
    app.apply_transaction(&id, Transaction::buy("TCS", 2.0, 3500.0)).await.unwrap();

    let err = app
        .apply_transaction(&id, Transaction::sell("TCS", 5.0, 3600.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Oversell { .. }));
    assert_eq!(app.holding_rows(&id)[0].shares, 2.0);
    assert_eq!(app.settings().oversell_policy, OversellPolicy::Reject);
}

#[tokio::test]
async fn test_unknown_portfolio_is_reported() {
    let mut app = offline();
    let err = app
        .apply_transaction("ghost", Transaction::buy("TCS", 1.0, 3500.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PortfolioNotFound(_)));
    assert_eq!(app.notices().len(), 1);
    assert_eq!(app.notices()[0].level, NoticeLevel::Error);
}

// ═══════════════════════════════════════════════════════════════════
// View state
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_select_and_back() {
    let mut app = offline();
    let id = app.create_portfolio("Core").await.unwrap();
    assert!(app.view_state().is_list());

    let state = app.select_portfolio(&id).await.clone();
    assert_eq!(state, ViewState::Detail { active_id: id.clone() });
    assert_eq!(app.active_portfolio().map(|p| p.name.as_str()), Some("Core"));

    assert!(app.back_to_list().await.is_list());
    assert!(app.active_portfolio().is_none());
}

#[tokio::test]
async fn test_select_unknown_id_stays_on_list() {
    let mut app = offline();
    app.create_portfolio("Core").await.unwrap();
    assert!(app.select_portfolio("nope").await.is_list());
}

#[tokio::test]
async fn test_deleting_active_portfolio_returns_to_list() {
    let mut app = offline();
    let keep = app.create_portfolio("Keep").await.unwrap();
    let doomed = app.create_portfolio("Doomed").await.unwrap();
    app.select_portfolio(&doomed).await;

    app.delete_portfolio(&doomed).await.unwrap();
    assert!(app.view_state().is_list());
    assert!(app.portfolio(&doomed).is_none());
    assert!(app.portfolio(&keep).is_some());
}

#[tokio::test]
async fn test_deleting_other_portfolio_keeps_detail() {
    let mut app = offline();
    let active = app.create_portfolio("Active").await.unwrap();
    let other = app.create_portfolio("Other").await.unwrap();
    app.select_portfolio(&active).await;

    app.delete_portfolio(&other).await.unwrap();
    assert_eq!(app.view_state().active_id(), Some(active.as_str()));
}

#[tokio::test]
async fn test_stale_performance_is_dropped() {
    let backend = MockBackend::default()
        .with_portfolio("p1", "Core")
        .with_performance("p1", vec![perf_row("TCS", 2.0, 3500.0, 3800.0)]);
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    app.select_portfolio("p1").await;

    // A refresh issued while p1 was showing, answered after the user left
    let ticket = app.view_ticket();
    app.back_to_list().await;
    let late = PerformanceResponse {
        portfolio_id: Some("p1".into()),
        total_value: 0.0,
        total_invested: 0.0,
        total_gain: 0.0,
        return_pct: 0.0,
        holdings: vec![perf_row("WIPRO", 100.0, 400.0, 450.0)],
    };
    assert!(!app.apply_performance_if_current(&ticket, "p1", &late));
    assert_eq!(app.holding_rows("p1")[0].ticker, "TCS");

    let fresh = app.view_ticket();
    assert!(app.apply_performance_if_current(&fresh, "p1", &late));
    assert_eq!(app.holding_rows("p1")[0].ticker, "WIPRO");
}

// ═══════════════════════════════════════════════════════════════════
// Connected mode
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_connected_create_uses_backend_id() {
    let backend = MockBackend::default();
    let mut app = connected(&backend);
    let id = app.create_portfolio("Core").await.unwrap();
    assert_eq!(id, "srv-1");
    assert_eq!(app.portfolios()[0].id, "srv-1");
}

#[tokio::test]
async fn test_connected_create_failure_creates_nothing() {
    let backend = MockBackend::default();
    backend.fail_writes(true);
    let mut app = connected(&backend);
    assert!(app.create_portfolio("Core").await.is_err());
    assert!(app.portfolios().is_empty());
    assert_eq!(app.take_notices().len(), 1);
    assert!(app.notices().is_empty());
}

#[tokio::test]
async fn test_select_loads_and_merges_performance() {
    let backend = MockBackend::default().with_portfolio("p1", "Core").with_performance(
        "p1",
        vec![
            perf_row("RELIANCE", 50.0, 2450.0, 2985.40),
            perf_row("RELIANCE", 25.0, 2900.0, 2985.40),
        ],
    );
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    app.select_portfolio("p1").await;

    let rows = app.holding_rows("p1");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].shares, 75.0);
    assert!(approx(rows[0].avg_price, 2600.0));
    assert_eq!(app.summaries()[0].sync, SyncStatus::Synced);
}

#[tokio::test]
async fn test_connected_buy_and_sell_are_persisted() {
    let backend = MockBackend::default().with_portfolio("p1", "Core");
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();

    let buy = app
        .apply_transaction("p1", Transaction::buy("TCS", 5.0, 3500.0))
        .await
        .unwrap();
    assert_eq!(buy.sync, SyncOutcome::Committed);
    let holding = app.portfolio("p1").unwrap().holding("TCS").unwrap();
    assert_eq!(holding.lot_ids, vec!["row-1".to_string()]);

    let sell = app
        .apply_transaction("p1", Transaction::sell("tcs", 2.0, 3600.0))
        .await
        .unwrap();
    assert_eq!(sell.sync, SyncOutcome::Committed);

    let state = backend.state.lock().unwrap();
    assert_eq!(state.rows.len(), 1);
    assert_eq!(state.rows[0].2.exchange, "NSE");
    assert_eq!(state.rows[0].2.shares, 3.0);
    assert_eq!(
        state.updates,
        vec![(
            "row-1".to_string(),
            HoldingUpdate {
                shares: Some(3.0),
                avg_price: Some(3500.0),
            }
        )]
    );
    assert!(state.deletes.is_empty());
    drop(state);

    assert_eq!(app.summaries()[0].sync, SyncStatus::Synced);
}

#[tokio::test]
async fn test_connected_sell_collapses_rows_then_deletes() {
    let backend = MockBackend::default().with_portfolio("p1", "Core");
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    app.apply_transaction("p1", Transaction::buy("RELIANCE", 50.0, 2450.0)).await.unwrap();
    app.apply_transaction("p1", Transaction::buy("RELIANCE", 25.0, 2900.0)).await.unwrap();
    assert_eq!(
        app.portfolio("p1").unwrap().holding("RELIANCE").unwrap().lot_ids,
        vec!["row-1".to_string(), "row-2".to_string()]
    );

    app.apply_transaction("p1", Transaction::sell("RELIANCE", 25.0, 3000.0)).await.unwrap();
    {
        let state = backend.state.lock().unwrap();
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.rows[0].0, "row-1");
        assert_eq!(state.rows[0].2.shares, 50.0);
        assert!(approx(state.rows[0].2.avg_price, 2600.0));
        assert_eq!(state.deletes, vec!["row-2".to_string()]);
    }
    assert_eq!(
        app.portfolio("p1").unwrap().holding("RELIANCE").unwrap().lot_ids,
        vec!["row-1".to_string()]
    );

    let closed = app
        .apply_transaction("p1", Transaction::sell("RELIANCE", 50.0, 3000.0))
        .await
        .unwrap();
    assert_eq!(closed.change, HoldingChange::Closed { ticker: "RELIANCE".into() });
    assert_eq!(closed.sync, SyncOutcome::Committed);
    assert!(backend.state.lock().unwrap().rows.is_empty());
    assert!(app.holding_rows("p1").is_empty());
}

#[tokio::test]
async fn test_sell_without_known_rows_rolls_back() {
    let backend = MockBackend::default()
        .with_portfolio("p1", "Core")
        .with_performance("p1", vec![perf_row("TCS", 2.0, 3500.0, 3800.0)]);
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    app.select_portfolio("p1").await;

    let outcome = app
        .apply_transaction("p1", Transaction::sell("TCS", 1.0, 3800.0))
        .await
        .unwrap();
    assert!(matches!(outcome.sync, SyncOutcome::RolledBack { .. }));
    assert_eq!(app.holding_rows("p1")[0].shares, 2.0);
    assert!(app.notices()[0].message.contains("no backend row"));
}

#[tokio::test]
async fn test_edit_and_remove_holdings_with_reported_rows() {
    let backend = MockBackend::default().with_portfolio("p1", "Core").with_performance(
        "p1",
        vec![
            perf_row_with_id("a", "RELIANCE", 50.0, 2450.0, 2985.40),
            perf_row_with_id("b", "RELIANCE", 25.0, 2900.0, 2985.40),
            perf_row_with_id("c", "TCS", 2.0, 3500.0, 3800.0),
        ],
    );
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    app.select_portfolio("p1").await;
    assert_eq!(
        app.portfolio("p1").unwrap().holding("RELIANCE").unwrap().lot_ids,
        vec!["a".to_string(), "b".to_string()]
    );

    let edited = app
        .update_holding("p1", "reliance", HoldingUpdate::avg_price(2500.0))
        .await
        .unwrap();
    assert_eq!(
        edited.change,
        HoldingChange::Adjusted { ticker: "RELIANCE".into(), shares: 75.0, avg_price: 2500.0 }
    );
    assert_eq!(edited.sync, SyncOutcome::Committed);

    let removed = app.remove_holding("p1", "TCS").await.unwrap();
    assert_eq!(removed.change, HoldingChange::Closed { ticker: "TCS".into() });

    let state = backend.state.lock().unwrap();
    assert_eq!(
        state.updates,
        vec![(
            "a".to_string(),
            HoldingUpdate {
                shares: Some(75.0),
                avg_price: Some(2500.0),
            }
        )]
    );
    assert_eq!(state.deletes, vec!["b".to_string(), "c".to_string()]);
    drop(state);

    assert_eq!(app.holding_rows("p1").len(), 1);
    assert!(approx(app.totals("p1").unwrap().total_invested, 187_500.0));
}

#[tokio::test]
async fn test_failed_edit_rolls_back() {
    let backend = MockBackend::default()
        .with_portfolio("p1", "Core")
        .with_performance("p1", vec![perf_row_with_id("a", "TCS", 2.0, 3500.0, 3800.0)]);
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    app.select_portfolio("p1").await;
    backend.fail_writes(true);

    let outcome = app
        .update_holding("p1", "TCS", HoldingUpdate::shares(10.0))
        .await
        .unwrap();
    assert!(matches!(outcome.sync, SyncOutcome::RolledBack { .. }));
    assert_eq!(app.holding_rows("p1")[0].shares, 2.0);
    assert_eq!(app.notices().len(), 1);
}

#[tokio::test]
async fn test_failed_persist_rolls_back() {
    let backend = MockBackend::default().with_portfolio("p1", "Core");
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    backend.fail_writes(true);

    let outcome = app
        .apply_transaction("p1", Transaction::buy("TCS", 5.0, 3500.0))
        .await
        .unwrap();
    assert!(matches!(outcome.sync, SyncOutcome::RolledBack { .. }));
    assert!(app.holding_rows("p1").is_empty());
    assert_eq!(app.summaries()[0].sync, SyncStatus::Synced);
    assert_eq!(app.notices().len(), 1);
    assert!(app.notices()[0].message.contains("connection reset"));
}

#[tokio::test]
async fn test_failed_persist_marks_unsynced() {
    let backend = MockBackend::default().with_portfolio("p1", "Core");
    let mut app = connected(&backend);
    app.set_sync_failure_policy(SyncFailurePolicy::MarkUnsynced);
    app.refresh_portfolios().await.unwrap();
    backend.fail_writes(true);

    let outcome = app
        .apply_transaction("p1", Transaction::buy("TCS", 5.0, 3500.0))
        .await
        .unwrap();
    assert!(matches!(outcome.sync, SyncOutcome::MarkedUnsynced { .. }));
    assert_eq!(app.holding_rows("p1").len(), 1);
    assert!(matches!(app.summaries()[0].sync, SyncStatus::Unsynced { .. }));
}

#[tokio::test]
async fn test_connected_delete_failure_keeps_portfolio() {
    let backend = MockBackend::default().with_portfolio("p1", "Core");
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    backend.fail_writes(true);

    assert!(app.delete_portfolio("p1").await.is_err());
    assert!(app.portfolio("p1").is_some());
    assert_eq!(app.notices().len(), 1);

    backend.fail_writes(false);
    app.delete_portfolio("p1").await.unwrap();
    assert!(app.portfolios().is_empty());
}

#[tokio::test]
async fn test_refresh_dropping_active_portfolio_returns_to_list() {
    let backend = MockBackend::default()
        .with_portfolio("p1", "Core")
        .with_performance("p1", Vec::new());
    let mut app = connected(&backend);
    app.refresh_portfolios().await.unwrap();
    app.select_portfolio("p1").await;
    assert!(!app.view_state().is_list());

    // Deleted from another device
    backend.state.lock().unwrap().portfolios.clear();
    app.refresh_portfolios().await.unwrap();
    assert!(app.view_state().is_list());
    assert!(app.portfolios().is_empty());
}

// ═══════════════════════════════════════════════════════════════════
// Entry form, quotes, search, backtest
// ═══════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_offline_edit_and_remove() {
    let mut app = offline();
    let id = app.create_portfolio("Core").await.unwrap();
    app.apply_transaction(&id, Transaction::buy("TCS", 2.0, 3500.0)).await.unwrap();

    let outcome = app
        .update_holding(&id, "TCS", HoldingUpdate { shares: Some(4.0), avg_price: Some(3400.0) })
        .await
        .unwrap();
    assert_eq!(outcome.sync, SyncOutcome::Committed);
    assert!(approx(app.totals(&id).unwrap().total_invested, 13_600.0));

    let err = app
        .update_holding(&id, "TCS", HoldingUpdate::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(app.notices().is_empty());

    assert!(matches!(
        app.remove_holding(&id, "WIPRO").await,
        Err(CoreError::HoldingNotFound { .. })
    ));
    app.remove_holding(&id, "tcs").await.unwrap();
    assert!(app.holding_rows(&id).is_empty());
}

#[tokio::test]
async fn test_submit_manual_entry() {
    let mut app = offline();
    let id = app.create_portfolio("Core").await.unwrap();
    let entry = TransactionEntry::manual(TransactionType::Buy, "reliance", 50.0, 2450.0);
    app.submit_entry(&id, entry).await.unwrap();
    let rows = app.holding_rows(&id);
    assert_eq!(rows[0].ticker, "RELIANCE");
    assert_eq!(rows[0].current_price, 2450.0);
}

#[tokio::test]
async fn test_submit_historical_entry_marks_to_live_quote() {
    let mut app = offline();
    let id = app.create_portfolio("Core").await.unwrap();
    let entry = TransactionEntry::historical(TransactionType::Buy, "TCS", 2.0, date(2023, 5, 2));
    app.submit_entry(&id, entry).await.unwrap();

    let row = &app.holding_rows(&id)[0];
    assert_eq!(row.avg_price, 3200.0);
    assert_eq!(row.current_price, 3800.0);
    assert!(approx(row.gain, 1200.0));
}

#[tokio::test]
async fn test_submit_entry_without_price_data_fails() {
    let mut app = offline();
    let id = app.create_portfolio("Core").await.unwrap();
    let entry = TransactionEntry::historical(TransactionType::Buy, "WIPRO", 2.0, date(2023, 5, 2));
    let err = app.submit_entry(&id, entry).await.unwrap_err();
    assert!(matches!(err, CoreError::PriceNotAvailable { .. }));
    assert!(app.holding_rows(&id).is_empty());
    assert_eq!(app.notices().len(), 1);
}

#[tokio::test]
async fn test_refresh_quotes_updates_current_prices() {
    let mut app = offline();
    let id = app.create_portfolio("Core").await.unwrap();
    app.apply_transaction(&id, Transaction::buy("RELIANCE", 50.0, 2450.0)).await.unwrap();
    app.apply_transaction(&id, Transaction::buy("NOQUOTE", 1.0, 10.0)).await.unwrap();

    let updated = app.refresh_quotes(&id).await.unwrap();
    assert_eq!(updated, 1);
    let totals = app.totals(&id).unwrap();
    assert!(approx(totals.total_value, 149_270.0 + 10.0));
    // The ticker without a quote produced a notice
    assert_eq!(app.notices().len(), 1);
}

#[tokio::test]
async fn test_search_symbols_ranks_results() {
    let mut app = offline();
    let hits = app.search_symbols("tata").await.unwrap();
    let symbols: Vec<&str> = hits.iter().map(|h| h.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["TATAMOTORS", "TCS"]);
    assert!(app.search_symbols("  ").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backtest_through_facade() {
    let mut app = offline();
    let result = app
        .backtest("INFY", date(2024, 1, 1), Some(date(2024, 1, 31)), PositionSize::Shares(10.0))
        .await
        .unwrap();
    assert_eq!(result.pnl.pnl, 1500.0);

    let pnl = app.calculate_pnl(100.0, 110.0, PositionSize::Amount(1000.0));
    assert!(approx(pnl.pnl_percent, 10.0));
    assert_eq!(app.listing_date("INFY").await.unwrap(), date(2002, 8, 25));
}

#[tokio::test]
async fn test_open_ended_backtest_values_at_live_quote() {
    let mut app = offline();
    let result = app
        .backtest("INFY", date(2024, 1, 1), None, PositionSize::Shares(10.0))
        .await
        .unwrap();
    assert_eq!(result.buy_price, 1500.0);
    assert_eq!(result.sell_price, 1700.0);
    assert_eq!(result.pnl.pnl, 2000.0);
    assert_eq!(result.end_date, chrono::Utc::now().date_naive());
    assert_eq!(result.series.last().map(|p| p.price), Some(1700.0));
}

#[test]
fn test_market_status_through_facade() {
    use chrono::{TimeZone, Utc};
    let app = Clarity::create_new();
    // 2025-01-15 is a Wednesday; 06:00 UTC is 11:30 IST
    let open = Utc.with_ymd_and_hms(2025, 1, 15, 6, 0, 0).unwrap();
    assert_eq!(app.market_status(open), MarketStatus::Open);
    let night = Utc.with_ymd_and_hms(2025, 1, 15, 18, 0, 0).unwrap();
    assert_eq!(app.market_status(night), MarketStatus::Closed);
}

// ═══════════════════════════════════════════════════════════════════
// Session, notices, persistence
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_session_and_display_name() {
    let mut app = Clarity::create_new();
    assert_eq!(app.display_name(), "Investor");

    app.sign_in(Session {
        access_token: "token".into(),
        user: UserProfile::new("u1", "priya@example.com"),
    });
    assert_eq!(app.display_name(), "priya");
    assert_eq!(app.user().map(|u| u.id.as_str()), Some("u1"));

    let mut app = app.connect_api();
    assert!(app.is_connected());

    app.sign_out();
    assert!(app.session().is_none());
    assert_eq!(app.display_name(), "Investor");
}

#[test]
fn test_token_reaches_backend_in_either_order() {
    let session = || Session {
        access_token: "jwt-1".into(),
        user: UserProfile::new("u1", "priya@example.com"),
    };

    // Connect first, then sign in
    let backend = MockBackend::default();
    let mut app = connected(&backend);
    assert_eq!(backend.state.lock().unwrap().token, None);
    app.sign_in(session());
    assert_eq!(backend.state.lock().unwrap().token.as_deref(), Some("jwt-1"));
    app.sign_out();
    assert_eq!(backend.state.lock().unwrap().token, None);

    // Sign in first, then connect
    let backend = MockBackend::default();
    let mut app = Clarity::create_new();
    app.sign_in(session());
    let _app = app.with_backend(Box::new(backend.clone()));
    assert_eq!(backend.state.lock().unwrap().token.as_deref(), Some("jwt-1"));
}

#[tokio::test]
async fn test_dismiss_notice() {
    let mut app = offline();
    let _ = app.delete_portfolio("ghost").await;
    let id = app.notices()[0].id;
    assert!(app.dismiss_notice(id));
    assert!(!app.dismiss_notice(id));
    assert!(app.notices().is_empty());
}

#[tokio::test]
async fn test_save_and_reload_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clarity.clrt");
    let path = path.to_str().unwrap();

    let mut app = offline();
    app.set_oversell_policy(OversellPolicy::Reject);
    let id = app.create_portfolio("Core").await.unwrap();
    app.apply_transaction(&id, Transaction::buy("TCS", 3.0, 3500.0)).await.unwrap();
    app.save_to_file(path).unwrap();
    assert!(!app.has_unsaved_changes());

    let reloaded = Clarity::load_from_file(path).unwrap();
    assert_eq!(reloaded.portfolios(), app.portfolios());
    assert_eq!(reloaded.settings().oversell_policy, OversellPolicy::Reject);
    assert!(reloaded.view_state().is_list());
    assert!(!reloaded.has_unsaved_changes());

    let bytes = app.save_to_bytes().unwrap();
    let from_bytes = Clarity::load_from_bytes(&bytes).unwrap();
    assert_eq!(from_bytes.totals(&id), app.totals(&id));
}
