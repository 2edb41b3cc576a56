pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;
pub mod utils;

use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use models::{
    analytics::{AllocationSlice, PortfolioSummary, PortfolioTotals},
    backtest::{BacktestResult, PnlResult},
    holding::{normalize_ticker, HoldingView},
    market::{MarketStatus, SymbolInfo, SymbolMatch},
    notice::Notice,
    portfolio::Portfolio,
    session::{Session, UserProfile, FALLBACK_DISPLAY_NAME},
    settings::{OversellPolicy, Settings, SyncFailurePolicy},
    transaction::{PriceMode, Transaction, TransactionEntry, TransactionType},
    view::{RefreshTicket, ViewState},
    workspace::Workspace,
};
use providers::clarity_api::ClarityApiClient;
use providers::dto::{HoldingCreate, HoldingUpdate, PerformanceResponse, PortfolioRecord};
use providers::registry::MarketDataRegistry;
use providers::traits::PortfolioBackend;
use services::{
    analytics_service::AnalyticsService,
    backtest_service::{BacktestService, PositionSize},
    portfolio_service::{HoldingChange, PortfolioService},
    price_service::PriceService,
    search_service::SearchService,
    sync_service::{plan_lot_writes, LotPlan, LotWrite, PendingChange, SyncOutcome, SyncService},
    view_service::ViewCoordinator,
};
use storage::manager::StorageManager;

use errors::{CoreError, ErrorCategory};

/// Result of changing a holding (a transaction, an edit or a removal).
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionOutcome {
    /// What happened to the holding locally
    pub change: HoldingChange,
    /// How the backend round-trip ended (`Committed` when offline)
    pub sync: SyncOutcome,
}

/// Main entry point for the Clarity portfolio core.
///
/// This is the application-state container the UI talks to: it owns every
/// portfolio, the view state, the signed-in user and the notice queue, and
/// exposes them through typed reads and mutating methods.
///
/// Two modes share one code path:
/// - **offline**: no backend; all aggregation happens here.
/// - **connected**: changes are applied optimistically, then persisted
///   through the [`PortfolioBackend`].
#[must_use]
pub struct Clarity {
    workspace: Workspace,
    session: Option<Session>,
    backend: Option<Box<dyn PortfolioBackend>>,
    portfolio_service: PortfolioService,
    analytics_service: AnalyticsService,
    price_service: PriceService,
    sync_service: SyncService,
    backtest_service: BacktestService,
    search_service: SearchService,
    view: ViewCoordinator,
    notices: Vec<Notice>,
    /// Tracks whether any mutation has occurred since the last save/load.
    dirty: bool,
}

impl std::fmt::Debug for Clarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clarity")
            .field("portfolios", &self.workspace.portfolios.len())
            .field("view", self.view.state())
            .field("connected", &self.backend.is_some())
            .field("notices", &self.notices.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Clarity {
    /// Brand new offline workspace with default settings.
    pub fn create_new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Brand new offline workspace with the given settings.
    pub fn with_settings(settings: Settings) -> Self {
        Self::build(Workspace::new(settings))
    }

    /// Load a workspace snapshot from bytes.
    pub fn load_from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        let workspace = StorageManager::load_from_bytes(data)?;
        Ok(Self::build(workspace))
    }

    /// Serialize the workspace. Clears the unsaved-changes flag on success.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, CoreError> {
        let bytes = StorageManager::save_to_bytes(&self.workspace)?;
        self.dirty = false;
        Ok(bytes)
    }

    /// Load from a snapshot file on disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        let workspace = StorageManager::load_from_file(path)?;
        Ok(Self::build(workspace))
    }

    /// Save to a snapshot file on disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(&mut self, path: &str) -> Result<(), CoreError> {
        StorageManager::save_to_file(&self.workspace, path)?;
        self.dirty = false;
        Ok(())
    }

    /// Attach a backend. From now on changes are persisted through it,
    /// authenticated as the signed-in user if there is one.
    pub fn with_backend(mut self, mut backend: Box<dyn PortfolioBackend>) -> Self {
        if let Some(session) = &self.session {
            backend.set_access_token(Some(session.access_token.clone()));
        }
        self.backend = Some(backend);
        self
    }

    /// Attach the Clarity REST backend from settings. Signing in before or
    /// after connecting both authenticate it.
    pub fn connect_api(self) -> Self {
        let client = ClarityApiClient::from_settings(&self.workspace.settings);
        info!("connecting to {}", client.base_url());
        self.with_backend(Box::new(client))
    }

    /// Replace the market data providers (e.g., with test doubles).
    pub fn with_registry(mut self, registry: MarketDataRegistry) -> Self {
        self.price_service = PriceService::new(registry);
        self
    }

    fn build(workspace: Workspace) -> Self {
        let registry = MarketDataRegistry::new_with_defaults(&workspace.settings);
        let portfolio_service = PortfolioService::with_policy(workspace.settings.oversell_policy);
        let sync_service = SyncService::new(workspace.settings.sync_failure_policy);
        Self {
            workspace,
            session: None,
            backend: None,
            portfolio_service,
            analytics_service: AnalyticsService::new(),
            price_service: PriceService::new(registry),
            sync_service,
            backtest_service: BacktestService::new(),
            search_service: SearchService::new(),
            view: ViewCoordinator::new(),
            notices: Vec::new(),
            dirty: false,
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.workspace.settings
    }

    pub fn set_oversell_policy(&mut self, policy: OversellPolicy) {
        self.workspace.settings.oversell_policy = policy;
        self.portfolio_service.set_oversell_policy(policy);
        self.dirty = true;
    }

    pub fn set_sync_failure_policy(&mut self, policy: SyncFailurePolicy) {
        self.workspace.settings.sync_failure_policy = policy;
        self.sync_service.set_policy(policy);
        self.dirty = true;
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Store the signed-in user and hand the token to the attached backend.
    /// The token is kept in memory only.
    pub fn sign_in(&mut self, session: Session) {
        info!("signed in as {}", session.user.email);
        if let Some(backend) = self.backend.as_mut() {
            backend.set_access_token(Some(session.access_token.clone()));
        }
        self.workspace.user = Some(session.user.clone());
        self.session = Some(session);
        self.dirty = true;
    }

    pub fn sign_out(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            backend.set_access_token(None);
        }
        self.workspace.user = None;
        self.session = None;
        self.dirty = true;
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        self.workspace.user.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Greeting name for the dashboard header.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.workspace
            .user
            .as_ref()
            .map(UserProfile::display_name)
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string())
    }

    // ── Notices ─────────────────────────────────────────────────────

    /// Messages waiting to be shown, oldest first.
    #[must_use]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Hand all pending notices to the UI and clear the queue.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn dismiss_notice(&mut self, id: uuid::Uuid) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    /// Queue a user-visible error for `context`.
    ///
    /// Validation errors are not queued: they go back to the form that
    /// produced them.
    fn report(&mut self, context: &str, error: &CoreError) {
        if error.category() == ErrorCategory::Validation {
            return;
        }
        warn!("{context}: {error}");
        self.notices.push(Notice::error(format!("{context}: {error}")));
    }

    // ── Portfolios ──────────────────────────────────────────────────

    #[must_use]
    pub fn portfolios(&self) -> &[Portfolio] {
        &self.workspace.portfolios
    }

    #[must_use]
    pub fn portfolio(&self, id: &str) -> Option<&Portfolio> {
        self.workspace.portfolio(id)
    }

    /// The portfolio shown in detail view, looked up by id on every call.
    #[must_use]
    pub fn active_portfolio(&self) -> Option<&Portfolio> {
        self.view.active_id().and_then(|id| self.workspace.portfolio(id))
    }

    /// Create an empty portfolio and return its id.
    ///
    /// Connected: the backend assigns the id; a failure creates nothing.
    pub async fn create_portfolio(&mut self, name: &str) -> Result<String, CoreError> {
        let name = PortfolioService::validate_name(name)?.to_string();
        let currency = self.workspace.settings.default_currency.clone();

        let created = match &self.backend {
            Some(backend) => Some(backend.create_portfolio(&name, &currency).await),
            None => None,
        };

        let id = match created {
            None => self.portfolio_service.create_portfolio(
                &mut self.workspace.portfolios,
                &name,
                &currency,
            )?,
            Some(Ok(record)) => {
                let id = record.id.clone();
                self.workspace.portfolios.push(Portfolio::with_id(
                    record.id,
                    record.name,
                    record.currency,
                ));
                id
            }
            Some(Err(e)) => {
                self.report("Could not create portfolio", &e);
                return Err(e);
            }
        };

        info!("created portfolio {id} ({name})");
        self.dirty = true;
        Ok(id)
    }

    /// Delete a portfolio and its holdings. Irreversible.
    ///
    /// Connected: the backend delete must succeed first. Deleting the
    /// portfolio shown in detail view returns to the list.
    pub async fn delete_portfolio(&mut self, id: &str) -> Result<(), CoreError> {
        if self.workspace.portfolio(id).is_none() {
            let e = CoreError::PortfolioNotFound(id.to_string());
            self.report("Could not delete portfolio", &e);
            return Err(e);
        }

        let remote = match &self.backend {
            Some(backend) => backend.delete_portfolio(id).await,
            None => Ok(()),
        };
        match remote {
            // Already gone on the server; drop it locally too.
            Ok(()) | Err(CoreError::PortfolioNotFound(_)) => {}
            Err(e) => {
                self.report("Could not delete portfolio", &e);
                return Err(e);
            }
        }

        self.portfolio_service
            .delete_portfolio(&mut self.workspace.portfolios, id)?;
        self.view.on_deleted(id);
        info!("deleted portfolio {id}");
        self.dirty = true;
        Ok(())
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Apply a buy or sell to a portfolio.
    ///
    /// Validation errors return before anything changes. Otherwise the
    /// change is applied immediately; when connected it is then persisted
    /// and, on failure, rolled back or flagged per the sync policy, with a
    /// notice queued either way.
    ///
    /// A buy adds one backend row. A sell rewrites the holding's rows (see
    /// [`plan_lot_writes`]).
    pub async fn apply_transaction(
        &mut self,
        portfolio_id: &str,
        tx: Transaction,
    ) -> Result<TransactionOutcome, CoreError> {
        let service = &self.portfolio_service;
        let begun = self
            .sync_service
            .begin(&mut self.workspace.portfolios, portfolio_id, |p| {
                service.apply_transaction(p, &tx)
            });
        let (pending, change) = match begun {
            Ok(v) => v,
            Err(e) => {
                self.report("Could not apply transaction", &e);
                return Err(e);
            }
        };

        let write = match tx.tx_type {
            TransactionType::Buy => HoldingWrite::AddLot(HoldingCreate::from_buy(
                &tx,
                &self.workspace.settings.default_exchange,
            )),
            TransactionType::Sell => HoldingWrite::Rewrite,
        };
        let ticker = normalize_ticker(&tx.ticker);
        let sync = self
            .persist(portfolio_id, &ticker, pending, write, "Could not save transaction")
            .await;
        Ok(TransactionOutcome { change, sync })
    }

    /// Overwrite a holding's share count and/or average cost.
    ///
    /// Same optimistic flow as [`apply_transaction`](Self::apply_transaction).
    pub async fn update_holding(
        &mut self,
        portfolio_id: &str,
        ticker: &str,
        update: HoldingUpdate,
    ) -> Result<TransactionOutcome, CoreError> {
        let service = &self.portfolio_service;
        let begun = self
            .sync_service
            .begin(&mut self.workspace.portfolios, portfolio_id, |p| {
                service.update_holding(p, ticker, &update)
            });
        let (pending, change) = match begun {
            Ok(v) => v,
            Err(e) => {
                self.report("Could not edit holding", &e);
                return Err(e);
            }
        };

        let ticker = normalize_ticker(ticker);
        let sync = self
            .persist(portfolio_id, &ticker, pending, HoldingWrite::Rewrite, "Could not save holding")
            .await;
        Ok(TransactionOutcome { change, sync })
    }

    /// Remove a holding from a portfolio, whatever its size.
    pub async fn remove_holding(
        &mut self,
        portfolio_id: &str,
        ticker: &str,
    ) -> Result<TransactionOutcome, CoreError> {
        let service = &self.portfolio_service;
        let begun = self
            .sync_service
            .begin(&mut self.workspace.portfolios, portfolio_id, |p| {
                service.remove_holding(p, ticker)
            });
        let (pending, change) = match begun {
            Ok(v) => v,
            Err(e) => {
                self.report("Could not remove holding", &e);
                return Err(e);
            }
        };

        let ticker = normalize_ticker(ticker);
        let sync = self
            .persist(portfolio_id, &ticker, pending, HoldingWrite::Rewrite, "Could not remove holding")
            .await;
        Ok(TransactionOutcome { change, sync })
    }

    /// Second phase of an optimistic holding change: write it to the
    /// backend (if any), then commit or fail the pending change. On success
    /// the holding's row ids are brought up to date.
    async fn persist(
        &mut self,
        portfolio_id: &str,
        ticker: &str,
        pending: PendingChange,
        write: HoldingWrite,
        context: &str,
    ) -> SyncOutcome {
        self.dirty = true;

        let persisted = match &self.backend {
            None => None,
            Some(backend) => Some(match write {
                HoldingWrite::AddLot(row) => backend
                    .add_holding(portfolio_id, &row)
                    .await
                    .map(|record| LotIds::Append(record.id)),
                HoldingWrite::Rewrite => {
                    let after = self
                        .workspace
                        .portfolio(portfolio_id)
                        .and_then(|p| p.holding(ticker));
                    match pending.snapshot().holding(ticker) {
                        Some(before) => match plan_lot_writes(before, after) {
                            Ok(plan) => write_lots(&**backend, &plan)
                                .await
                                .map(|()| LotIds::Replace(plan.kept)),
                            Err(e) => Err(e),
                        },
                        None => Err(CoreError::HoldingNotFound {
                            portfolio_id: portfolio_id.to_string(),
                            ticker: ticker.to_string(),
                        }),
                    }
                }
            }),
        };

        match persisted {
            None => self
                .sync_service
                .commit(&mut self.workspace.portfolios, pending),
            Some(Ok(ids)) => {
                let outcome = self
                    .sync_service
                    .commit(&mut self.workspace.portfolios, pending);
                if let Some(portfolio) = self.workspace.portfolio_mut(portfolio_id) {
                    let lot_ids = match ids {
                        LotIds::Append(id) => {
                            let mut current = portfolio
                                .holding(ticker)
                                .map(|h| h.lot_ids.clone())
                                .unwrap_or_default();
                            current.push(id);
                            current
                        }
                        LotIds::Replace(kept) => kept,
                    };
                    self.portfolio_service.set_lot_ids(portfolio, ticker, lot_ids);
                }
                outcome
            }
            Some(Err(e)) => {
                let outcome = self
                    .sync_service
                    .fail(&mut self.workspace.portfolios, pending, &e);
                self.report(context, &e);
                outcome
            }
        }
    }

    /// Resolve the price for an entry form, then apply it.
    ///
    /// `Historical` buys also try to fetch today's quote so the new holding
    /// shows a live value; if that fails the trade price is used.
    pub async fn submit_entry(
        &mut self,
        portfolio_id: &str,
        entry: TransactionEntry,
    ) -> Result<TransactionOutcome, CoreError> {
        let price = self
            .resolve_entry_price(&entry.ticker, entry.mode, entry.date, entry.manual_price)
            .await?;

        let mode = entry.mode;
        let mut tx = entry.into_transaction(price);
        match mode {
            PriceMode::Present => tx.current_price = Some(price),
            PriceMode::Historical => match self.price_service.get_quote(&tx.ticker).await {
                Ok(quote) => tx.current_price = Some(quote.price),
                Err(e) => debug!("no live quote for {}: {e}", tx.ticker),
            },
            PriceMode::Manual => {}
        }

        self.apply_transaction(portfolio_id, tx).await
    }

    /// Reference price for the entry form (see [`PriceService::resolve_entry_price`]).
    pub async fn resolve_entry_price(
        &mut self,
        ticker: &str,
        mode: PriceMode,
        date: Option<NaiveDate>,
        manual_price: Option<f64>,
    ) -> Result<f64, CoreError> {
        let result = self
            .price_service
            .resolve_entry_price(&mut self.workspace.price_cache, ticker, mode, date, manual_price)
            .await;
        match result {
            Ok(price) => {
                self.dirty = true;
                Ok(price)
            }
            Err(e) => {
                self.report(&format!("Could not fetch a price for {}", ticker.trim().to_uppercase()), &e);
                Err(e)
            }
        }
    }

    // ── View state ──────────────────────────────────────────────────

    #[must_use]
    pub fn view_state(&self) -> &ViewState {
        self.view.state()
    }

    /// Ticket for a refresh the caller runs itself; hand it back to
    /// [`apply_performance_if_current`](Self::apply_performance_if_current).
    #[must_use]
    pub fn view_ticket(&self) -> RefreshTicket {
        self.view.current_ticket()
    }

    /// Open a portfolio's detail view and refresh it from the backend.
    ///
    /// Unknown ids leave the page on the list view.
    pub async fn select_portfolio(&mut self, id: &str) -> &ViewState {
        let ticket = self.view.select(id, &self.workspace.portfolios);
        if let ViewState::Detail { active_id } = &ticket.target {
            let active_id = active_id.clone();
            self.refresh_performance_for(&ticket, &active_id).await;
        }
        self.view.state()
    }

    /// Return to the list view and refresh the portfolio list.
    pub async fn back_to_list(&mut self) -> &ViewState {
        let ticket = self.view.back();
        self.refresh_portfolios_for(&ticket).await;
        self.view.state()
    }

    /// Reload the portfolio list from the backend (no-op offline).
    pub async fn refresh_portfolios(&mut self) -> Result<(), CoreError> {
        let ticket = self.view.current_ticket();
        match self.fetch_records().await {
            None => Ok(()),
            Some(Ok(records)) => {
                self.apply_records_if_current(&ticket, &records);
                Ok(())
            }
            Some(Err(e)) => {
                self.report("Could not load portfolios", &e);
                Err(e)
            }
        }
    }

    /// Reload one portfolio's holdings from the backend (no-op offline).
    pub async fn refresh_performance(&mut self, id: &str) -> Result<(), CoreError> {
        let ticket = self.view.current_ticket();
        match self.fetch_performance(id).await {
            None => Ok(()),
            Some(Ok(perf)) => {
                self.apply_performance_if_current(&ticket, id, &perf);
                Ok(())
            }
            Some(Err(e)) => {
                self.report("Could not load portfolio", &e);
                Err(e)
            }
        }
    }

    /// Apply a fetched portfolio list, unless the view has moved on since
    /// `ticket` was issued. Returns whether it was applied.
    pub fn apply_records_if_current(&mut self, ticket: &RefreshTicket, records: &[PortfolioRecord]) -> bool {
        if !self.view.is_current(ticket) {
            debug!("dropping stale portfolio list (epoch {})", ticket.epoch);
            return false;
        }
        self.portfolio_service
            .merge_records(&mut self.workspace.portfolios, records);
        self.view.revalidate(&self.workspace.portfolios);
        self.dirty = true;
        true
    }

    /// Apply fetched holdings, unless the view has moved on since `ticket`
    /// was issued. Returns whether it was applied.
    pub fn apply_performance_if_current(
        &mut self,
        ticket: &RefreshTicket,
        id: &str,
        performance: &PerformanceResponse,
    ) -> bool {
        if !self.view.is_current(ticket) {
            debug!("dropping stale performance for {id} (epoch {})", ticket.epoch);
            return false;
        }
        let Some(portfolio) = self.workspace.portfolio_mut(id) else {
            return false;
        };
        self.portfolio_service.apply_performance(portfolio, performance);
        portfolio.sync = models::portfolio::SyncStatus::Synced;
        self.dirty = true;
        true
    }

    /// Fetch live quotes for every holding of a portfolio and update
    /// current prices. Returns how many holdings were repriced.
    pub async fn refresh_quotes(&mut self, id: &str) -> Result<usize, CoreError> {
        let tickers: Vec<String> = match self.workspace.portfolio(id) {
            Some(p) => p.holdings.iter().map(|h| h.ticker.clone()).collect(),
            None => {
                let e = CoreError::PortfolioNotFound(id.to_string());
                self.report("Could not refresh prices", &e);
                return Err(e);
            }
        };

        let mut quotes = Vec::with_capacity(tickers.len());
        for ticker in &tickers {
            match self.price_service.get_quote(ticker).await {
                Ok(q) => quotes.push(q),
                Err(e) => self.report(&format!("Could not refresh {ticker}"), &e),
            }
        }

        let Some(portfolio) = self.workspace.portfolio_mut(id) else {
            return Ok(0);
        };
        let updated = self.portfolio_service.reprice_all(portfolio, &quotes);
        if updated > 0 {
            self.dirty = true;
        }
        Ok(updated)
    }

    async fn refresh_portfolios_for(&mut self, ticket: &RefreshTicket) {
        match self.fetch_records().await {
            Some(Ok(records)) => {
                self.apply_records_if_current(ticket, &records);
            }
            Some(Err(e)) => self.report("Could not load portfolios", &e),
            None => {}
        }
    }

    async fn refresh_performance_for(&mut self, ticket: &RefreshTicket, id: &str) {
        match self.fetch_performance(id).await {
            Some(Ok(perf)) => {
                self.apply_performance_if_current(ticket, id, &perf);
            }
            Some(Err(e)) => self.report("Could not load portfolio", &e),
            None => {}
        }
    }

    async fn fetch_records(&self) -> Option<Result<Vec<PortfolioRecord>, CoreError>> {
        match &self.backend {
            Some(backend) => Some(backend.list_portfolios().await),
            None => None,
        }
    }

    async fn fetch_performance(&self, id: &str) -> Option<Result<PerformanceResponse, CoreError>> {
        match &self.backend {
            Some(backend) => Some(backend.get_performance(id).await),
            None => None,
        }
    }

    // ── Analytics ───────────────────────────────────────────────────

    #[must_use]
    pub fn totals(&self, id: &str) -> Option<PortfolioTotals> {
        self.workspace
            .portfolio(id)
            .map(|p| self.analytics_service.totals(p))
    }

    #[must_use]
    pub fn combined_totals(&self) -> PortfolioTotals {
        self.analytics_service
            .combined_totals(&self.workspace.portfolios)
    }

    /// Cards for list mode.
    #[must_use]
    pub fn summaries(&self) -> Vec<PortfolioSummary> {
        self.analytics_service
            .summaries(&self.workspace.portfolios)
    }

    /// Table rows for a portfolio. Empty for an unknown id.
    #[must_use]
    pub fn holding_rows(&self, id: &str) -> Vec<HoldingView> {
        self.workspace
            .portfolio(id)
            .map(|p| self.analytics_service.holding_rows(p))
            .unwrap_or_default()
    }

    /// Pie slices for a portfolio. Empty for an unknown id.
    #[must_use]
    pub fn allocations(&self, id: &str) -> Vec<AllocationSlice> {
        self.workspace
            .portfolio(id)
            .map(|p| self.analytics_service.allocations(p))
            .unwrap_or_default()
    }

    // ── Market ──────────────────────────────────────────────────────

    #[must_use]
    pub fn market_status(&self, now: DateTime<Utc>) -> MarketStatus {
        utils::market_hours::market_status(now)
    }

    /// Ticker autocomplete: provider lookup, then local ranking.
    pub async fn search_symbols(&mut self, query: &str) -> Result<Vec<SymbolMatch>, CoreError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        match self.price_service.search(query).await {
            Ok(symbols) => Ok(self.search_service.rank(&symbols, query)),
            Err(e) => {
                self.report("Search failed", &e);
                Err(e)
            }
        }
    }

    /// Rank an already-loaded symbol list.
    #[must_use]
    pub fn rank_symbols(&self, symbols: &[SymbolInfo], query: &str) -> Vec<SymbolMatch> {
        self.search_service.rank(symbols, query)
    }

    pub async fn listing_date(&mut self, ticker: &str) -> Result<NaiveDate, CoreError> {
        self.price_service.get_listing_date(ticker).await
    }

    // ── Backtest ────────────────────────────────────────────────────

    #[must_use]
    pub fn calculate_pnl(&self, initial_price: f64, current_price: f64, size: PositionSize) -> PnlResult {
        self.backtest_service
            .calculate_pnl(initial_price, current_price, size)
    }

    /// Simulate buying `size` of `ticker` on `start` and holding until `end`,
    /// or until now at the live quote when `end` is `None`.
    pub async fn backtest(
        &mut self,
        ticker: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
        size: PositionSize,
    ) -> Result<BacktestResult, CoreError> {
        let result = self
            .backtest_service
            .backtest(
                &self.price_service,
                &mut self.workspace.price_cache,
                ticker,
                start,
                end,
                size,
            )
            .await;
        if let Err(e) = &result {
            self.report("Backtest failed", e);
        }
        result
    }
}

/// How an optimistic holding change is written to the backend.
enum HoldingWrite {
    /// Insert one row for a buy.
    AddLot(HoldingCreate),
    /// Bring the holding's existing rows in line with its new state.
    Rewrite,
}

/// Row ids a holding has after a successful write.
enum LotIds {
    Append(String),
    Replace(Vec<String>),
}

async fn write_lots(backend: &dyn PortfolioBackend, plan: &LotPlan) -> Result<(), CoreError> {
    for write in &plan.writes {
        match write {
            LotWrite::Update { id, update } => backend.update_holding(id, update).await?,
            LotWrite::Delete { id } => backend.delete_holding(id).await?,
        }
    }
    Ok(())
}
