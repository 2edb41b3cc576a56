pub mod analytics_service;
pub mod backtest_service;
pub mod portfolio_service;
pub mod price_service;
pub mod search_service;
pub mod sync_service;
pub mod view_service;
