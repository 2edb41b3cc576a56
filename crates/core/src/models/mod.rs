pub mod analytics;
pub mod backtest;
pub mod holding;
pub mod market;
pub mod notice;
pub mod portfolio;
pub mod price;
pub mod session;
pub mod settings;
pub mod transaction;
pub mod view;
pub mod workspace;
