pub mod formatters;
pub mod market_hours;
