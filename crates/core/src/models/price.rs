use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single price data point (date → close).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Latest quote for a ticker, as shown on the stock card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    /// Absolute change against previous close
    pub change: f64,
    /// Percentage change against previous close
    pub change_percent: f64,
}

/// Inclusive date range `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateSpan {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.from <= from && to <= self.to
    }
}

/// Local cache of reference prices used by the transaction entry form and
/// the backtest.
///
/// Historical prices never change, so they are fetched once. Today's price is
/// refreshed at most once per day. Single-day lookups and full range fetches
/// share `entries`; only the latter are recorded in `covered`, so a handful of
/// scattered days never passes for a complete daily series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceCache {
    /// ticker → date-sorted price points
    pub entries: HashMap<String, Vec<PricePoint>>,

    /// ticker → day on which "today's" price was last fetched
    pub last_updated: HashMap<String, NaiveDate>,

    /// ticker → sorted, non-overlapping spans fetched as complete ranges
    #[serde(default)]
    pub covered: HashMap<String, Vec<DateSpan>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_price(&self, ticker: &str, date: NaiveDate) -> Option<f64> {
        let entries = self.entries.get(&ticker.to_uppercase())?;
        entries
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|idx| entries[idx].price)
    }

    /// Insert or overwrite, keeping each ticker's points sorted by date.
    pub fn set_price(&mut self, ticker: &str, date: NaiveDate, price: f64) {
        let entries = self.entries.entry(ticker.to_uppercase()).or_default();
        match entries.binary_search_by_key(&date, |p| p.date) {
            Ok(idx) => entries[idx].price = price,
            Err(idx) => entries.insert(idx, PricePoint { date, price }),
        }
    }

    pub fn set_prices(&mut self, ticker: &str, points: &[PricePoint]) {
        for point in points {
            self.set_price(ticker, point.date, point.price);
        }
    }

    pub fn is_today_fresh(&self, ticker: &str, today: NaiveDate) -> bool {
        self.last_updated
            .get(&ticker.to_uppercase())
            .is_some_and(|&d| d == today)
    }

    pub fn mark_updated_today(&mut self, ticker: &str, today: NaiveDate) {
        self.last_updated.insert(ticker.to_uppercase(), today);
    }

    /// Cached points for a ticker within `[from, to]`.
    pub fn get_price_range(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> Vec<PricePoint> {
        self.entries
            .get(&ticker.to_uppercase())
            .map(|entries| {
                let start = entries
                    .binary_search_by_key(&from, |p| p.date)
                    .unwrap_or_else(|pos| pos);
                let end = entries
                    .binary_search_by_key(&to, |p| p.date)
                    .map(|pos| pos + 1)
                    .unwrap_or_else(|pos| pos);
                if start >= end {
                    Vec::new()
                } else {
                    entries[start..end].to_vec()
                }
            })
            .unwrap_or_default()
    }

    /// Record that every trading day in `[from, to]` was fetched. Overlapping
    /// and adjacent spans are merged.
    pub fn mark_covered(&mut self, ticker: &str, from: NaiveDate, to: NaiveDate) {
        if from > to {
            return;
        }
        let spans = self.covered.entry(ticker.to_uppercase()).or_default();
        let mut merged = DateSpan::new(from, to);
        spans.retain(|s| {
            let touches = s.from <= merged.to + Duration::days(1) && merged.from <= s.to + Duration::days(1);
            if touches {
                merged.from = merged.from.min(s.from);
                merged.to = merged.to.max(s.to);
            }
            !touches
        });
        let idx = spans.partition_point(|s| s.from < merged.from);
        spans.insert(idx, merged);
    }

    /// Whether a single fetched span holds the whole of `[from, to]`.
    pub fn is_covered(&self, ticker: &str, from: NaiveDate, to: NaiveDate) -> bool {
        self.covered
            .get(&ticker.to_uppercase())
            .is_some_and(|spans| spans.iter().any(|s| s.contains(from, to)))
    }

    pub fn total_entries(&self) -> usize {
        self.entries.values().map(|v| v.len()).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_updated.clear();
        self.covered.clear();
    }
}
