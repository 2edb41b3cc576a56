//! NSE/BSE trading hours in Indian Standard Time.
//!
//! Regular session 09:15–15:30 IST, Monday to Friday. Exchange holidays are
//! not modelled.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc, Weekday};

use crate::models::market::MarketStatus;

/// IST is UTC+05:30 with no daylight saving.
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Cache expiry is never longer than a day.
pub const MAX_CACHE_EXPIRY_SECS: i64 = 86_400;

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is within range")
}

pub fn market_open_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 15, 0).expect("valid time")
}

pub fn market_close_time() -> NaiveTime {
    NaiveTime::from_hms_opt(15, 30, 0).expect("valid time")
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Open on weekdays between open and close, both inclusive.
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&ist());
    if is_weekend(local.weekday()) {
        return false;
    }
    let t = local.time();
    t >= market_open_time() && t <= market_close_time()
}

pub fn market_status(now: DateTime<Utc>) -> MarketStatus {
    if is_market_open(now) {
        MarketStatus::Open
    } else {
        MarketStatus::Closed
    }
}

/// The next session open strictly after `now` (today's open if it is still
/// ahead, otherwise a later weekday).
pub fn next_market_open(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    let tz = ist();
    let local = now.with_timezone(&tz);
    let mut day = local.date_naive();
    if local.time() >= market_open_time() {
        day += Duration::days(1);
    }
    while is_weekend(day.weekday()) {
        day += Duration::days(1);
    }
    let naive = day.and_time(market_open_time());
    tz.from_local_datetime(&naive)
        .single()
        .unwrap_or_else(|| naive.and_utc().with_timezone(&tz))
}

/// Seconds a quote may be cached.
///
/// `base_secs` while the market is open; otherwise until the next open,
/// capped at [`MAX_CACHE_EXPIRY_SECS`].
pub fn smart_cache_expiry(now: DateTime<Utc>, base_secs: i64) -> i64 {
    if is_market_open(now) {
        return base_secs;
    }
    let until_open = (next_market_open(now).with_timezone(&Utc) - now).num_seconds();
    until_open.clamp(0, MAX_CACHE_EXPIRY_SECS)
}
