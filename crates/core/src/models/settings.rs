use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

/// What to do when a SELL asks for more shares than are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OversellPolicy {
    /// Sell everything that is held and drop the holding.
    #[default]
    Clamp,
    /// Refuse the transaction with a validation error.
    Reject,
}

/// What to do with an optimistic change the backend failed to persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncFailurePolicy {
    /// Restore the portfolio as it was before the change.
    #[default]
    Rollback,
    /// Keep the local change and flag the portfolio as unsynced.
    MarkUnsynced,
}

/// User-configurable settings, stored inside the local snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the Clarity REST backend, including the API prefix.
    pub api_base_url: String,

    /// Currency new portfolios are created in (e.g., "INR").
    pub default_currency: String,

    /// Exchange sent with new holdings (e.g., "NSE").
    pub default_exchange: String,

    pub oversell_policy: OversellPolicy,

    pub sync_failure_policy: SyncFailurePolicy,

    /// HTTP timeout for backend and market data calls.
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_currency: "INR".to_string(),
            default_exchange: "NSE".to_string(),
            oversell_policy: OversellPolicy::default(),
            sync_failure_policy: SyncFailurePolicy::default(),
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Defaults, overridden by `CLARITY_API_URL` and `CLARITY_CURRENCY` when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(url) = std::env::var("CLARITY_API_URL") {
            if !url.trim().is_empty() {
                settings.api_base_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(currency) = std::env::var("CLARITY_CURRENCY") {
            if !currency.trim().is_empty() {
                settings.default_currency = currency.trim().to_uppercase();
            }
        }
        settings
    }
}
