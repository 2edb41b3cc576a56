use thiserror::Error;

/// Unified error type for the entire clarity-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Storage / File ──────────────────────────────────────────────
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported file version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── File I/O (native only) ──────────────────────────────────────
    #[error("File I/O error: {0}")]
    FileIO(String),

    // ── API / Network ───────────────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No provider available for: {0}")]
    NoProvider(String),

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Portfolio not found: {0}")]
    PortfolioNotFound(String),

    #[error("Holding not found: {ticker} in portfolio {portfolio_id}")]
    HoldingNotFound {
        portfolio_id: String,
        ticker: String,
    },

    #[error("Holding {ticker} has no backend row to update")]
    HoldingNotPersisted { ticker: String },

    #[error("Cannot sell {requested} {ticker}: only {held} held")]
    Oversell {
        ticker: String,
        requested: f64,
        held: f64,
    },

    #[error("Price not available for {ticker} on {date}")]
    PriceNotAvailable {
        ticker: String,
        date: String,
    },
}

/// Coarse error taxonomy used to decide how a failure is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed input. Returned to the form, nothing mutated.
    Validation,
    /// Backend or market data failure.
    Network,
    /// Referenced portfolio / holding / price does not exist.
    NotFound,
    /// Local snapshot read/write failure.
    Storage,
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::InvalidFileFormat(_)
            | CoreError::UnsupportedVersion(_)
            | CoreError::Serialization(_)
            | CoreError::Deserialization(_)
            | CoreError::FileIO(_) => ErrorCategory::Storage,
            CoreError::Api { .. } | CoreError::Network(_) | CoreError::NoProvider(_) => {
                ErrorCategory::Network
            }
            CoreError::ValidationError(_) | CoreError::Oversell { .. } => ErrorCategory::Validation,
            CoreError::PortfolioNotFound(_)
            | CoreError::HoldingNotFound { .. }
            | CoreError::HoldingNotPersisted { .. }
            | CoreError::PriceNotAvailable { .. } => ErrorCategory::NotFound,
        }
    }

    /// Shorthand for `category() == ErrorCategory::Validation`.
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors carry the full URL; query strings may hold tokens.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
