use serde::{Deserialize, Serialize};

/// Which face of the portfolio page is showing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ViewState {
    /// All portfolios as summary cards.
    #[default]
    List,
    /// One portfolio's holdings table and allocation chart.
    Detail { active_id: String },
}

impl ViewState {
    pub fn active_id(&self) -> Option<&str> {
        match self {
            ViewState::List => None,
            ViewState::Detail { active_id } => Some(active_id),
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ViewState::List)
    }
}

/// Token handed out on every view transition.
///
/// A refresh started under one ticket must only be applied while that
/// ticket is still current; see `ViewCoordinator::is_current`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    pub epoch: u64,
    pub target: ViewState,
}
