use serde::{Deserialize, Serialize};

use super::portfolio::Portfolio;
use super::price::PriceCache;
use super::session::UserProfile;
use super::settings::Settings;

/// Everything that survives a restart. Serialized into the local snapshot.
///
/// This is the single owner of all portfolios; views borrow from it by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    /// All portfolios, in creation order
    pub portfolios: Vec<Portfolio>,

    /// Signed-in user, if any
    #[serde(default)]
    pub user: Option<UserProfile>,

    pub settings: Settings,

    /// Reference prices fetched for transaction entry
    pub price_cache: PriceCache,
}

impl Workspace {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn portfolio(&self, id: &str) -> Option<&Portfolio> {
        self.portfolios.iter().find(|p| p.id == id)
    }

    pub fn portfolio_mut(&mut self, id: &str) -> Option<&mut Portfolio> {
        self.portfolios.iter_mut().find(|p| p.id == id)
    }
}
