use log::debug;

use crate::models::settings::Settings;

use super::clarity_api::ClarityApiClient;
#[cfg(not(target_arch = "wasm32"))]
use super::yahoo_finance::YahooFinanceProvider;
use super::traits::MarketDataProvider;

/// Ordered list of market data providers.
///
/// Callers walk [`MarketDataRegistry::providers`] front to back and stop at the
/// first success, so registration order is priority order.
pub struct MarketDataRegistry {
    providers: Vec<Box<dyn MarketDataProvider>>,
}

impl MarketDataRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Backend first, Yahoo Finance as fallback.
    pub fn new_with_defaults(settings: &Settings) -> Self {
        let mut registry = Self::new();

        registry.register(Box::new(ClarityApiClient::from_settings(settings)));

        #[cfg(not(target_arch = "wasm32"))]
        {
            match YahooFinanceProvider::new() {
                Ok(yahoo) => registry.register(Box::new(yahoo)),
                Err(e) => debug!("Yahoo Finance fallback unavailable: {e}"),
            }
        }

        registry
    }

    pub fn register(&mut self, provider: Box<dyn MarketDataProvider>) {
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// All providers in priority order.
    pub fn providers(&self) -> Vec<&dyn MarketDataProvider> {
        self.providers.iter().map(|p| p.as_ref()).collect()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }
}

impl Default for MarketDataRegistry {
    fn default() -> Self {
        Self::new()
    }
}
