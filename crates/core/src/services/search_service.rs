use crate::models::market::{SymbolInfo, SymbolMatch};

/// Maximum number of suggestions returned for the ticker autocomplete.
pub const MAX_RESULTS: usize = 10;

/// Ranks a symbol master list against what the user typed.
pub struct SearchService;

impl SearchService {
    pub fn new() -> Self {
        Self
    }

    /// Score one entry. 0 means no match.
    ///
    /// exact symbol 100, symbol prefix 80, name prefix 60, symbol contains 40,
    /// name contains 20.
    pub fn score(&self, info: &SymbolInfo, query: &str) -> u8 {
        let symbol = info.symbol.to_uppercase();
        let name = info.name.to_uppercase();
        if symbol == query {
            100
        } else if symbol.starts_with(query) {
            80
        } else if name.starts_with(query) {
            60
        } else if symbol.contains(query) {
            40
        } else if name.contains(query) {
            20
        } else {
            0
        }
    }

    /// Best matches first, at most [`MAX_RESULTS`]. Ties keep list order.
    pub fn rank(&self, symbols: &[SymbolInfo], query: &str) -> Vec<SymbolMatch> {
        let query = query.trim().to_uppercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<SymbolMatch> = symbols
            .iter()
            .filter_map(|s| {
                let score = self.score(s, &query);
                (score > 0).then(|| SymbolMatch {
                    symbol: s.symbol.clone(),
                    name: s.name.clone(),
                    score,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches.truncate(MAX_RESULTS);
        matches
    }
}

impl Default for SearchService {
    fn default() -> Self {
        Self::new()
    }
}
