pub mod dto;
pub mod registry;
pub mod traits;

// Provider implementations
pub mod clarity_api;
#[cfg(not(target_arch = "wasm32"))]
pub mod yahoo_finance;
