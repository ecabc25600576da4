//! Chain and service settings
//!
//! Persisted separately from the best score in LocalStorage. Native builds
//! read overrides from the environment instead.

use serde::{Deserialize, Serialize};

use crate::chain::Address;

/// 0.1 AVAX in wei
pub const DEFAULT_EXTRA_LIFE_PRICE_WEI: u128 = 100_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the score signing service
    pub signing_api_url: String,
    /// Chain the contract lives on (43114 = Avalanche C-Chain)
    pub chain_id: u64,
    /// Deployed game contract
    pub contract_address: Option<Address>,
    /// Value sent with `buyExtraLife`
    pub extra_life_price_wei: u128,
    /// Receipt lookup interval when the wallet has no wait primitive
    pub receipt_poll_ms: u32,
    /// How often chain reads are refreshed in the background
    pub refresh_interval_ms: u32,
    /// Delay after a score confirmation before re-reading the leaderboard
    pub settle_delay_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            signing_api_url: "http://localhost:3001".to_string(),
            chain_id: 43114,
            contract_address: None,
            extra_life_price_wei: DEFAULT_EXTRA_LIFE_PRICE_WEI,
            receipt_poll_ms: 1000,
            refresh_interval_ms: 5000,
            settle_delay_ms: 1500,
        }
    }
}

impl Settings {
    /// Signing endpoint
    pub fn sign_score_url(&self) -> String {
        format!("{}/api/sign-score", self.signing_api_url.trim_end_matches('/'))
    }

    /// Signing service health endpoint
    pub fn health_url(&self) -> String {
        format!("{}/health", self.signing_api_url.trim_end_matches('/'))
    }

    /// Human-readable network name
    pub fn network_name(&self) -> &'static str {
        match self.chain_id {
            43114 => "Avalanche",
            43113 => "Avalanche Fuji",
            _ => "Unknown",
        }
    }

    /// Apply `TOWER_*` overrides from a key lookup
    ///
    /// Malformed values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TOWER_SIGNING_API_URL") {
            self.signing_api_url = url;
        }
        if let Some(raw) = lookup("TOWER_CHAIN_ID") {
            match raw.parse() {
                Ok(id) => self.chain_id = id,
                Err(_) => log::warn!("Ignoring invalid TOWER_CHAIN_ID {:?}", raw),
            }
        }
        if let Some(raw) = lookup("TOWER_CONTRACT_ADDRESS") {
            match raw.parse() {
                Ok(addr) => self.contract_address = Some(addr),
                Err(e) => log::warn!("Ignoring invalid TOWER_CONTRACT_ADDRESS: {}", e),
            }
        }
    }

    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "tower_blocks_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(settings) = serde_json::from_str(&json) {
                    log::info!("Loaded settings from LocalStorage");
                    return settings;
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Defaults overlaid with environment variables
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        let mut settings = Self::default();
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_urls_trim_trailing_slash() {
        let settings = Settings {
            signing_api_url: "https://sign.example/".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.sign_score_url(), "https://sign.example/api/sign-score");
        assert_eq!(settings.health_url(), "https://sign.example/health");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("TOWER_SIGNING_API_URL", "http://signer:9000"),
            ("TOWER_CHAIN_ID", "43113"),
            ("TOWER_CONTRACT_ADDRESS", "0x00000000000000000000000000000000000000aa"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.signing_api_url, "http://signer:9000");
        assert_eq!(settings.chain_id, 43113);
        assert_eq!(settings.network_name(), "Avalanche Fuji");
        assert!(settings.contract_address.is_some());
    }

    #[test]
    fn test_bad_override_ignored() {
        let mut settings = Settings::default();
        settings.apply_overrides(|k| (k == "TOWER_CHAIN_ID").then(|| "mainnet".to_string()));
        assert_eq!(settings.chain_id, 43114);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"chain_id": 43113}"#).unwrap();
        assert_eq!(settings.chain_id, 43113);
        assert_eq!(settings.receipt_poll_ms, 1000);
        assert_eq!(settings.extra_life_price_wei, DEFAULT_EXTRA_LIFE_PRICE_WEI);
    }
}
