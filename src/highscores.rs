//! Local best score
//!
//! A single scalar persisted to LocalStorage, shared by every player on the
//! device. On-chain high scores are merged in by the game, not stored here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestScore {
    pub value: u64,
}

impl BestScore {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "tower_best";

    pub fn new(value: u64) -> Self {
        Self { value }
    }

    /// Keep `score` if it beats the stored best; persists on change
    pub fn record(&mut self, score: u64) -> bool {
        if score <= self.value {
            return false;
        }
        self.value = score;
        self.save();
        log::info!("New best score: {}", score);
        true
    }

    /// Load the best score from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(raw)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(value) = raw.trim().parse::<u64>() {
                    log::info!("Loaded best score {}", value);
                    return Self { value };
                }
            }
        }

        log::info!("No best score found, starting fresh");
        Self::default()
    }

    /// Save the best score to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            let _ = storage.set_item(Self::STORAGE_KEY, &self.value.to_string());
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_only_improvements() {
        let mut best = BestScore::new(10);
        assert!(!best.record(0));
        assert!(!best.record(10));
        assert!(best.record(11));
        assert_eq!(best.value, 11);
    }
}
