//! Wallet paths behind the bridge
//!
//! Connector wallets can wait for a receipt themselves; embedded wallets only
//! answer receipt lookups and get polled. The path is picked once at startup
//! from the bridge's `kind`.

use super::{WalletBridge, await_string, sleep, wallet_bridge};
use crate::chain::{
    Address, ChainError, ContractCall, ContractReader, Leaderboard, PlayerStats, Receipt, TxHash,
    WalletProvider,
};

pub enum AnyWallet {
    Connector(WalletBridge),
    Embedded(WalletBridge),
    /// No bridge on the page
    Disconnected,
}

impl AnyWallet {
    pub fn detect() -> Self {
        match wallet_bridge() {
            Some(bridge) if bridge.kind() == "connector" => {
                log::info!("Using connector wallet");
                AnyWallet::Connector(bridge)
            }
            Some(bridge) => {
                log::info!("Using embedded wallet ({})", bridge.kind());
                AnyWallet::Embedded(bridge)
            }
            None => {
                log::warn!("No wallet bridge found; chain features disabled");
                AnyWallet::Disconnected
            }
        }
    }

    fn bridge(&self) -> Result<&WalletBridge, ChainError> {
        match self {
            AnyWallet::Connector(bridge) | AnyWallet::Embedded(bridge) => Ok(bridge),
            AnyWallet::Disconnected => Err(ChainError::NotConnected),
        }
    }
}

fn parse_receipt(json: &str) -> Result<Receipt, ChainError> {
    serde_json::from_str(json).map_err(|e| ChainError::Decode(format!("receipt: {}", e)))
}

impl WalletProvider for AnyWallet {
    fn address(&self) -> Option<Address> {
        let raw = self.bridge().ok()?.address()?;
        match raw.parse() {
            Ok(address) => Some(address),
            Err(e) => {
                log::warn!("Wallet reported an invalid address: {}", e);
                None
            }
        }
    }

    async fn request_transaction(&self, call: &ContractCall) -> Result<TxHash, ChainError> {
        let bridge = self.bridge()?;
        let json = serde_json::to_string(call).map_err(|e| ChainError::Decode(e.to_string()))?;
        let hash = await_string(bridge.send_transaction(&json))
            .await?
            .ok_or_else(|| ChainError::Decode("wallet returned no transaction hash".to_string()))?;
        hash.parse()
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, ChainError> {
        let bridge = self.bridge()?;
        match await_string(bridge.get_transaction_receipt(&hash.to_string())).await? {
            Some(json) => parse_receipt(&json).map(Some),
            None => Ok(None),
        }
    }

    async fn delay(&self, ms: u32) {
        sleep(ms).await
    }

    async fn wait_for_receipt(&self, hash: &TxHash, poll_ms: u32) -> Result<Receipt, ChainError> {
        match self {
            AnyWallet::Connector(bridge) => {
                let json = await_string(bridge.wait_for_transaction_receipt(&hash.to_string()))
                    .await?
                    .ok_or_else(|| ChainError::Decode("empty receipt".to_string()))?;
                parse_receipt(&json)
            }
            _ => loop {
                if let Some(receipt) = self.transaction_receipt(hash).await? {
                    return Ok(receipt);
                }
                self.delay(poll_ms).await;
            },
        }
    }
}

/// Contract reads through the bridge's public client
pub struct BridgeReader {
    bridge: Option<WalletBridge>,
}

impl BridgeReader {
    pub fn detect() -> Self {
        Self {
            bridge: wallet_bridge(),
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        args: &[String],
    ) -> Result<T, ChainError> {
        let bridge = self.bridge.as_ref().ok_or(ChainError::NotConnected)?;
        let args = serde_json::to_string(args).map_err(|e| ChainError::Decode(e.to_string()))?;
        let json = await_string(bridge.read_contract(function, &args))
            .await?
            .ok_or_else(|| ChainError::Contract(format!("{} returned nothing", function)))?;
        serde_json::from_str(&json).map_err(|e| ChainError::Decode(format!("{}: {}", function, e)))
    }

    async fn read_wei(&self, function: &str, args: &[String]) -> Result<u128, ChainError> {
        let raw: String = self.read(function, args).await?;
        raw.parse()
            .map_err(|_| ChainError::Decode(format!("{}: bad amount {:?}", function, raw)))
    }
}

impl ContractReader for BridgeReader {
    async fn player_stats(&self, player: &Address) -> Result<PlayerStats, ChainError> {
        self.read("getPlayerData", &[player.to_string()]).await
    }

    async fn leaderboard(&self) -> Result<Leaderboard, ChainError> {
        self.read("getLeaderboard", &[]).await
    }

    async fn contract_balance(&self) -> Result<u128, ChainError> {
        self.read_wei("getBalance", &[]).await
    }

    async fn pending_withdrawal(&self, player: &Address) -> Result<u128, ChainError> {
        self.read_wei("getPendingWithdrawal", &[player.to_string()]).await
    }
}
