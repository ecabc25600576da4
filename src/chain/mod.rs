//! On-chain collaborators and transaction intents
//!
//! The game contract is reached through three capabilities:
//! - `WalletProvider`: the connected address, transaction submission and
//!   receipts (one implementation per wallet path, chosen at startup)
//! - `ContractReader`: poll-refreshable contract state
//! - `ScoreSigner`: backend signatures authorizing a score submission
//!
//! `ChainClient` ties them to the `IntentTracker`, which guarantees that each
//! confirmed transaction reaches the game exactly once and only as the kind
//! of intent that produced it.

pub mod client;
pub mod devnet;
pub mod error;
pub mod intent;
pub mod signing;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use client::{ChainClient, IntentOutcome};
pub use devnet::DevChain;
pub use error::{ChainError, IntentError};
pub use intent::{IntentEffect, IntentKind, IntentTicket, IntentTracker};
pub use signing::{ScoreSignature, ScoreSigner};

/// Fixed-size byte strings written as `0x`-prefixed hex
macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = ChainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let mut out = [0u8; $len];
                hex::decode_to_slice(raw, &mut out).map_err(|e| {
                    ChainError::Decode(format!("{} {:?}: {}", stringify!($name), s, e))
                })?;
                Ok(Self(out))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// 20-byte account or contract address
    Address,
    20
);
hex_bytes!(
    /// Transaction identifier
    TxHash,
    32
);
hex_bytes!(
    /// Single-use value bound into a score signature
    Nonce,
    32
);

/// Signature bytes issued by the signing service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(pub Vec<u8>);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl FromStr for Signature {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(raw)
            .map(Signature)
            .map_err(|e| ChainError::Decode(format!("signature: {}", e)))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Wei amounts travel as decimal strings; JS numbers cannot hold them
mod wei_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A write to the game contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "function", rename_all = "camelCase")]
pub enum ContractCall {
    /// Fixed-price payable purchase of a continuation
    BuyExtraLife {
        #[serde(with = "wei_string")]
        value: u128,
    },
    /// Record a signed score
    SubmitScore {
        score: u64,
        nonce: Nonce,
        signature: Signature,
    },
    /// Claim a pending prize
    WithdrawPrize,
    /// Owner-only sweep of the contract balance
    Withdraw,
}

impl ContractCall {
    /// Contract function name
    pub fn function(&self) -> &'static str {
        match self {
            ContractCall::BuyExtraLife { .. } => "buyExtraLife",
            ContractCall::SubmitScore { .. } => "submitScore",
            ContractCall::WithdrawPrize => "withdrawPrize",
            ContractCall::Withdraw => "withdraw",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Reverted,
}

/// Outcome of an included transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(rename = "transactionHash")]
    pub hash: TxHash,
    pub status: TxStatus,
}

impl Receipt {
    /// `Ok(self)` when successful, `Reverted` otherwise
    pub fn into_result(self) -> Result<Receipt, ChainError> {
        match self.status {
            TxStatus::Success => Ok(self),
            TxStatus::Reverted => Err(ChainError::Reverted(self.hash)),
        }
    }
}

/// Per-player contract statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub high_score: u64,
    pub total_games_played: u64,
    pub extra_lives_purchased: u64,
    #[serde(with = "wei_string")]
    pub total_spent: u128,
}

/// Leaderboard as parallel lists, best first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub players: Vec<Address>,
    pub scores: Vec<u64>,
}

impl Leaderboard {
    pub fn entries(&self) -> impl Iterator<Item = (&Address, u64)> {
        self.players.iter().zip(self.scores.iter().copied())
    }

    /// 1-based rank of `player`, if listed
    pub fn rank_of(&self, player: &Address) -> Option<usize> {
        self.players.iter().position(|p| p == player).map(|i| i + 1)
    }
}

/// Last-read contract state; fields stay `None` until first read
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChainView {
    pub player: Option<PlayerStats>,
    pub leaderboard: Option<Leaderboard>,
    pub balance: Option<u128>,
    pub pending_withdrawal: Option<u128>,
}

impl ChainView {
    pub fn has_pending_prize(&self) -> bool {
        self.pending_withdrawal.is_some_and(|w| w > 0)
    }
}

/// Wallet capability the intent flows are written against
///
/// Providers without a native receipt wait get the polling default.
#[allow(async_fn_in_trait)]
pub trait WalletProvider {
    /// Connected account, if any
    fn address(&self) -> Option<Address>;

    /// Ask the wallet to sign and send `call`; resolves once a hash exists
    async fn request_transaction(&self, call: &ContractCall) -> Result<TxHash, ChainError>;

    /// Receipt lookup; `None` while the transaction is not yet included
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, ChainError>;

    /// Suspend the calling flow for `ms` milliseconds
    async fn delay(&self, ms: u32);

    /// Wait until `hash` is included
    async fn wait_for_receipt(&self, hash: &TxHash, poll_ms: u32) -> Result<Receipt, ChainError> {
        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            self.delay(poll_ms).await;
        }
    }
}

/// Read side of the game contract
#[allow(async_fn_in_trait)]
pub trait ContractReader {
    async fn player_stats(&self, player: &Address) -> Result<PlayerStats, ChainError>;
    async fn leaderboard(&self) -> Result<Leaderboard, ChainError>;
    async fn contract_balance(&self) -> Result<u128, ChainError>;
    async fn pending_withdrawal(&self, player: &Address) -> Result<u128, ChainError>;
}

/// `0x1234...abcd`
pub fn format_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Wei to AVAX with four decimals
pub fn format_avax(wei: u128) -> String {
    format!("{:.4}", wei as f64 / 1e18)
}
