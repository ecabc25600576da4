//! Chain and intent errors

use std::fmt;

use super::TxHash;
use super::intent::IntentKind;

/// Failure talking to the wallet, the signing service or the contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// No wallet/address available
    NotConnected,
    /// The user declined the request in their wallet
    Rejected(String),
    /// Transport failure
    Network(String),
    /// Signing service refused or failed
    Signing(String),
    /// Included on chain but reverted
    Reverted(TxHash),
    /// Rejected by the contract before inclusion
    Contract(String),
    /// Malformed response
    Decode(String),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::NotConnected => write!(f, "wallet not connected"),
            ChainError::Rejected(msg) => write!(f, "request rejected: {}", msg),
            ChainError::Network(msg) => write!(f, "network error: {}", msg),
            ChainError::Signing(msg) => write!(f, "score signing failed: {}", msg),
            ChainError::Reverted(hash) => write!(f, "transaction {} reverted", hash),
            ChainError::Contract(msg) => write!(f, "contract error: {}", msg),
            ChainError::Decode(msg) => write!(f, "malformed response: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}

/// Why an intent could not start or did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    /// No wallet address to act for
    NoWallet,
    /// Another intent has not resolved yet
    AlreadyPending(IntentKind),
    /// Intents only start from the game-over choice
    NotAwaitingChoice,
    /// The external request or its confirmation failed
    Failed { kind: IntentKind, source: ChainError },
}

impl IntentError {
    pub fn failed(kind: IntentKind, source: ChainError) -> Self {
        IntentError::Failed { kind, source }
    }
}

impl fmt::Display for IntentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentError::NoWallet => write!(f, "connect a wallet first"),
            IntentError::AlreadyPending(kind) => {
                write!(f, "{} transaction already in progress", kind)
            }
            IntentError::NotAwaitingChoice => write!(f, "no finished game to act on"),
            IntentError::Failed { kind, source } => write!(f, "{} failed: {}", kind, source),
        }
    }
}

impl std::error::Error for IntentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IntentError::Failed { source, .. } => Some(source),
            _ => None,
        }
    }
}
