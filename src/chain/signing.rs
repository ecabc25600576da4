//! Score signing client
//!
//! The contract only accepts scores signed by the backend signer over
//! `(player, score, nonce)`. Every request gets a fresh nonce from the
//! service; replayed nonces are rejected on chain.
//!
//! Wire format (`POST /api/sign-score`):
//! request `{"player": "0x..", "score": 12}`,
//! success `{"success": true, "nonce": "0x..32 bytes", "signature": "0x..", "signer": "0x.."}`,
//! error `{"error": "..."}`.

use serde::{Deserialize, Serialize};

use super::{Address, ChainError, Nonce, Signature};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignScoreRequest {
    pub player: Address,
    pub score: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct SignScoreResponse {
    success: bool,
    nonce: Nonce,
    signature: Signature,
    signer: Address,
}

#[derive(Debug, Clone, Deserialize)]
struct SignScoreErrorBody {
    error: String,
}

/// Artifacts needed by `submitScore`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSignature {
    pub nonce: Nonce,
    pub signature: Signature,
    pub signer: Address,
}

/// Backend that authorizes score submissions
#[allow(async_fn_in_trait)]
pub trait ScoreSigner {
    async fn sign_score(&self, player: &Address, score: u64) -> Result<ScoreSignature, ChainError>;

    /// Whether the service is reachable
    async fn health(&self) -> bool;
}

/// Interpret a signing service reply
///
/// `ok` is the HTTP success flag; `body` the raw JSON.
pub fn decode_sign_response(ok: bool, body: &str) -> Result<ScoreSignature, ChainError> {
    if !ok {
        let message = serde_json::from_str::<SignScoreErrorBody>(body)
            .map(|e| e.error)
            .unwrap_or_else(|_| "failed to get score signature".to_string());
        return Err(ChainError::Signing(message));
    }

    let response: SignScoreResponse =
        serde_json::from_str(body).map_err(|e| ChainError::Decode(e.to_string()))?;
    if !response.success {
        return Err(ChainError::Signing(
            "backend rejected score signature request".to_string(),
        ));
    }

    Ok(ScoreSignature {
        nonce: response.nonce,
        signature: response.signature,
        signer: response.signer,
    })
}
