//! Transaction intent tracker
//!
//! Bookkeeping for the two async operations a finished game can start. Each
//! kind has its own `{pending, tx, last_applied}` slot, so a confirmation can
//! only ever resolve the intent that produced its hash, and a hash that was
//! already applied is ignored the second time.
//!
//! The tracker holds no game state. `confirm` hands back an `IntentEffect`
//! tagged with the game epoch captured at `begin`; the caller applies it and
//! then calls `complete`, which is when the intent stops being pending.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::IntentError;
use super::{Address, TxHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    BuyContinuation,
    SubmitScore,
}

impl IntentKind {
    pub const ALL: [IntentKind; 2] = [IntentKind::BuyContinuation, IntentKind::SubmitScore];
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentKind::BuyContinuation => write!(f, "extra life purchase"),
            IntentKind::SubmitScore => write!(f, "score submission"),
        }
    }
}

/// Handle for an intent that passed `begin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentTicket {
    pub kind: IntentKind,
    /// Game epoch the intent belongs to
    pub epoch: u64,
    /// Account acting
    pub player: Address,
}

/// What a confirmed intent asks the game to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentEffect {
    GrantContinuation { epoch: u64 },
    SubmitAndRestart { epoch: u64 },
}

impl IntentEffect {
    pub fn kind(&self) -> IntentKind {
        match self {
            IntentEffect::GrantContinuation { .. } => IntentKind::BuyContinuation,
            IntentEffect::SubmitAndRestart { .. } => IntentKind::SubmitScore,
        }
    }

    pub fn epoch(&self) -> u64 {
        match *self {
            IntentEffect::GrantContinuation { epoch } | IntentEffect::SubmitAndRestart { epoch } => {
                epoch
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct IntentSlot {
    pending: bool,
    /// Hash of the in-flight transaction, once the wallet returned one
    tx: Option<TxHash>,
    /// Last hash whose effect was handed out
    last_applied: Option<TxHash>,
    /// Confirmed; effect handed out but not yet completed
    applying: bool,
    epoch: u64,
}

#[derive(Debug, Clone, Default)]
pub struct IntentTracker {
    buy: IntentSlot,
    submit: IntentSlot,
}

impl IntentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: IntentKind) -> &IntentSlot {
        match kind {
            IntentKind::BuyContinuation => &self.buy,
            IntentKind::SubmitScore => &self.submit,
        }
    }

    fn slot_mut(&mut self, kind: IntentKind) -> &mut IntentSlot {
        match kind {
            IntentKind::BuyContinuation => &mut self.buy,
            IntentKind::SubmitScore => &mut self.submit,
        }
    }

    /// The outstanding intent, if any
    pub fn pending(&self) -> Option<IntentKind> {
        IntentKind::ALL.into_iter().find(|k| self.slot(*k).pending)
    }

    pub fn is_pending(&self, kind: IntentKind) -> bool {
        self.slot(kind).pending
    }

    /// Hash recorded for the in-flight intent of `kind`
    pub fn pending_tx(&self, kind: IntentKind) -> Option<TxHash> {
        self.slot(kind).tx
    }

    pub fn last_applied(&self, kind: IntentKind) -> Option<TxHash> {
        self.slot(kind).last_applied
    }

    /// Open an intent; rejected without any state change if one is outstanding
    /// or no wallet address is available
    pub fn begin(
        &mut self,
        kind: IntentKind,
        player: Option<Address>,
        epoch: u64,
    ) -> Result<IntentTicket, IntentError> {
        if let Some(pending) = self.pending() {
            log::warn!("Rejected {}: {} still pending", kind, pending);
            return Err(IntentError::AlreadyPending(pending));
        }
        let Some(player) = player else {
            return Err(IntentError::NoWallet);
        };

        let slot = self.slot_mut(kind);
        slot.pending = true;
        slot.tx = None;
        slot.applying = false;
        slot.epoch = epoch;
        log::info!("Began {} for {} (game {})", kind, player, epoch);

        Ok(IntentTicket {
            kind,
            epoch,
            player,
        })
    }

    /// Attach the wallet's transaction hash to the pending intent
    pub fn record_submitted(&mut self, kind: IntentKind, hash: TxHash) -> bool {
        let slot = self.slot_mut(kind);
        if !slot.pending {
            return false;
        }
        slot.tx = Some(hash);
        log::info!("{} submitted as {}", kind, hash);
        true
    }

    /// Resolve the intent of `kind` confirmed as `hash`
    ///
    /// Returns the effect at most once per hash, and only if `hash` is the
    /// transaction this kind is waiting on. The intent stays pending until
    /// `complete`, so nothing else can begin while the effect is applied.
    pub fn confirm(&mut self, kind: IntentKind, hash: &TxHash) -> Option<IntentEffect> {
        let slot = self.slot_mut(kind);
        if slot.last_applied.as_ref() == Some(hash) {
            log::debug!("Ignoring repeated confirmation of {} for {}", hash, kind);
            return None;
        }
        if slot.tx.as_ref() != Some(hash) {
            log::warn!("Ignoring confirmation of {}: not the pending {}", hash, kind);
            return None;
        }

        slot.last_applied = Some(*hash);
        slot.tx = None;
        slot.applying = true;
        log::info!("{} confirmed ({})", kind, hash);

        Some(match kind {
            IntentKind::BuyContinuation => IntentEffect::GrantContinuation { epoch: slot.epoch },
            IntentKind::SubmitScore => IntentEffect::SubmitAndRestart { epoch: slot.epoch },
        })
    }

    /// Release the intent of `kind` once its confirmed effect has been applied
    pub fn complete(&mut self, kind: IntentKind) {
        let slot = self.slot_mut(kind);
        if slot.applying {
            slot.pending = false;
            slot.applying = false;
        }
    }

    /// Clear the pending intent of `kind` after a failure
    pub fn fail(&mut self, kind: IntentKind) {
        let slot = self.slot_mut(kind);
        slot.pending = false;
        slot.tx = None;
        slot.applying = false;
    }
}
