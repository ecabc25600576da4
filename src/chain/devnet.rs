//! In-memory local chain
//!
//! One ledger behind three faces: a wallet, a score signer and a contract
//! reader. It follows the game contract's rules (fixed-price extra lives,
//! signed scores with single-use nonces, top-10 leaderboard, prize
//! withdrawals) closely enough to drive the native binary and the intent
//! flow tests. Clones share the ledger.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::signing::{ScoreSignature, ScoreSigner};
use super::{
    Address, ChainError, ContractCall, ContractReader, Leaderboard, Nonce, PlayerStats, Receipt,
    Signature, TxHash, TxStatus, WalletProvider,
};
use crate::settings::DEFAULT_EXTRA_LIFE_PRICE_WEI;

/// Leaderboard length kept by the contract
pub const LEADERBOARD_SIZE: usize = 10;

struct PendingTx {
    status: TxStatus,
    /// Receipt lookups that still report "not included"
    polls_left: u32,
}

struct Ledger {
    owner: Address,
    signer: Address,
    price: u128,
    balance: u128,
    players: HashMap<Address, PlayerStats>,
    /// Best score per player, sorted descending
    board: Vec<(Address, u64)>,
    prizes: HashMap<Address, u128>,
    issued: HashMap<Nonce, (Address, u64)>,
    used_nonces: HashSet<Nonce>,
    txs: HashMap<TxHash, PendingTx>,
    tx_count: u64,
    requests: Vec<ContractCall>,
    receipt_polls: u32,
    rng: Pcg32,
    reject_next: Option<String>,
    revert_next: bool,
    receipt_delay: u32,
    signing_error: Option<String>,
}

impl Ledger {
    fn execute(&mut self, from: Address, call: &ContractCall) -> Result<(), String> {
        match call {
            ContractCall::BuyExtraLife { value } => {
                if *value != self.price {
                    return Err("incorrect payment amount".to_string());
                }
                let stats = self.players.entry(from).or_default();
                stats.extra_lives_purchased += 1;
                stats.total_spent += value;
                self.balance += value;
            }
            ContractCall::SubmitScore {
                score,
                nonce,
                signature,
            } => {
                if self.used_nonces.contains(nonce) {
                    return Err("nonce already used".to_string());
                }
                let expected = dev_signature(&self.signer, &from, *score, nonce);
                if self.issued.get(nonce) != Some(&(from, *score)) || *signature != expected {
                    return Err("invalid signature".to_string());
                }
                self.used_nonces.insert(*nonce);
                let stats = self.players.entry(from).or_default();
                stats.total_games_played += 1;
                if *score > stats.high_score {
                    stats.high_score = *score;
                }
                let best = stats.high_score;
                self.update_board(from, best);
            }
            ContractCall::WithdrawPrize => {
                let amount = self.prizes.remove(&from).unwrap_or(0);
                if amount == 0 {
                    return Err("no prize to withdraw".to_string());
                }
                self.balance = self.balance.saturating_sub(amount);
            }
            ContractCall::Withdraw => {
                if from != self.owner {
                    return Err("caller is not the owner".to_string());
                }
                self.balance = 0;
            }
        }
        Ok(())
    }

    fn update_board(&mut self, player: Address, best: u64) {
        self.board.retain(|(p, _)| *p != player);
        let pos = self
            .board
            .iter()
            .position(|(_, s)| best > *s)
            .unwrap_or(self.board.len());
        self.board.insert(pos, (player, best));
        self.board.truncate(LEADERBOARD_SIZE);
    }

    fn next_hash(&mut self) -> TxHash {
        self.tx_count += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&self.tx_count.to_be_bytes());
        TxHash(bytes)
    }
}

/// Signature the dev signer issues and the dev contract accepts
fn dev_signature(signer: &Address, player: &Address, score: u64, nonce: &Nonce) -> Signature {
    let mut bytes = Vec::with_capacity(20 + 20 + 8 + 32);
    bytes.extend_from_slice(signer.as_bytes());
    bytes.extend_from_slice(player.as_bytes());
    bytes.extend_from_slice(&score.to_be_bytes());
    bytes.extend_from_slice(nonce.as_bytes());
    Signature(bytes)
}

/// Returns `Pending` once before completing
struct YieldOnce(bool);

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

#[derive(Clone)]
pub struct DevChain {
    ledger: Rc<RefCell<Ledger>>,
    account: Option<Address>,
}

impl DevChain {
    /// Fresh chain owned by `owner`, with `owner` as the connected account
    pub fn new(owner: Address) -> Self {
        let mut signer = [0u8; 20];
        signer[0] = 0x5e;
        let ledger = Ledger {
            owner,
            signer: Address(signer),
            price: DEFAULT_EXTRA_LIFE_PRICE_WEI,
            balance: 0,
            players: HashMap::new(),
            board: Vec::new(),
            prizes: HashMap::new(),
            issued: HashMap::new(),
            used_nonces: HashSet::new(),
            txs: HashMap::new(),
            tx_count: 0,
            requests: Vec::new(),
            receipt_polls: 0,
            rng: Pcg32::seed_from_u64(0x7043_b10c),
            reject_next: None,
            revert_next: false,
            receipt_delay: 0,
            signing_error: None,
        };
        Self {
            ledger: Rc::new(RefCell::new(ledger)),
            account: Some(owner),
        }
    }

    /// Same ledger, different connected account (`None` = disconnected)
    pub fn connect(&self, account: Option<Address>) -> Self {
        Self {
            ledger: Rc::clone(&self.ledger),
            account,
        }
    }

    /// Every call the wallet was asked to send, in order
    pub fn requests(&self) -> Vec<ContractCall> {
        self.ledger.borrow().requests.clone()
    }

    pub fn receipt_polls(&self) -> u32 {
        self.ledger.borrow().receipt_polls
    }

    pub fn balance(&self) -> u128 {
        self.ledger.borrow().balance
    }

    pub fn extra_life_price(&self) -> u128 {
        self.ledger.borrow().price
    }

    /// The user declines the next wallet prompt
    pub fn reject_next(&self, reason: &str) {
        self.ledger.borrow_mut().reject_next = Some(reason.to_string());
    }

    /// The next transaction is included but reverts
    pub fn revert_next(&self) {
        self.ledger.borrow_mut().revert_next = true;
    }

    /// New transactions stay unincluded for `polls` receipt lookups
    pub fn delay_receipts(&self, polls: u32) {
        self.ledger.borrow_mut().receipt_delay = polls;
    }

    /// Signing requests fail with `reason` until cleared
    pub fn fail_signing(&self, reason: Option<&str>) {
        self.ledger.borrow_mut().signing_error = reason.map(str::to_string);
    }

    /// Owner-side prize allocation
    pub fn credit_prize(&self, player: Address, amount: u128) {
        let mut ledger = self.ledger.borrow_mut();
        *ledger.prizes.entry(player).or_default() += amount;
        ledger.balance += amount;
    }
}

impl WalletProvider for DevChain {
    fn address(&self) -> Option<Address> {
        self.account
    }

    async fn request_transaction(&self, call: &ContractCall) -> Result<TxHash, ChainError> {
        let from = self.account.ok_or(ChainError::NotConnected)?;
        let mut ledger = self.ledger.borrow_mut();
        ledger.requests.push(call.clone());
        if let Some(reason) = ledger.reject_next.take() {
            return Err(ChainError::Rejected(reason));
        }

        let status = if std::mem::take(&mut ledger.revert_next) {
            TxStatus::Reverted
        } else {
            match ledger.execute(from, call) {
                Ok(()) => TxStatus::Success,
                Err(reason) => {
                    log::warn!("Dev chain: {} reverted: {}", call.function(), reason);
                    TxStatus::Reverted
                }
            }
        };

        let hash = ledger.next_hash();
        let polls_left = ledger.receipt_delay;
        ledger.txs.insert(hash, PendingTx { status, polls_left });
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>, ChainError> {
        let mut ledger = self.ledger.borrow_mut();
        ledger.receipt_polls += 1;
        let tx = ledger
            .txs
            .get_mut(hash)
            .ok_or_else(|| ChainError::Network(format!("unknown transaction {}", hash)))?;
        if tx.polls_left > 0 {
            tx.polls_left -= 1;
            return Ok(None);
        }
        Ok(Some(Receipt {
            hash: *hash,
            status: tx.status,
        }))
    }

    async fn delay(&self, _ms: u32) {
        YieldOnce(false).await
    }
}

impl ScoreSigner for DevChain {
    async fn sign_score(&self, player: &Address, score: u64) -> Result<ScoreSignature, ChainError> {
        let mut ledger = self.ledger.borrow_mut();
        if let Some(reason) = ledger.signing_error.clone() {
            return Err(ChainError::Signing(reason));
        }
        let mut bytes = [0u8; 32];
        ledger.rng.fill(&mut bytes);
        let nonce = Nonce(bytes);
        ledger.issued.insert(nonce, (*player, score));
        let signer = ledger.signer;
        Ok(ScoreSignature {
            nonce,
            signature: dev_signature(&signer, player, score, &nonce),
            signer,
        })
    }

    async fn health(&self) -> bool {
        true
    }
}

impl ContractReader for DevChain {
    async fn player_stats(&self, player: &Address) -> Result<PlayerStats, ChainError> {
        Ok(self
            .ledger
            .borrow()
            .players
            .get(player)
            .cloned()
            .unwrap_or_default())
    }

    async fn leaderboard(&self) -> Result<Leaderboard, ChainError> {
        let ledger = self.ledger.borrow();
        Ok(Leaderboard {
            players: ledger.board.iter().map(|(p, _)| *p).collect(),
            scores: ledger.board.iter().map(|(_, s)| *s).collect(),
        })
    }

    async fn contract_balance(&self) -> Result<u128, ChainError> {
        Ok(self.ledger.borrow().balance)
    }

    async fn pending_withdrawal(&self, player: &Address) -> Result<u128, ChainError> {
        Ok(self
            .ledger
            .borrow()
            .prizes
            .get(player)
            .copied()
            .unwrap_or(0))
    }
}
