//! Chain client: runs intents end to end
//!
//! Each flow is a single async call chain with strictly ordered steps:
//! signature (score only) -> wallet submission -> receipt -> tracker
//! confirmation -> game effect. Game and tracker borrows are never held
//! across an await, so the frame loop keeps ticking while a flow waits on
//! the user or the chain.

use std::cell::{Ref, RefCell};

use super::intent::{IntentEffect, IntentKind, IntentTicket, IntentTracker};
use super::signing::ScoreSigner;
use super::{
    ChainError, ChainView, ContractCall, ContractReader, IntentError, Receipt, TxHash,
    WalletProvider,
};
use crate::game::{Game, GamePhase};
use crate::settings::Settings;

/// How a flow ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentOutcome {
    /// Confirmed and applied to the game
    Applied(IntentKind),
    /// Confirmed, but the game it belonged to was abandoned
    Stale(IntentKind),
    /// Already applied, or not the transaction this kind is waiting on
    Ignored(IntentKind),
    /// Zero score: restarted without sending anything
    RestartedWithoutTransaction,
}

/// Which contract reads to refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    /// Player stats, contract balance, pending withdrawal
    Player,
    /// Everything, including the leaderboard
    All,
}

pub struct ChainClient<W, S, R> {
    wallet: W,
    signer: S,
    reader: R,
    settings: Settings,
    tracker: RefCell<IntentTracker>,
    view: RefCell<ChainView>,
}

impl<W, S, R> ChainClient<W, S, R>
where
    W: WalletProvider,
    S: ScoreSigner,
    R: ContractReader,
{
    pub fn new(wallet: W, signer: S, reader: R, settings: Settings) -> Self {
        Self {
            wallet,
            signer,
            reader,
            settings,
            tracker: RefCell::new(IntentTracker::new()),
            view: RefCell::new(ChainView::default()),
        }
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Last refreshed contract state
    pub fn view(&self) -> Ref<'_, ChainView> {
        self.view.borrow()
    }

    /// Intent bookkeeping (read-only)
    pub fn tracker(&self) -> Ref<'_, IntentTracker> {
        self.tracker.borrow()
    }

    /// The outstanding intent, if any
    pub fn pending_intent(&self) -> Option<IntentKind> {
        self.tracker.borrow().pending()
    }

    /// Pay for a continuation and resume above the death position
    pub async fn buy_continuation(&self, game: &RefCell<Game>) -> Result<IntentOutcome, IntentError> {
        let ticket = self.begin(IntentKind::BuyContinuation, game)?;
        let call = ContractCall::BuyExtraLife {
            value: self.settings.extra_life_price_wei,
        };
        let hash = self.send(&ticket, &call).await?;
        self.await_confirmation(&ticket, &hash).await?;
        Ok(self.on_confirmed(game, ticket.kind, &hash).await)
    }

    /// Sign and submit the finished score, then start a fresh game
    ///
    /// A zero score restarts immediately with no transaction.
    pub async fn submit_score(&self, game: &RefCell<Game>) -> Result<IntentOutcome, IntentError> {
        let score = {
            let mut g = game.borrow_mut();
            if g.phase() != GamePhase::AwaitingChoice {
                return Err(IntentError::NotAwaitingChoice);
            }
            if g.score() == 0 {
                g.submit_and_restart();
                return Ok(IntentOutcome::RestartedWithoutTransaction);
            }
            g.score()
        };

        let ticket = self.begin(IntentKind::SubmitScore, game)?;
        let signed = match self.signer.sign_score(&ticket.player, score).await {
            Ok(signed) => signed,
            Err(e) => return Err(self.fail(&ticket, e)),
        };
        log::debug!("Score {} signed by {}", score, signed.signer);

        let call = ContractCall::SubmitScore {
            score,
            nonce: signed.nonce,
            signature: signed.signature,
        };
        let hash = self.send(&ticket, &call).await?;
        self.await_confirmation(&ticket, &hash).await?;
        Ok(self.on_confirmed(game, ticket.kind, &hash).await)
    }

    /// Confirmation watch entry point; safe to call repeatedly with the same hash
    pub async fn on_confirmed(
        &self,
        game: &RefCell<Game>,
        kind: IntentKind,
        hash: &TxHash,
    ) -> IntentOutcome {
        let effect = self.tracker.borrow_mut().confirm(kind, hash);
        let Some(effect) = effect else {
            return IntentOutcome::Ignored(kind);
        };
        // Still pending while the effect runs so no other intent can begin
        let outcome = self.finish(game, effect).await;
        self.tracker.borrow_mut().complete(kind);
        outcome
    }

    async fn finish(&self, game: &RefCell<Game>, effect: IntentEffect) -> IntentOutcome {
        let kind = effect.kind();
        let applied = match effect {
            IntentEffect::GrantContinuation { epoch } => {
                let applied = {
                    let mut g = game.borrow_mut();
                    if g.epoch() == epoch && g.phase() == GamePhase::AwaitingChoice {
                        g.credit_extra_life();
                        g.grant_continuation()
                    } else {
                        false
                    }
                };
                self.refresh_logged(game, RefreshScope::Player).await;
                applied
            }
            IntentEffect::SubmitAndRestart { epoch } => {
                // Leaderboard must show the new score before the board clears
                if self.settings.settle_delay_ms > 0 {
                    self.wallet.delay(self.settings.settle_delay_ms).await;
                }
                self.refresh_logged(game, RefreshScope::All).await;
                let mut g = game.borrow_mut();
                g.epoch() == epoch && g.submit_and_restart()
            }
        };

        if applied {
            IntentOutcome::Applied(kind)
        } else {
            log::warn!("{} confirmed after its game ended; nothing applied", kind);
            IntentOutcome::Stale(kind)
        }
    }

    fn begin(&self, kind: IntentKind, game: &RefCell<Game>) -> Result<IntentTicket, IntentError> {
        let (phase, epoch) = {
            let g = game.borrow();
            (g.phase(), g.epoch())
        };
        let mut tracker = self.tracker.borrow_mut();
        if let Some(pending) = tracker.pending() {
            return Err(IntentError::AlreadyPending(pending));
        }
        if phase != GamePhase::AwaitingChoice {
            return Err(IntentError::NotAwaitingChoice);
        }
        tracker.begin(kind, self.wallet.address(), epoch)
    }

    async fn send(&self, ticket: &IntentTicket, call: &ContractCall) -> Result<TxHash, IntentError> {
        match self.wallet.request_transaction(call).await {
            Ok(hash) => {
                self.tracker.borrow_mut().record_submitted(ticket.kind, hash);
                Ok(hash)
            }
            Err(e) => Err(self.fail(ticket, e)),
        }
    }

    async fn await_confirmation(
        &self,
        ticket: &IntentTicket,
        hash: &TxHash,
    ) -> Result<Receipt, IntentError> {
        let receipt = self
            .wallet
            .wait_for_receipt(hash, self.settings.receipt_poll_ms)
            .await
            .and_then(Receipt::into_result);
        receipt.map_err(|e| self.fail(ticket, e))
    }

    fn fail(&self, ticket: &IntentTicket, err: ChainError) -> IntentError {
        self.tracker.borrow_mut().fail(ticket.kind);
        log::error!("{} failed: {}", ticket.kind, err);
        IntentError::failed(ticket.kind, err)
    }

    /// Re-read contract state; the on-chain high score feeds the best score
    pub async fn refresh(&self, game: &RefCell<Game>, scope: RefreshScope) -> Result<(), ChainError> {
        if let Some(player) = self.wallet.address() {
            let stats = self.reader.player_stats(&player).await?;
            game.borrow_mut().observe_chain_high_score(stats.high_score);
            let pending = self.reader.pending_withdrawal(&player).await?;
            let mut view = self.view.borrow_mut();
            view.player = Some(stats);
            view.pending_withdrawal = Some(pending);
        }

        let balance = self.reader.contract_balance().await?;
        self.view.borrow_mut().balance = Some(balance);

        if scope == RefreshScope::All {
            let board = self.reader.leaderboard().await?;
            self.view.borrow_mut().leaderboard = Some(board);
        }
        Ok(())
    }

    async fn refresh_logged(&self, game: &RefCell<Game>, scope: RefreshScope) {
        if let Err(e) = self.refresh(game, scope).await {
            log::warn!("Chain refresh failed: {}", e);
        }
    }

    /// Claim a pending prize
    pub async fn withdraw_prize(&self, game: &RefCell<Game>) -> Result<Receipt, ChainError> {
        self.plain_write(game, &ContractCall::WithdrawPrize).await
    }

    /// Owner-only sweep of the contract balance
    pub async fn withdraw(&self, game: &RefCell<Game>) -> Result<Receipt, ChainError> {
        self.plain_write(game, &ContractCall::Withdraw).await
    }

    async fn plain_write(&self, game: &RefCell<Game>, call: &ContractCall) -> Result<Receipt, ChainError> {
        if self.wallet.address().is_none() {
            return Err(ChainError::NotConnected);
        }
        let hash = self.wallet.request_transaction(call).await?;
        log::info!("{} submitted as {}", call.function(), hash);
        let receipt = self
            .wallet
            .wait_for_receipt(&hash, self.settings.receipt_poll_ms)
            .await?
            .into_result()?;
        self.refresh_logged(game, RefreshScope::Player).await;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Waker};

    use super::*;
    use crate::chain::devnet::DevChain;
    use crate::chain::{Address, TxStatus};
    use crate::game::testing::finished;
    use pollster::block_on;

    type Client = ChainClient<DevChain, DevChain, DevChain>;

    fn player() -> Address {
        Address([0x42; 20])
    }

    fn client_for(chain: &DevChain) -> Client {
        let settings = Settings {
            settle_delay_ms: 0,
            ..Settings::default()
        };
        ChainClient::new(chain.clone(), chain.clone(), chain.clone(), settings)
    }

    fn setup(rows: u64) -> (DevChain, Client, RefCell<Game>) {
        let chain = DevChain::new(player());
        let client = client_for(&chain);
        (chain, client, RefCell::new(finished(7, rows)))
    }

    /// Poll a flow once; the dev wallet suspends it at its first receipt wait
    fn suspend<F: Future>(flow: std::pin::Pin<&mut F>) {
        let mut cx = Context::from_waker(Waker::noop());
        assert!(flow.poll(&mut cx).is_pending());
    }

    #[test]
    fn test_buy_continuation_keeps_score() {
        let (chain, client, game) = setup(3);
        let death = game.borrow().death_position().unwrap();

        let outcome = block_on(client.buy_continuation(&game)).unwrap();
        assert_eq!(outcome, IntentOutcome::Applied(IntentKind::BuyContinuation));

        let g = game.borrow();
        assert_eq!(g.phase(), GamePhase::Running);
        assert_eq!(g.score(), 3);
        assert_eq!(g.session().mover().unwrap().row, death.row + 2);
        assert_eq!(client.pending_intent(), None);
        assert_eq!(
            chain.requests(),
            vec![ContractCall::BuyExtraLife {
                value: chain.extra_life_price()
            }]
        );
        let stats = client.view().player.clone().unwrap();
        assert_eq!(stats.extra_lives_purchased, 1);
    }

    #[test]
    fn test_submit_score_records_and_restarts() {
        let (chain, client, game) = setup(5);
        let epoch = game.borrow().epoch();

        let outcome = block_on(client.submit_score(&game)).unwrap();
        assert_eq!(outcome, IntentOutcome::Applied(IntentKind::SubmitScore));

        let g = game.borrow();
        assert_eq!(g.phase(), GamePhase::Running);
        assert_eq!(g.score(), 0);
        assert_eq!(g.epoch(), epoch + 1);
        assert_eq!(g.session().blocks.len(), 2);
        assert_eq!(g.best(), 5);

        let requests = chain.requests();
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], ContractCall::SubmitScore { score: 5, .. }));
        let view = client.view();
        assert_eq!(view.leaderboard.as_ref().unwrap().rank_of(&player()), Some(1));
        assert_eq!(view.player.as_ref().unwrap().high_score, 5);
    }

    #[test]
    fn test_zero_score_restarts_without_transaction() {
        let (chain, client, game) = setup(0);
        let outcome = block_on(client.submit_score(&game)).unwrap();
        assert_eq!(outcome, IntentOutcome::RestartedWithoutTransaction);
        assert_eq!(game.borrow().phase(), GamePhase::Running);
        assert!(chain.requests().is_empty());
    }

    #[test]
    fn test_repeated_confirmation_applies_once() {
        let (_chain, client, game) = setup(2);
        block_on(client.buy_continuation(&game)).unwrap();
        let hash = client
            .tracker()
            .last_applied(IntentKind::BuyContinuation)
            .unwrap();
        let blocks = game.borrow().session().blocks.len();

        let again = block_on(client.on_confirmed(&game, IntentKind::BuyContinuation, &hash));
        assert_eq!(again, IntentOutcome::Ignored(IntentKind::BuyContinuation));
        assert_eq!(game.borrow().session().blocks.len(), blocks);
    }

    #[test]
    fn test_buy_hash_never_confirms_a_submission() {
        let (_chain, client, game) = setup(4);
        block_on(client.buy_continuation(&game)).unwrap();
        let hash = client
            .tracker()
            .last_applied(IntentKind::BuyContinuation)
            .unwrap();

        let crossed = block_on(client.on_confirmed(&game, IntentKind::SubmitScore, &hash));
        assert_eq!(crossed, IntentOutcome::Ignored(IntentKind::SubmitScore));
        assert_eq!(game.borrow().score(), 4);
        assert_eq!(game.borrow().phase(), GamePhase::Running);
    }

    #[test]
    fn test_second_intent_rejected_while_first_in_flight() {
        let (chain, client, game) = setup(3);
        chain.delay_receipts(1);

        let mut submit = pin!(client.submit_score(&game));
        suspend(submit.as_mut());
        assert_eq!(client.pending_intent(), Some(IntentKind::SubmitScore));

        let err = block_on(client.buy_continuation(&game)).unwrap_err();
        assert_eq!(err, IntentError::AlreadyPending(IntentKind::SubmitScore));
        let err = block_on(client.submit_score(&game)).unwrap_err();
        assert_eq!(err, IntentError::AlreadyPending(IntentKind::SubmitScore));
        assert_eq!(chain.requests().len(), 1);

        let outcome = block_on(submit).unwrap();
        assert_eq!(outcome, IntentOutcome::Applied(IntentKind::SubmitScore));
        // The submission never appended a continuation
        assert_eq!(game.borrow().session().blocks.len(), 2);
        assert_eq!(game.borrow().score(), 0);
    }

    #[test]
    fn test_wallet_rejection_returns_to_choice() {
        let (chain, client, game) = setup(2);
        chain.reject_next("User rejected the request");

        let err = block_on(client.buy_continuation(&game)).unwrap_err();
        assert!(matches!(
            err,
            IntentError::Failed {
                kind: IntentKind::BuyContinuation,
                source: ChainError::Rejected(_)
            }
        ));
        assert_eq!(game.borrow().phase(), GamePhase::AwaitingChoice);
        assert_eq!(client.pending_intent(), None);

        // Retry goes through
        let outcome = block_on(client.buy_continuation(&game)).unwrap();
        assert_eq!(outcome, IntentOutcome::Applied(IntentKind::BuyContinuation));
    }

    #[test]
    fn test_reverted_purchase_grants_nothing() {
        let (chain, client, game) = setup(2);
        chain.revert_next();
        let blocks = game.borrow().session().blocks.len();

        let err = block_on(client.buy_continuation(&game)).unwrap_err();
        assert!(matches!(
            err,
            IntentError::Failed {
                source: ChainError::Reverted(_),
                ..
            }
        ));
        let g = game.borrow();
        assert_eq!(g.phase(), GamePhase::AwaitingChoice);
        assert_eq!(g.session().blocks.len(), blocks);
        assert!(!g.session().has_extra_life);
        assert_eq!(client.pending_intent(), None);
    }

    #[test]
    fn test_signing_failure_sends_nothing() {
        let (chain, client, game) = setup(6);
        chain.fail_signing(Some("backend down"));

        let err = block_on(client.submit_score(&game)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "score submission failed: score signing failed: backend down"
        );
        assert!(chain.requests().is_empty());
        assert_eq!(game.borrow().phase(), GamePhase::AwaitingChoice);
        assert_eq!(game.borrow().score(), 6);

        chain.fail_signing(None);
        assert!(block_on(client.submit_score(&game)).is_ok());
    }

    #[test]
    fn test_no_wallet() {
        let chain = DevChain::new(player()).connect(None);
        let client = client_for(&chain);
        let game = RefCell::new(finished(7, 1));
        assert_eq!(
            block_on(client.buy_continuation(&game)),
            Err(IntentError::NoWallet)
        );
        assert_eq!(
            block_on(client.submit_score(&game)),
            Err(IntentError::NoWallet)
        );
        assert_eq!(client.pending_intent(), None);
    }

    #[test]
    fn test_intents_need_a_finished_game() {
        let chain = DevChain::new(player());
        let client = client_for(&chain);
        let mut fresh = Game::new(1, Default::default());
        fresh.start();
        let game = RefCell::new(fresh);
        assert_eq!(
            block_on(client.buy_continuation(&game)),
            Err(IntentError::NotAwaitingChoice)
        );
        assert_eq!(
            block_on(client.submit_score(&game)),
            Err(IntentError::NotAwaitingChoice)
        );
        assert!(chain.requests().is_empty());
    }

    #[test]
    fn test_late_confirmation_after_abandon_is_stale() {
        let (chain, client, game) = setup(3);
        chain.delay_receipts(1);

        let mut buy = pin!(client.buy_continuation(&game));
        suspend(buy.as_mut());
        assert!(game.borrow_mut().abandon());

        let outcome = block_on(buy).unwrap();
        assert_eq!(outcome, IntentOutcome::Stale(IntentKind::BuyContinuation));
        let g = game.borrow();
        assert_eq!(g.phase(), GamePhase::Running);
        assert_eq!(g.score(), 0);
        assert_eq!(g.session().blocks.len(), 2);
        assert!(!g.session().has_extra_life);
        assert_eq!(client.pending_intent(), None);
    }

    #[test]
    fn test_slow_receipt_is_polled_until_included() {
        let (chain, client, game) = setup(1);
        chain.delay_receipts(3);
        let outcome = block_on(client.buy_continuation(&game)).unwrap();
        assert_eq!(outcome, IntentOutcome::Applied(IntentKind::BuyContinuation));
        assert_eq!(chain.receipt_polls(), 4);
    }

    #[test]
    fn test_withdraw_prize_clears_pending_amount() {
        let (chain, client, game) = setup(1);
        chain.credit_prize(player(), 500);
        block_on(client.refresh(&game, RefreshScope::Player)).unwrap();
        assert!(client.view().has_pending_prize());

        let receipt = block_on(client.withdraw_prize(&game)).unwrap();
        assert_eq!(receipt.status, TxStatus::Success);
        assert!(!client.view().has_pending_prize());
        assert_eq!(client.view().balance, Some(0));
    }

    #[test]
    fn test_withdraw_without_prize_reverts() {
        let (_chain, client, game) = setup(1);
        assert!(matches!(
            block_on(client.withdraw_prize(&game)),
            Err(ChainError::Reverted(_))
        ));
    }

    #[test]
    fn test_no_intent_begins_while_submission_settles() {
        let chain = DevChain::new(player());
        let client = ChainClient::new(
            chain.clone(),
            chain.clone(),
            chain.clone(),
            Settings {
                settle_delay_ms: 1500,
                ..Settings::default()
            },
        );
        let game = RefCell::new(finished(7, 3));

        // Receipt is immediate, so the first suspension is the settle delay
        let mut submit = pin!(client.submit_score(&game));
        suspend(submit.as_mut());
        assert!(client.tracker().last_applied(IntentKind::SubmitScore).is_some());
        assert_eq!(game.borrow().phase(), GamePhase::AwaitingChoice);
        assert_eq!(client.pending_intent(), Some(IntentKind::SubmitScore));

        assert_eq!(
            block_on(client.buy_continuation(&game)),
            Err(IntentError::AlreadyPending(IntentKind::SubmitScore))
        );
        assert_eq!(chain.requests().len(), 1);

        let outcome = block_on(submit).unwrap();
        assert_eq!(outcome, IntentOutcome::Applied(IntentKind::SubmitScore));
        assert_eq!(game.borrow().score(), 0);
        assert_eq!(game.borrow().phase(), GamePhase::Running);
        assert_eq!(client.pending_intent(), None);
    }

    #[test]
    fn test_abandon_is_not_blocked_by_pending_submission() {
        let (chain, client, game) = setup(4);
        chain.delay_receipts(1);

        let mut submit = pin!(client.submit_score(&game));
        suspend(submit.as_mut());
        assert_eq!(client.pending_intent(), Some(IntentKind::SubmitScore));
        assert!(game.borrow_mut().abandon());
        let epoch = game.borrow().epoch();

        let outcome = block_on(submit).unwrap();
        assert_eq!(outcome, IntentOutcome::Stale(IntentKind::SubmitScore));
        let g = game.borrow();
        assert_eq!(g.epoch(), epoch);
        assert_eq!(g.phase(), GamePhase::Running);
        assert_eq!(g.score(), 0);
        assert_eq!(client.pending_intent(), None);
    }

    #[test]
    fn test_owner_withdraw_sweeps_balance() {
        let (chain, client, game) = setup(1);
        block_on(client.buy_continuation(&game)).unwrap();
        assert_eq!(client.view().balance, Some(chain.extra_life_price()));

        let receipt = block_on(client.withdraw(&game)).unwrap();
        assert_eq!(receipt.status, TxStatus::Success);
        assert_eq!(chain.balance(), 0);
        assert_eq!(client.view().balance, Some(0));
    }

    #[test]
    fn test_withdraw_by_non_owner_reverts() {
        let chain = DevChain::new(player());
        chain.credit_prize(Address([0x07; 20]), 300);
        let stranger = client_for(&chain.connect(Some(Address([0x07; 20]))));
        let game = RefCell::new(finished(7, 1));

        assert!(matches!(
            block_on(stranger.withdraw(&game)),
            Err(ChainError::Reverted(_))
        ));
        assert_eq!(chain.balance(), 300);
    }

    #[test]
    fn test_refresh_raises_best_from_chain() {
        let (chain, client, game) = setup(2);
        let other = chain.connect(Some(player()));
        let signed = block_on(other.sign_score(&player(), 40)).unwrap();
        let call = ContractCall::SubmitScore {
            score: 40,
            nonce: signed.nonce,
            signature: signed.signature,
        };
        block_on(other.request_transaction(&call)).unwrap();

        block_on(client.refresh(&game, RefreshScope::All)).unwrap();
        assert_eq!(game.borrow().best(), 40);
        assert_eq!(client.view().leaderboard.as_ref().unwrap().scores, vec![40]);
    }
}
