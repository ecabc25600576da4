//! Session state machine
//!
//! Owns the `Session` and decides which parts of the simulation may run:
//!
//! ```text
//! Idle --start--> Running --release--> Dropping --placed--> Running
//!                                          |
//!                                        missed
//!                                          v
//!            Running <--continuation-- AwaitingChoice --restart--> Running
//! ```
//!
//! Chain collaborators never touch the session directly; they go through
//! `credit_extra_life`, `grant_continuation` and `submit_and_restart`.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::highscores::BestScore;
use crate::sim::{self, Block, DeathPosition, Direction, Session, SimEvent};

/// Authoritative game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Never started
    Idle,
    /// Mover oscillating, waiting for release
    Running,
    /// Mover falling, input ignored
    Dropping,
    /// Game over; player picks continue, submit or try again
    AwaitingChoice,
}

/// Render/inspection view of the game
#[derive(Debug, Serialize)]
pub struct GameSnapshot<'a> {
    pub phase: GamePhase,
    pub epoch: u64,
    pub death: Option<DeathPosition>,
    pub session: &'a Session,
}

pub struct Game {
    session: Session,
    phase: GamePhase,
    death: Option<DeathPosition>,
    best_store: BestScore,
    /// Bumped on every fresh start; continuations keep it
    epoch: u64,
}

impl Game {
    pub fn new(seed: u64, best_store: BestScore) -> Self {
        let mut session = Session::new(seed);
        session.reset();
        session.best = best_store.value;
        Self {
            session,
            phase: GamePhase::Idle,
            death: None,
            best_store,
            epoch: 0,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn death_position(&self) -> Option<DeathPosition> {
        self.death
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn score(&self) -> u64 {
        self.session.score
    }

    pub fn best(&self) -> u64 {
        self.session.best
    }

    pub fn snapshot(&self) -> GameSnapshot<'_> {
        GameSnapshot {
            phase: self.phase,
            epoch: self.epoch,
            death: self.death,
            session: &self.session,
        }
    }

    /// New game from `Idle` or `AwaitingChoice`
    pub fn start(&mut self) -> bool {
        if !matches!(self.phase, GamePhase::Idle | GamePhase::AwaitingChoice) {
            return false;
        }
        self.session.reset();
        self.death = None;
        self.epoch += 1;
        self.phase = GamePhase::Running;
        log::info!("Game {} started (best {})", self.epoch, self.session.best);
        true
    }

    /// "Try again": drop the death position and restart without any transaction
    pub fn abandon(&mut self) -> bool {
        if self.phase != GamePhase::AwaitingChoice {
            return false;
        }
        log::info!("Abandoned run at score {}", self.session.score);
        self.start()
    }

    /// Release the mover; no-op unless running with a mover and not already dropping
    pub fn release_mover(&mut self) -> bool {
        if self.phase != GamePhase::Running || self.session.dropping {
            return false;
        }
        let Some(mover) = self.session.mover_mut() else {
            return false;
        };
        mover.moving = false;
        mover.y_offset = DROP_START_OFFSET;
        self.session.dropping = true;
        self.phase = GamePhase::Dropping;
        true
    }

    /// Primary input (tap/space): start when idle, release while running
    ///
    /// Ignored while awaiting a choice so a stray tap cannot discard a run.
    pub fn press(&mut self) -> bool {
        match self.phase {
            GamePhase::Idle => self.start(),
            GamePhase::Running => self.release_mover(),
            GamePhase::Dropping | GamePhase::AwaitingChoice => false,
        }
    }

    /// Advance one display refresh
    pub fn update(&mut self, dt: f32) -> Vec<SimEvent> {
        if self.phase == GamePhase::Idle {
            return Vec::new();
        }
        let events = sim::tick(&mut self.session, dt);
        for event in &events {
            self.on_event(event);
        }
        events
    }

    fn on_event(&mut self, event: &SimEvent) {
        match *event {
            SimEvent::RowAdvanced { row, score, perfect } => {
                if self.phase == GamePhase::Dropping {
                    self.phase = GamePhase::Running;
                }
                log::debug!("Row {} placed (score {}, perfect {})", row, score, perfect);
            }
            SimEvent::PlacementFailed { death } => {
                let score = self.session.score;
                self.death = Some(death);
                self.phase = GamePhase::AwaitingChoice;
                self.session.absorb_best(score);
                self.best_store.record(score);
                log::info!("Game over at row {} with score {}", death.row, score);
            }
        }
    }

    /// Mark a purchased extra life as available
    pub fn credit_extra_life(&mut self) {
        self.session.has_extra_life = true;
    }

    /// Resume above the death position using a credited extra life
    ///
    /// Score and speed carry over. Returns false when there is nothing to
    /// resume (not awaiting a choice, no death position, or no credit).
    pub fn grant_continuation(&mut self) -> bool {
        if self.phase != GamePhase::AwaitingChoice || !self.session.has_extra_life {
            return false;
        }
        let Some(death) = self.death.take() else {
            return false;
        };

        let base_row = death.row + 1;
        let mover_row = death.row + 2;
        self.session.blocks.push(Block::fixed(
            START_X,
            START_WIDTH,
            base_row,
            death.hue + HUE_MOVER_STEP,
        ));
        self.session.blocks.push(Block::mover(
            SIDE_PAD,
            START_WIDTH,
            mover_row,
            death.hue + 2.0 * HUE_MOVER_STEP,
            Direction::Right,
        ));
        if mover_row > CAMERA_START_ROW {
            self.session.camera_target = (mover_row - CAMERA_START_ROW) as f32 * CAMERA_RISE;
        }

        self.session.has_extra_life = false;
        self.session.game_over = false;
        self.session.dropping = false;
        self.phase = GamePhase::Running;
        log::info!(
            "Continuation granted at row {} (score {})",
            base_row,
            self.session.score
        );
        true
    }

    /// Fresh game after a confirmed score submission
    pub fn submit_and_restart(&mut self) -> bool {
        if self.phase != GamePhase::AwaitingChoice {
            return false;
        }
        self.start()
    }

    /// Merge a high score read from chain into the best score
    pub fn observe_chain_high_score(&mut self, high_score: u64) {
        if self.session.absorb_best(high_score) {
            log::debug!("Best score raised to on-chain high {}", high_score);
        }
    }
}
