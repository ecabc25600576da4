//! Tower Blocks - a block-stacking arcade game with on-chain continues
//!
//! Core modules:
//! - `sim`: Stacking simulation (mover motion, drop, overlap/trim, debris, camera)
//! - `clock`: Animation-frame clock driving the simulation
//! - `game`: Session state machine (idle, running, dropping, awaiting choice)
//! - `chain`: Transaction intents, score signing and contract collaborators
//! - `platform`: Browser bindings (wallet bridge, fetch, timers, render hook)

pub mod chain;
pub mod clock;
pub mod game;
pub mod highscores;
#[cfg(target_arch = "wasm32")]
pub mod platform;
pub mod settings;
pub mod sim;

pub use clock::FrameClock;
pub use game::{Game, GamePhase};
pub use highscores::BestScore;
pub use settings::Settings;

/// Game configuration constants
///
/// Distances are canvas pixels, times are reference frames (1/60 s).
pub mod consts {
    /// Canvas dimensions
    pub const CANVAS_WIDTH: f32 = 360.0;
    pub const CANVAS_HEIGHT: f32 = 560.0;

    /// Reference frame duration in milliseconds
    pub const FRAME_MS: f64 = 1000.0 / 60.0;
    /// Largest dt handed to the simulation in one tick (frames)
    pub const MAX_FRAME_DT: f32 = 3.0;

    /// Block slab thickness and row spacing
    pub const TOP_THICK: f32 = 22.0;
    pub const STEP_Y: f32 = TOP_THICK + 18.0;

    /// Full width of a base block
    pub const START_WIDTH: f32 = 180.0;
    pub const START_X: f32 = (CANVAS_WIDTH - START_WIDTH) / 2.0;
    /// Horizontal bounds padding for the mover
    pub const SIDE_PAD: f32 = 26.0;

    /// Mover speed (px/frame) and per-row gain
    pub const BASE_SPEED: f32 = 2.0;
    pub const SPEED_GAIN: f32 = 0.035;

    /// Drop animation: start offset above the row and fall rate (px/frame)
    pub const DROP_START_OFFSET: f32 = -200.0;
    pub const DROP_SPEED: f32 = 9.5 * 2.2;

    /// Edge snap tolerance for "perfect" placements
    pub const PERFECT_TOL: f32 = 3.0;

    /// Camera starts rising once rows pass this index
    pub const CAMERA_START_ROW: u32 = 7;
    pub const CAMERA_RISE: f32 = STEP_Y;
    /// Fraction of the remaining camera distance covered per frame
    pub const CAMERA_EASE: f32 = 0.1;

    /// Debris
    pub const SLICE_LIFE: f32 = 130.0;
    pub const SLICE_DRIFT: f32 = 2.3;
    pub const SLICE_GRAVITY: f32 = 0.28;

    /// Hue seeding (degrees)
    pub const HUE_BASE: f32 = 260.0;
    pub const HUE_SPREAD: f32 = 70.0;
    pub const HUE_MOVER_STEP: f32 = 10.0;
    pub const HUE_ROW_STEP: f32 = 8.0;
}

/// Clamp `v` into `[lo, hi]`
#[inline]
pub fn clamp(v: f32, lo: f32, hi: f32) -> f32 {
    v.max(lo).min(hi)
}
