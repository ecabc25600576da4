//! Session state and core simulation types
//!
//! Everything the per-frame tick reads or mutates lives here.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Horizontal direction of a mover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }
}

/// A rectangular slab on a discrete row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Left edge (px)
    pub x: f32,
    /// Width (px)
    pub w: f32,
    /// Row index, 0 = base
    pub row: u32,
    /// Color seed (hue in degrees)
    pub hue: f32,
    /// True only for the mover being aimed
    #[serde(default)]
    pub moving: bool,
    /// Oscillation direction (movers only)
    #[serde(default)]
    pub dir: Option<Direction>,
    /// Vertical offset while dropping (negative = above its row)
    #[serde(default)]
    pub y_offset: f32,
}

impl Block {
    /// A resting block
    pub fn fixed(x: f32, w: f32, row: u32, hue: f32) -> Self {
        Self {
            x,
            w,
            row,
            hue,
            moving: false,
            dir: None,
            y_offset: 0.0,
        }
    }

    /// A mover oscillating in `dir`
    pub fn mover(x: f32, w: f32, row: u32, hue: f32, dir: Direction) -> Self {
        Self {
            moving: true,
            dir: Some(dir),
            ..Self::fixed(x, w, row, hue)
        }
    }

    /// Right edge (px)
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }
}

/// Falling debris trimmed off a placement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slice {
    /// Left edge (px)
    pub x: f32,
    pub w: f32,
    /// Row the slice was cut from
    pub row: u32,
    pub hue: f32,
    /// Velocity (px/frame), +y is downward
    pub vel: Vec2,
    /// Distance fallen below its row (px)
    pub fall: f32,
    /// Frames left before removal
    pub life: f32,
}

/// Where the last life ended; the resume point for a purchased continuation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeathPosition {
    pub row: u32,
    pub x: f32,
    pub w: f32,
    pub hue: f32,
}

impl From<&Block> for DeathPosition {
    fn from(b: &Block) -> Self {
        Self {
            row: b.row,
            x: b.x,
            w: b.w,
            hue: b.hue,
        }
    }
}

/// Discrete outcomes reported by the simulation tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimEvent {
    /// A placement stuck; score is the new total
    RowAdvanced { row: u32, score: u64, perfect: bool },
    /// The released mover missed the block below entirely
    PlacementFailed { death: DeathPosition },
}

/// Mutable simulation state
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Rows in order; the last block is the mover when one exists
    pub blocks: Vec<Block>,
    pub slices: Vec<Slice>,
    /// Mover speed (px/frame)
    pub speed: f32,
    pub camera: f32,
    pub camera_target: f32,
    /// Credited by a confirmed purchase, consumed by a continuation
    pub has_extra_life: bool,
    pub dropping: bool,
    pub game_over: bool,
    /// Successful placements this game
    pub score: u64,
    /// Best of this session and any known on-chain/local best
    pub best: u64,
    #[serde(skip)]
    rng: Pcg32,
}

impl Session {
    /// Empty session; call `reset` before ticking
    pub fn new(seed: u64) -> Self {
        Self {
            blocks: Vec::new(),
            slices: Vec::new(),
            speed: BASE_SPEED,
            camera: 0.0,
            camera_target: 0.0,
            has_extra_life: false,
            dropping: false,
            game_over: false,
            score: 0,
            best: 0,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Base block plus one mover, everything else cleared (best is kept)
    pub fn reset(&mut self) {
        let hue = HUE_BASE + self.rng.random::<f32>() * HUE_SPREAD;
        self.blocks.clear();
        self.blocks.push(Block::fixed(START_X, START_WIDTH, 0, hue));
        self.blocks.push(Block::mover(
            SIDE_PAD,
            START_WIDTH,
            1,
            hue + HUE_MOVER_STEP,
            Direction::Right,
        ));
        self.slices.clear();
        self.speed = BASE_SPEED;
        self.camera = 0.0;
        self.camera_target = 0.0;
        self.has_extra_life = false;
        self.dropping = false;
        self.game_over = false;
        self.score = 0;
    }

    /// The topmost block if it is still being aimed
    pub fn mover(&self) -> Option<&Block> {
        self.blocks.last().filter(|b| b.moving)
    }

    pub fn mover_mut(&mut self) -> Option<&mut Block> {
        self.blocks.last_mut().filter(|b| b.moving)
    }

    /// Highest row index in the stack
    pub fn top_row(&self) -> u32 {
        self.blocks.last().map(|b| b.row).unwrap_or(0)
    }

    /// Uniformly random oscillation direction
    pub fn random_direction(&mut self) -> Direction {
        if self.rng.random_bool(0.5) {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    /// Raise best to at least `score`; true if it changed
    pub fn absorb_best(&mut self, score: u64) -> bool {
        if score > self.best {
            self.best = score;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_builds_base_and_mover() {
        let mut session = Session::new(7);
        session.reset();

        assert_eq!(session.blocks.len(), 2);
        let base = &session.blocks[0];
        assert_eq!(base.row, 0);
        assert!(!base.moving);
        assert_eq!(base.w, START_WIDTH);

        let mover = session.mover().expect("mover after reset");
        assert_eq!(mover.row, 1);
        assert_eq!(mover.x, SIDE_PAD);
        assert_eq!(mover.dir, Some(Direction::Right));
        assert!((mover.hue - base.hue - HUE_MOVER_STEP).abs() < 1e-4);
    }

    #[test]
    fn test_reset_keeps_best() {
        let mut session = Session::new(7);
        session.reset();
        session.score = 12;
        session.absorb_best(12);
        session.reset();
        assert_eq!(session.score, 0);
        assert_eq!(session.best, 12);
    }

    #[test]
    fn test_mover_absent_when_top_block_fixed() {
        let mut session = Session::new(1);
        session.reset();
        session.blocks.last_mut().unwrap().moving = false;
        assert!(session.mover().is_none());
    }
}
