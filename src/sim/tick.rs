//! Per-frame simulation step
//!
//! `tick` advances one display refresh. `dt` is in reference frames, so
//! `dt == 1.0` at 60 Hz. Mover motion, the drop and collision are frozen
//! once the session is over; camera easing and debris keep running so the
//! scene settles while the player decides.

use super::state::{Block, DeathPosition, Session, SimEvent};
use super::trim::{TrimOutcome, trim};
use crate::clamp;
use crate::consts::*;

/// Advance the session by `dt` frames and report what happened
pub fn tick(session: &mut Session, dt: f32) -> Vec<SimEvent> {
    let mut events = Vec::new();

    if !session.game_over {
        advance_mover(session, dt);
        if let Some(event) = advance_drop(session, dt) {
            events.push(event);
        }
    }

    advance_camera(session, dt);
    advance_slices(session, dt);

    events
}

/// Bounce the mover between the side bounds
pub fn advance_mover(session: &mut Session, dt: f32) {
    let speed = session.speed;
    let Some(mover) = session.mover_mut() else {
        return;
    };

    let min_x = SIDE_PAD;
    let max_x = (CANVAS_WIDTH - SIDE_PAD - mover.w).max(min_x);
    let sign = mover.dir.map(|d| d.sign()).unwrap_or(1.0);

    mover.x += speed * sign * dt;
    if mover.x <= min_x {
        mover.dir = Some(super::Direction::Right);
    } else if mover.x >= max_x {
        mover.dir = Some(super::Direction::Left);
    }
    mover.x = clamp(mover.x, min_x, max_x);
}

/// Lower a released block; lands and trims exactly once
pub fn advance_drop(session: &mut Session, dt: f32) -> Option<SimEvent> {
    if !session.dropping {
        return None;
    }
    let block = session.blocks.last_mut()?;
    if block.moving {
        return None;
    }

    block.y_offset += DROP_SPEED * dt;
    if block.y_offset < 0.0 {
        return None;
    }

    block.y_offset = 0.0;
    session.dropping = false;
    place_and_trim(session)
}

/// Trim the landed block against the one below and either advance a row or end the game
pub fn place_and_trim(session: &mut Session) -> Option<SimEvent> {
    let n = session.blocks.len();
    if n < 2 {
        return None;
    }
    let (below, placed) = (&session.blocks[n - 2], &session.blocks[n - 1]);

    match trim(placed, below) {
        TrimOutcome::Missed => {
            let death = DeathPosition::from(below);
            session.game_over = true;
            log::info!(
                "Placement missed at row {} (score {})",
                placed.row,
                session.score
            );
            Some(SimEvent::PlacementFailed { death })
        }
        TrimOutcome::Placed { x, w, slice } => {
            let below_hue = below.hue;
            let perfect = slice.is_none();
            if let Some(slice) = slice {
                session.slices.push(slice);
            }

            let placed = &mut session.blocks[n - 1];
            placed.x = x;
            placed.w = w;
            let row = placed.row + 1;

            let dir = session.random_direction();
            session
                .blocks
                .push(Block::mover(x, w, row, below_hue + HUE_ROW_STEP, dir));

            session.speed += SPEED_GAIN;
            session.score += 1;

            if row > CAMERA_START_ROW {
                session.camera_target = (row - CAMERA_START_ROW) as f32 * CAMERA_RISE;
            }

            Some(SimEvent::RowAdvanced {
                row,
                score: session.score,
                perfect,
            })
        }
    }
}

/// Ease the camera toward its target (exponential approach)
pub fn advance_camera(session: &mut Session, dt: f32) {
    let k = 1.0 - (1.0 - CAMERA_EASE).powf(dt);
    session.camera += (session.camera_target - session.camera) * k;
}

/// Fall, drift and expire debris
pub fn advance_slices(session: &mut Session, dt: f32) {
    for slice in session.slices.iter_mut() {
        slice.vel.y += SLICE_GRAVITY * dt;
        slice.x += slice.vel.x * dt;
        slice.fall += slice.vel.y * dt;
        slice.life -= dt;
    }
    session.slices.retain(|s| s.life > 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Direction;
    use proptest::prelude::*;

    fn started(seed: u64) -> Session {
        let mut session = Session::new(seed);
        session.reset();
        session
    }

    /// Release the mover at `x` and tick until the drop resolves
    fn drop_at(session: &mut Session, x: f32) -> Vec<SimEvent> {
        let mover = session.mover_mut().expect("mover");
        mover.x = x;
        mover.moving = false;
        mover.y_offset = DROP_START_OFFSET;
        session.dropping = true;

        let mut events = Vec::new();
        for _ in 0..100 {
            events.extend(tick(session, 1.0));
            if !session.dropping {
                break;
            }
        }
        events
    }

    #[test]
    fn test_mover_bounces_at_right_bound() {
        let mut session = started(1);
        let max_x = CANVAS_WIDTH - SIDE_PAD - START_WIDTH;
        session.mover_mut().unwrap().x = max_x - 1.0;

        advance_mover(&mut session, 1.0);
        let mover = session.mover().unwrap();
        assert_eq!(mover.x, max_x);
        assert_eq!(mover.dir, Some(Direction::Left));

        advance_mover(&mut session, 1.0);
        assert!(session.mover().unwrap().x < max_x);
    }

    #[test]
    fn test_mover_bounces_at_left_bound() {
        let mut session = started(1);
        let mover = session.mover_mut().unwrap();
        mover.x = SIDE_PAD + 1.0;
        mover.dir = Some(Direction::Left);

        advance_mover(&mut session, 1.0);
        let mover = session.mover().unwrap();
        assert_eq!(mover.x, SIDE_PAD);
        assert_eq!(mover.dir, Some(Direction::Right));
    }

    #[test]
    fn test_aligned_drop_advances_row() {
        let mut session = started(3);
        let events = drop_at(&mut session, START_X);

        assert_eq!(
            events,
            vec![SimEvent::RowAdvanced {
                row: 2,
                score: 1,
                perfect: true
            }]
        );
        assert_eq!(session.score, 1);
        assert_eq!(session.blocks.len(), 3);
        let mover = session.mover().expect("new mover");
        assert_eq!(mover.row, 2);
        assert_eq!(mover.w, START_WIDTH);
        assert!((session.speed - (BASE_SPEED + SPEED_GAIN)).abs() < 1e-6);
        assert!(session.slices.is_empty());
    }

    #[test]
    fn test_offset_drop_cuts_one_slice() {
        let mut session = started(3);
        drop_at(&mut session, START_X + 40.0);

        assert_eq!(session.score, 1);
        assert_eq!(session.blocks[1].w, START_WIDTH - 40.0);
        assert_eq!(session.slices.len(), 1);
        assert_eq!(session.slices[0].w, 40.0);
        assert_eq!(session.mover().unwrap().w, START_WIDTH - 40.0);
    }

    #[test]
    fn test_missed_drop_ends_game_at_block_below() {
        let mut session = started(3);
        let base = session.blocks[0].clone();
        let events = drop_at(&mut session, START_X + START_WIDTH + 10.0);

        assert!(session.game_over);
        assert_eq!(session.score, 0);
        assert_eq!(
            events,
            vec![SimEvent::PlacementFailed {
                death: DeathPosition::from(&base)
            }]
        );
        // No new mover appended on failure
        assert_eq!(session.blocks.len(), 2);
    }

    #[test]
    fn test_drop_lands_exactly_once() {
        let mut session = started(5);
        let events = drop_at(&mut session, START_X);
        assert_eq!(events.len(), 1);
        // Further ticks only move the new mover
        for _ in 0..10 {
            assert!(tick(&mut session, 1.0).is_empty());
        }
        assert_eq!(session.score, 1);
    }

    #[test]
    fn test_game_over_freezes_mover_but_not_camera_or_slices() {
        let mut session = started(9);
        session.camera_target = 80.0;
        drop_at(&mut session, START_X + 30.0);
        assert_eq!(session.slices.len(), 1);

        // Force the next drop to miss
        let past_edge = session.blocks[session.blocks.len() - 2].right() + 10.0;
        drop_at(&mut session, past_edge);
        assert!(session.game_over);

        let frozen_x = session.blocks.last().unwrap().x;
        let camera_before = session.camera;
        let slice_life = session.slices.first().map(|s| s.life);

        tick(&mut session, 1.0);

        assert_eq!(session.blocks.last().unwrap().x, frozen_x);
        assert!(session.camera > camera_before);
        if let (Some(before), Some(after)) = (slice_life, session.slices.first().map(|s| s.life)) {
            assert!(after < before);
        }
    }

    #[test]
    fn test_camera_eases_exponentially() {
        let mut session = started(1);
        session.camera_target = 100.0;
        advance_camera(&mut session, 1.0);
        assert!((session.camera - 10.0).abs() < 1e-4);
        advance_camera(&mut session, 1.0);
        assert!((session.camera - 19.0).abs() < 1e-4);
    }

    #[test]
    fn test_camera_target_rises_past_start_row() {
        let mut session = started(11);
        for _ in 0..CAMERA_START_ROW {
            let x = session.blocks[session.blocks.len() - 2].x;
            drop_at(&mut session, x);
        }
        // Mover now sits at row CAMERA_START_ROW + 1
        assert_eq!(session.top_row(), CAMERA_START_ROW + 1);
        assert_eq!(session.camera_target, CAMERA_RISE);
    }

    #[test]
    fn test_slices_fall_and_expire() {
        let mut session = started(1);
        drop_at(&mut session, START_X + 20.0);
        assert_eq!(session.slices.len(), 1);
        let x0 = session.slices[0].x;

        advance_slices(&mut session, 1.0);
        let s = &session.slices[0];
        assert!(s.x > x0);
        assert!(s.fall > 0.0);

        advance_slices(&mut session, SLICE_LIFE);
        assert!(session.slices.is_empty());
    }

    proptest! {
        #[test]
        fn prop_width_never_grows(offsets in proptest::collection::vec(-12.0f32..12.0, 1..20)) {
            let mut session = started(21);
            let mut last_w = START_WIDTH;
            for off in offsets {
                let below = &session.blocks[session.blocks.len() - 2];
                let x = below.x + off;
                drop_at(&mut session, x);
                if session.game_over {
                    break;
                }
                let placed = &session.blocks[session.blocks.len() - 2];
                prop_assert!(placed.w <= last_w + 1e-3);
                last_w = placed.w;
            }
        }
    }
}
