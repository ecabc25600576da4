//! Overlap/trim: clipping a released block to the block beneath it
//!
//! A placement keeps only the horizontal intersection of the two spans.
//! Whatever hangs over one edge is cut off as a falling slice. Near-exact
//! alignment within `PERFECT_TOL` snaps to the edge first so a "perfect"
//! drop loses nothing.

use glam::Vec2;

use super::state::{Block, Slice};
use crate::consts::*;

/// Result of trimming a released mover against the block below
#[derive(Debug, Clone)]
pub enum TrimOutcome {
    /// The mover keeps `[x, x + w)`; `slice` is the cut-off remainder
    Placed { x: f32, w: f32, slice: Option<Slice> },
    /// No positive-width intersection
    Missed,
}

/// Snap the mover's left edge onto `below` when either edge is within tolerance
pub fn snap_to_edges(x: f32, w: f32, below: &Block) -> f32 {
    let mut x = x;
    if (x - below.x).abs() <= PERFECT_TOL {
        x = below.x;
    }
    if (x + w - below.right()).abs() <= PERFECT_TOL {
        x = below.right() - w;
    }
    x
}

/// Intersection of two horizontal spans as `(left, width)`, if non-empty
pub fn overlap(a_x: f32, a_w: f32, b_x: f32, b_w: f32) -> Option<(f32, f32)> {
    let left = a_x.max(b_x);
    let right = (a_x + a_w).min(b_x + b_w);
    let width = right - left;
    if width > 0.0 { Some((left, width)) } else { None }
}

/// Trim `mover` against `below`
///
/// Only one side can overhang after snapping, so at most one slice is cut.
pub fn trim(mover: &Block, below: &Block) -> TrimOutcome {
    let x = snap_to_edges(mover.x, mover.w, below);
    let w = mover.w;

    let Some((left, width)) = overlap(x, w, below.x, below.w) else {
        return TrimOutcome::Missed;
    };

    let slice = if x < below.x {
        let cut = (below.x - x).min(w);
        Some(Slice {
            x,
            w: cut,
            row: mover.row,
            hue: mover.hue,
            vel: Vec2::new(-SLICE_DRIFT, 0.0),
            fall: 0.0,
            life: SLICE_LIFE,
        })
    } else if x + w > below.right() {
        let cut = (x + w - below.right()).min(w);
        Some(Slice {
            x: x + w - cut,
            w: cut,
            row: mover.row,
            hue: mover.hue,
            vel: Vec2::new(SLICE_DRIFT, 0.0),
            fall: 0.0,
            life: SLICE_LIFE,
        })
    } else {
        None
    };

    TrimOutcome::Placed {
        x: left,
        w: width,
        slice,
    }
}
