//! Stacking simulation module
//!
//! All gameplay geometry lives here. This module must stay pure:
//! - Seeded RNG only
//! - No I/O, no async, no platform dependencies
//! - The session is mutated only through `tick` and `place_and_trim`

pub mod state;
pub mod tick;
pub mod trim;

pub use state::{Block, DeathPosition, Direction, Session, SimEvent, Slice};
pub use tick::{advance_camera, advance_drop, advance_mover, advance_slices, place_and_trim, tick};
pub use trim::{TrimOutcome, overlap, snap_to_edges, trim};
