//! Animation-frame clock
//!
//! Converts display-refresh timestamps (ms) into simulation `dt` measured in
//! reference frames. Gaps longer than `MAX_FRAME_DT` are clamped so a hidden
//! tab does not teleport the mover on return.

use crate::consts::{FRAME_MS, MAX_FRAME_DT};

#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_ms: Option<f64>,
    paused: bool,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames elapsed since the previous call, or `None` while paused
    ///
    /// The first call after construction or `resume` yields one frame.
    pub fn advance(&mut self, now_ms: f64) -> Option<f32> {
        if self.paused {
            return None;
        }
        let dt = match self.last_ms {
            Some(last) => ((now_ms - last) / FRAME_MS) as f32,
            None => 1.0,
        };
        self.last_ms = Some(now_ms);
        Some(dt.clamp(0.0, MAX_FRAME_DT))
    }

    pub fn pause(&mut self) {
        if !self.paused {
            log::debug!("Frame clock paused");
        }
        self.paused = true;
        self.last_ms = None;
    }

    pub fn resume(&mut self) {
        self.paused = false;
        self.last_ms = None;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_one() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(5000.0), Some(1.0));
    }

    #[test]
    fn test_dt_in_frames() {
        let mut clock = FrameClock::new();
        clock.advance(0.0);
        let dt = clock.advance(FRAME_MS * 2.0).unwrap();
        assert!((dt - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_large_gap_is_clamped() {
        let mut clock = FrameClock::new();
        clock.advance(0.0);
        assert_eq!(clock.advance(10_000.0), Some(MAX_FRAME_DT));
    }

    #[test]
    fn test_pause_swallows_gap() {
        let mut clock = FrameClock::new();
        clock.advance(0.0);
        clock.pause();
        assert_eq!(clock.advance(100.0), None);
        assert!(clock.is_paused());

        clock.resume();
        assert_eq!(clock.advance(5_000.0), Some(1.0));
        let dt = clock.advance(5_000.0 + FRAME_MS).unwrap();
        assert!((dt - 1.0).abs() < 1e-4);
    }
}
