//! Simulation clock
//!
//! Advanced once per display-refresh callback with the callback's timestamp.
//! Owned by exactly one engine; only a remount starts it over.

use crate::consts::MAX_FRAME_GAP;

/// Snapshot of the clock after a tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClockSample {
    /// Wall-clock seconds since the first tick
    pub wall: f64,
    /// Animated seconds (stops advancing while frozen)
    pub elapsed: f64,
    /// Animated seconds added by this tick
    pub delta: f64,
    /// Integrated `rate * delta`
    pub travel: f64,
    /// Number of ticks so far, this one included
    pub frame: u64,
}

#[derive(Debug, Clone)]
pub struct SimClock {
    start_ms: Option<f64>,
    last_ms: f64,
    elapsed: f64,
    travel: f64,
    /// Travel units per animated second
    rate: f64,
    frozen: bool,
    frames: u64,
}

impl SimClock {
    pub fn new(rate: f64, frozen: bool) -> Self {
        Self {
            start_ms: None,
            last_ms: 0.0,
            elapsed: 0.0,
            travel: 0.0,
            rate: if rate.is_finite() { rate } else { 0.0 },
            frozen,
            frames: 0,
        }
    }

    /// Advance to `timestamp_ms` (a refresh-callback timestamp)
    pub fn tick(&mut self, timestamp_ms: f64) -> ClockSample {
        let start = *self.start_ms.get_or_insert(timestamp_ms);
        let raw = (timestamp_ms - self.last_ms.max(start)) / 1000.0;
        // Backwards timestamps add nothing; a gap past MAX_FRAME_GAP is a
        // hidden tab and resumes where it left off
        let delta = if raw.is_finite() && raw <= MAX_FRAME_GAP {
            raw.max(0.0)
        } else {
            0.0
        };
        self.last_ms = timestamp_ms.max(self.last_ms);
        self.frames += 1;

        let delta = if self.frozen { 0.0 } else { delta };
        self.elapsed += delta;
        self.travel += delta * self.rate;

        ClockSample {
            wall: (timestamp_ms - start) / 1000.0,
            elapsed: self.elapsed,
            delta,
            travel: self.travel,
            frame: self.frames,
        }
    }

    /// Current values without advancing
    pub fn sample(&self) -> ClockSample {
        ClockSample {
            wall: self
                .start_ms
                .map(|s| (self.last_ms - s) / 1000.0)
                .unwrap_or(0.0),
            elapsed: self.elapsed,
            delta: 0.0,
            travel: self.travel,
            frame: self.frames,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_is_zero() {
        let mut clock = SimClock::new(1.0, false);
        let s = clock.tick(12_345.0);
        assert_eq!(s.elapsed, 0.0);
        assert_eq!(s.delta, 0.0);
        assert_eq!(s.frame, 1);
    }

    #[test]
    fn test_accumulates_at_refresh_rate() {
        // 120 Hz for one second
        let mut clock = SimClock::new(0.05, false);
        let mut s = clock.tick(1000.0);
        for i in 1..=120 {
            s = clock.tick(1000.0 + i as f64 * 1000.0 / 120.0);
        }
        assert!((s.elapsed - 1.0).abs() < 1e-9);
        assert!((s.travel - 0.05).abs() < 1e-9);
        assert!((s.wall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_frozen_keeps_values() {
        let mut clock = SimClock::new(1.0, true);
        let a = clock.tick(0.0);
        let b = clock.tick(16.0);
        let c = clock.tick(5000.0);
        assert_eq!(a.elapsed, b.elapsed);
        assert_eq!(b.elapsed, c.elapsed);
        assert_eq!(a.travel, c.travel);
        // Still counts frames so the loop stays alive
        assert_eq!(c.frame, 3);
    }

    #[test]
    fn test_hidden_tab_gap_is_a_pause() {
        let mut clock = SimClock::new(1.0, false);
        clock.tick(0.0);
        let before = clock.tick(16.0);
        let s = clock.tick(60_016.0);
        assert_eq!(s.delta, 0.0);
        assert_eq!(s.elapsed, before.elapsed);
        assert!((s.wall - 60.016).abs() < 1e-9);
        let next = clock.tick(60_032.0);
        assert!((next.delta - 0.016).abs() < 1e-9);
    }

    #[test]
    fn test_slow_frames_keep_wall_time() {
        // 5 fps for ten seconds
        let mut clock = SimClock::new(0.5, false);
        let mut s = clock.tick(0.0);
        for i in 1..=50 {
            s = clock.tick(i as f64 * 200.0);
        }
        assert!((s.wall - 10.0).abs() < 1e-9);
        assert!((s.elapsed - s.wall).abs() < 1e-9);
        assert!((s.travel - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_at_limit_still_counts() {
        let mut clock = SimClock::new(1.0, false);
        clock.tick(0.0);
        let s = clock.tick(MAX_FRAME_GAP * 1000.0);
        assert!((s.delta - MAX_FRAME_GAP).abs() < 1e-12);
    }

    #[test]
    fn test_backwards_timestamp_never_rewinds() {
        let mut clock = SimClock::new(1.0, false);
        clock.tick(100.0);
        let a = clock.tick(150.0);
        let b = clock.tick(120.0);
        assert_eq!(b.delta, 0.0);
        assert!(b.elapsed >= a.elapsed);
        let c = clock.tick(166.0);
        assert!((c.delta - 0.016).abs() < 1e-9);
    }

    #[test]
    fn test_sample_does_not_advance() {
        let mut clock = SimClock::new(2.0, false);
        clock.tick(0.0);
        let ticked = clock.tick(50.0);
        let sampled = clock.sample();
        assert_eq!(ticked.elapsed, sampled.elapsed);
        assert_eq!(ticked.travel, sampled.travel);
        assert_eq!(sampled.frame, 2);
    }
}
