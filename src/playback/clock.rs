//! Playback clock with loop semantics.
//!
//! The clock is a small state machine (`Stopped`, `Paused`, `Playing`) plus a timestamp that
//! [`Clock::tick`] advances by a frame's elapsed wall time. What happens at the loop bounds is
//! decided by [`LoopMode`]. The clock is only mutated through its own operations; the frame
//! pipeline reads it but never writes `t` directly.

use crate::foundation::core::Seconds;
use crate::foundation::error::{ToodleError, ToodleResult};

/// Policy for how playback time behaves at the loop bounds.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Clamp at the bounds and pause.
    NoLoop,
    /// Wrap around to the loop start.
    #[default]
    Wrap,
    /// Ping-pong: reverse direction at each bound.
    Reverse,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Backward => -1.0,
        }
    }
}

/// Observable part of the clock. Two snapshots compare unequal exactly when a frame needs to
/// be scheduled on account of the clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClockSnapshot {
    pub state: PlaybackState,
    pub t: Seconds,
}

#[derive(Clone, Debug)]
pub struct Clock {
    state: PlaybackState,
    t: Seconds,
    direction: Direction,
    loop_start: Seconds,
    loop_end: Seconds,
    loop_mode: LoopMode,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            t: Seconds::ZERO,
            direction: Direction::Forward,
            loop_start: Seconds::ZERO,
            loop_end: Seconds(10.0),
            loop_mode: LoopMode::Wrap,
        }
    }
}

impl Clock {
    pub fn new(loop_start: Seconds, loop_end: Seconds, loop_mode: LoopMode) -> ToodleResult<Self> {
        validate_bounds(loop_start, loop_end)?;
        Ok(Self {
            t: loop_start,
            loop_start,
            loop_end,
            loop_mode,
            ..Self::default()
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn t(&self) -> Seconds {
        self.t
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn loop_start(&self) -> Seconds {
        self.loop_start
    }

    pub fn loop_end(&self) -> Seconds {
        self.loop_end
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            state: self.state,
            t: self.t,
        }
    }

    /// `Stopped -> Playing` from the loop start, `Paused -> Playing` in place.
    pub fn play(&mut self) {
        if self.state == PlaybackState::Stopped {
            self.t = self.loop_start;
            self.direction = Direction::Forward;
        }
        self.state = PlaybackState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn play_pause(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused | PlaybackState::Stopped => self.play(),
        }
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.rewind();
    }

    /// Move `t` back to the loop start without touching the playback state.
    pub fn rewind(&mut self) {
        self.t = self.loop_start;
        self.direction = Direction::Forward;
    }

    pub fn set_loop_bounds(&mut self, start: Seconds, end: Seconds) -> ToodleResult<()> {
        validate_bounds(start, end)?;
        self.loop_start = start;
        self.loop_end = end;
        self.t = Seconds(self.t.0.clamp(start.0, end.0));
        Ok(())
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
        if mode != LoopMode::Reverse {
            self.direction = Direction::Forward;
        }
    }

    /// Advance by `elapsed_ms` of wall time.
    ///
    /// Only a playing clock moves. With `also_tick_when_stopped` a stopped clock still reports
    /// `true` so the caller redraws at the unchanged `t`; a paused clock never does. Returns
    /// whether the caller should treat this frame as advancing.
    pub fn tick(&mut self, elapsed_ms: f64, also_tick_when_stopped: bool) -> bool {
        match self.state {
            PlaybackState::Paused => return false,
            PlaybackState::Stopped => return also_tick_when_stopped,
            PlaybackState::Playing => {}
        }

        let elapsed_ms = if elapsed_ms.is_finite() {
            elapsed_ms.max(0.0)
        } else {
            0.0
        };
        let start = self.loop_start.0;
        let end = self.loop_end.0;
        let len = end - start;

        if len <= 0.0 {
            // Zero-length range: pinned at a point, behaves like NoLoop.
            self.t = self.loop_start;
            if elapsed_ms > 0.0 {
                self.state = PlaybackState::Paused;
            }
            return true;
        }

        let dt = self.direction.sign() * elapsed_ms / 1000.0;
        match self.loop_mode {
            LoopMode::NoLoop => {
                let next = self.t.0 + dt;
                if next >= end {
                    self.t = self.loop_end;
                    self.state = PlaybackState::Paused;
                } else if next < start {
                    self.t = self.loop_start;
                    self.state = PlaybackState::Paused;
                } else {
                    self.t = Seconds(next);
                }
            }
            LoopMode::Wrap => {
                let mut offset = (self.t.0 + dt - start).rem_euclid(len);
                if offset >= len {
                    offset = 0.0;
                }
                self.t = Seconds(start + offset);
            }
            LoopMode::Reverse => {
                // Unfold the ping-pong into a phase over one full cycle (`2 * len`), advance
                // the phase, then fold it back into a position and a direction.
                let period = 2.0 * len;
                let pos = (self.t.0 - start).clamp(0.0, len);
                let phase = match self.direction {
                    Direction::Forward => pos,
                    Direction::Backward => period - pos,
                };
                let mut next = (phase + dt.abs()).rem_euclid(period);
                if next >= period {
                    next = 0.0;
                }
                let (pos, dir) = if next <= len {
                    (next, Direction::Forward)
                } else {
                    (period - next, Direction::Backward)
                };
                self.t = Seconds((start + pos).clamp(start, end));
                if dir != self.direction {
                    tracing::trace!(t = self.t.0, ?dir, "clock reversed");
                }
                self.direction = dir;
            }
        }
        true
    }
}

fn validate_bounds(start: Seconds, end: Seconds) -> ToodleResult<()> {
    if !start.0.is_finite() || !end.0.is_finite() {
        return Err(ToodleError::validation("loop bounds must be finite"));
    }
    if start.0 < 0.0 {
        return Err(ToodleError::validation("loop start must be >= 0"));
    }
    if end.0 < start.0 {
        return Err(ToodleError::validation("loop end must be >= loop start"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(start: f64, end: f64, mode: LoopMode) -> Clock {
        let mut c = Clock::new(Seconds(start), Seconds(end), mode).unwrap();
        c.play();
        c
    }

    #[test]
    fn play_pause_toggles_and_starts_from_stopped() {
        let mut c = Clock::default();
        assert_eq!(c.state(), PlaybackState::Stopped);
        c.play_pause();
        assert_eq!(c.state(), PlaybackState::Playing);
        c.play_pause();
        assert_eq!(c.state(), PlaybackState::Paused);
        c.play_pause();
        assert_eq!(c.state(), PlaybackState::Playing);
    }

    #[test]
    fn stop_resets_to_loop_start() {
        let mut c = playing(1.0, 4.0, LoopMode::Wrap);
        c.tick(1500.0, false);
        assert_eq!(c.t(), Seconds(2.5));
        c.stop();
        assert_eq!(c.state(), PlaybackState::Stopped);
        assert_eq!(c.t(), Seconds(1.0));
    }

    #[test]
    fn paused_and_stopped_clocks_do_not_move() {
        let mut c = playing(0.0, 5.0, LoopMode::Wrap);
        c.tick(1000.0, false);
        c.pause();
        assert!(!c.tick(1000.0, true));
        assert_eq!(c.t(), Seconds(1.0));

        c.stop();
        assert!(!c.tick(1000.0, false));
        assert!(c.tick(1000.0, true));
        assert_eq!(c.t(), Seconds::ZERO);
    }

    #[test]
    fn no_loop_clamps_and_pauses_at_end() {
        let mut c = playing(0.0, 5.0, LoopMode::NoLoop);
        let mut last = c.t();
        for _ in 0..7 {
            c.tick(1000.0, false);
            assert!(c.t() >= last);
            last = c.t();
        }
        assert_eq!(c.t(), Seconds(5.0));
        assert_eq!(c.state(), PlaybackState::Paused);
        assert!(!c.tick(1000.0, false));
        assert_eq!(c.t(), Seconds(5.0));
    }

    #[test]
    fn wrap_stays_in_half_open_range() {
        let mut c = playing(2.0, 3.0, LoopMode::Wrap);
        for ms in [0.0, 16.7, 250.0, 999.9, 1000.0, 3333.3, 12_000.0, 0.1] {
            c.tick(ms, false);
            assert!(c.t().0 >= 2.0 && c.t().0 < 3.0, "t={:?} after {ms}", c.t());
        }
    }

    #[test]
    fn wrap_exact_period_returns_to_start() {
        let mut c = playing(0.0, 2.0, LoopMode::Wrap);
        c.tick(2000.0, false);
        assert_eq!(c.t(), Seconds::ZERO);
    }

    #[test]
    fn reverse_flips_at_bounds() {
        let mut c = playing(0.0, 1.0, LoopMode::Reverse);
        c.tick(750.0, false);
        assert_eq!(c.direction(), Direction::Forward);
        c.tick(500.0, false);
        assert_eq!(c.direction(), Direction::Backward);
        assert!((c.t().0 - 0.75).abs() < 1e-9);
        c.tick(1000.0, false);
        assert_eq!(c.direction(), Direction::Forward);
        assert!((c.t().0 - 0.25).abs() < 1e-9);
    }

    #[test]
    fn reverse_never_leaves_bounds() {
        let mut c = playing(1.0, 2.5, LoopMode::Reverse);
        for ms in [100.0, 900.0, 1600.0, 4000.0, 17.0, 33.0, 10_000.0] {
            c.tick(ms, false);
            assert!(c.t().0 >= 1.0 && c.t().0 <= 2.5, "t={:?}", c.t());
        }
    }

    #[test]
    fn zero_length_range_pins_and_pauses() {
        for mode in [LoopMode::NoLoop, LoopMode::Wrap, LoopMode::Reverse] {
            let mut c = playing(3.0, 3.0, mode);
            c.tick(16.0, false);
            assert_eq!(c.t(), Seconds(3.0));
            assert_eq!(c.state(), PlaybackState::Paused);
        }
    }

    #[test]
    fn zero_elapsed_does_not_pause_zero_length_range() {
        let mut c = playing(3.0, 3.0, LoopMode::Wrap);
        c.tick(0.0, false);
        assert_eq!(c.state(), PlaybackState::Playing);
    }

    #[test]
    fn bounds_are_validated_and_clamp_t() {
        let mut c = playing(0.0, 10.0, LoopMode::Wrap);
        c.tick(8000.0, false);
        assert!(c.set_loop_bounds(Seconds(4.0), Seconds(2.0)).is_err());
        assert!(c.set_loop_bounds(Seconds(-1.0), Seconds(2.0)).is_err());
        assert!(c.set_loop_bounds(Seconds(f64::NAN), Seconds(2.0)).is_err());
        c.set_loop_bounds(Seconds(1.0), Seconds(5.0)).unwrap();
        assert_eq!(c.t(), Seconds(5.0));
    }

    #[test]
    fn leaving_reverse_resets_direction() {
        let mut c = playing(0.0, 1.0, LoopMode::Reverse);
        c.tick(1500.0, false);
        assert_eq!(c.direction(), Direction::Backward);
        c.set_loop_mode(LoopMode::Wrap);
        assert_eq!(c.direction(), Direction::Forward);
    }
}
