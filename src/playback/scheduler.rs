//! Demand-driven frame scheduling.
//!
//! A [`FrameScheduler`] holds a single pending flag. [`FrameScheduler::schedule`] asks the host
//! for one refresh callback and is idempotent until that callback fires. Nothing reschedules
//! automatically: a frame that wants a successor must call `schedule()` again, so an idle
//! player issues no callbacks at all.

/// Host-side hook for "call me back on the next display refresh".
///
/// The host must answer each request with at most one call to
/// [`FrameScheduler::begin_frame`] (or [`FrameScheduler::on_refresh`]).
pub trait FrameHost {
    fn request_frame(&mut self);
}

pub struct FrameScheduler {
    host: Box<dyn FrameHost>,
    pending: bool,
    in_frame: bool,
    rescheduled: bool,
    last_frame_ms: Option<f64>,
    requests: u64,
    frames: u64,
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.pending)
            .field("in_frame", &self.in_frame)
            .field("last_frame_ms", &self.last_frame_ms)
            .field("requests", &self.requests)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl FrameScheduler {
    pub fn new(host: Box<dyn FrameHost>) -> Self {
        Self {
            host,
            pending: false,
            in_frame: false,
            rescheduled: false,
            last_frame_ms: None,
            requests: 0,
            frames: 0,
        }
    }

    /// Request a frame. Returns `true` if this call issued a host request, `false` if one was
    /// already outstanding.
    pub fn schedule(&mut self) -> bool {
        if self.in_frame {
            self.rescheduled = true;
        }
        if self.pending {
            return false;
        }
        self.pending = true;
        self.requests += 1;
        tracing::trace!(requests = self.requests, "frame requested");
        self.host.request_frame();
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Host refresh arrived. Returns the elapsed milliseconds since the previous frame, or
    /// `None` if no frame was requested (a spurious refresh).
    ///
    /// Elapsed is `0.0` for the first frame after a gap, so time never jumps across idle
    /// periods.
    pub fn begin_frame(&mut self, now_ms: f64) -> Option<f64> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        self.in_frame = true;
        self.rescheduled = false;
        self.frames += 1;
        let elapsed = match self.last_frame_ms {
            Some(last) => (now_ms - last).max(0.0),
            None => 0.0,
        };
        self.last_frame_ms = Some(now_ms);
        Some(elapsed)
    }

    /// Close the current frame. If the frame did not ask for a successor the timing baseline
    /// is dropped, making the next frame's elapsed `0.0`.
    pub fn finish_frame(&mut self) {
        self.in_frame = false;
        if !self.rescheduled {
            self.last_frame_ms = None;
        }
        self.rescheduled = false;
    }

    /// `begin_frame`, run `frame` with the elapsed time, then `finish_frame`.
    /// Returns whether a frame actually ran.
    pub fn on_refresh<F>(&mut self, now_ms: f64, frame: F) -> bool
    where
        F: FnOnce(&mut Self, f64),
    {
        let Some(elapsed) = self.begin_frame(now_ms) else {
            return false;
        };
        frame(self, elapsed);
        self.finish_frame();
        true
    }

    /// Number of host requests issued so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Number of frames delivered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::headless::HeadlessHost;

    fn counting() -> (FrameScheduler, HeadlessHost) {
        let host = HeadlessHost::new();
        (FrameScheduler::new(Box::new(host.clone())), host)
    }

    #[test]
    fn schedule_is_idempotent_until_frame_fires() {
        let (mut s, host) = counting();
        assert!(s.schedule());
        assert!(!s.schedule());
        assert!(!s.schedule());
        assert_eq!(host.total_requests(), 1);

        let mut runs = 0;
        assert!(s.on_refresh(16.0, |_, _| runs += 1));
        assert!(!s.on_refresh(32.0, |_, _| runs += 1));
        assert_eq!(runs, 1);
    }

    #[test]
    fn no_automatic_reschedule() {
        let (mut s, host) = counting();
        s.schedule();
        s.on_refresh(0.0, |_, _| {});
        assert!(!s.is_pending());
        assert_eq!(host.total_requests(), 1);
    }

    #[test]
    fn elapsed_is_zero_after_gap_and_delta_while_chained() {
        let (mut s, _) = counting();
        s.schedule();
        let mut seen = Vec::new();
        s.on_refresh(100.0, |s, dt| {
            seen.push(dt);
            s.schedule();
        });
        s.on_refresh(116.0, |s, dt| {
            seen.push(dt);
            s.schedule();
        });
        s.on_refresh(150.0, |_, dt| seen.push(dt));
        // Gap: nothing scheduled for a while.
        s.schedule();
        s.on_refresh(900.0, |_, dt| seen.push(dt));
        assert_eq!(seen, vec![0.0, 16.0, 34.0, 0.0]);
    }

    #[test]
    fn spurious_refresh_does_nothing() {
        let (mut s, _) = counting();
        assert_eq!(s.begin_frame(10.0), None);
        assert_eq!(s.frames(), 0);
    }
}
