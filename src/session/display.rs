use crate::foundation::error::{ToodleError, ToodleResult};
use crate::playback::headless::HeadlessHost;
use crate::playback::scheduler::FrameHost;
use crate::render::Surface;
use crate::session::player::Player;

/// Summary of a [`HeadlessDisplay::run_for`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct RunSummary {
    /// Refresh intervals that elapsed.
    pub refreshes: u64,
    /// Refreshes that delivered a frame.
    pub frames: u64,
    /// Display time at which no further frame was requested, if that happened before the limit.
    pub idle_at_ms: Option<f64>,
}

/// Simulated display refresh for driving a [`Player`] without a window.
///
/// Time only moves when the driver advances it, in whole refresh intervals, so runs are
/// deterministic.
#[derive(Clone, Debug)]
pub struct HeadlessDisplay {
    host: HeadlessHost,
    interval_ms: f64,
    now_ms: f64,
}

impl HeadlessDisplay {
    pub fn new(fps: f64) -> ToodleResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ToodleError::validation("display fps must be finite and > 0"));
        }
        Ok(Self {
            host: HeadlessHost::new(),
            interval_ms: 1000.0 / fps,
            now_ms: 0.0,
        })
    }

    /// Frame host to hand to [`Player::new`]; requests land on this display.
    pub fn host(&self) -> Box<dyn FrameHost> {
        Box::new(self.host.clone())
    }

    pub fn now_ms(&self) -> f64 {
        self.now_ms
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn has_request(&self) -> bool {
        self.host.is_requested()
    }

    /// Advance one refresh interval and deliver a frame if one was requested.
    pub fn refresh<S: Surface>(&mut self, player: &mut Player<S>) -> bool {
        self.now_ms += self.interval_ms;
        if !self.host.take() {
            return false;
        }
        player.on_refresh(self.now_ms)
    }

    /// Refresh for `seconds` of display time, stopping early once the player goes idle.
    #[tracing::instrument(level = "debug", skip(self, player))]
    pub fn run_for<S: Surface>(&mut self, player: &mut Player<S>, seconds: f64) -> RunSummary {
        let limit = self.now_ms + seconds.max(0.0) * 1000.0;
        let mut summary = RunSummary::default();
        while self.now_ms + self.interval_ms <= limit {
            if !self.has_request() {
                summary.idle_at_ms = Some(self.now_ms);
                break;
            }
            summary.refreshes += 1;
            if self.refresh(player) {
                summary.frames += 1;
            }
        }
        tracing::debug!(
            frames = summary.frames,
            idle = summary.idle_at_ms.is_some(),
            "run finished"
        );
        summary
    }

    /// Deliver up to `count` frames. Returns how many ran; fewer means the player went idle.
    pub fn run_frames<S: Surface>(&mut self, player: &mut Player<S>, count: u64) -> u64 {
        let mut frames = 0;
        while frames < count && self.has_request() {
            if self.refresh(player) {
                frames += 1;
            }
        }
        frames
    }
}
