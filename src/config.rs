use std::path::Path;

use crate::foundation::core::{Seconds, Viewport};
use crate::foundation::error::{ToodleError, ToodleResult};
use crate::playback::clock::LoopMode;

/// Player settings, loadable from JSON. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub loop_start: f64,
    pub loop_end: f64,
    pub loop_mode: LoopMode,
    /// Environment steps per advancing frame.
    pub playback_speed: u32,
    /// Start playing as soon as the player is created.
    pub autoplay: bool,
    pub visible: bool,
    pub viewport: Viewport,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            loop_start: 0.0,
            loop_end: 10.0,
            loop_mode: LoopMode::Wrap,
            playback_speed: 1,
            autoplay: true,
            visible: true,
            viewport: Viewport::default(),
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> ToodleResult<()> {
        if !self.loop_start.is_finite() || !self.loop_end.is_finite() {
            return Err(ToodleError::validation("loop bounds must be finite"));
        }
        if self.loop_start < 0.0 {
            return Err(ToodleError::validation("loop_start must be >= 0"));
        }
        if self.loop_end < self.loop_start {
            return Err(ToodleError::validation(format!(
                "loop_end ({}) must be >= loop_start ({})",
                self.loop_end, self.loop_start
            )));
        }
        if self.playback_speed == 0 {
            return Err(ToodleError::validation("playback_speed must be >= 1"));
        }
        self.viewport.validate()
    }

    pub fn loop_bounds(&self) -> (Seconds, Seconds) {
        (Seconds(self.loop_start), Seconds(self.loop_end))
    }

    pub fn from_json_str(s: &str) -> ToodleResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| ToodleError::validation(format!("invalid player config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_path(path: &Path) -> ToodleResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ToodleError::validation(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}
