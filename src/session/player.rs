use std::rc::Rc;

use crate::config::PlayerConfig;
use crate::foundation::core::{Resolution, Seconds, Viewport};
use crate::foundation::error::{ToodleError, ToodleResult};
use crate::playback::clock::{Clock, ClockSnapshot, LoopMode, PlaybackState};
use crate::playback::observe::{ChangeSet, Observers, Signal, SubscriptionId, Watched};
use crate::playback::scheduler::{FrameHost, FrameScheduler};
use crate::render::cpu::CpuSurface;
use crate::render::{DrawList, Surface};
use crate::runtime::Runtime;
use crate::runtime::handle::{Environment, Image};
use crate::session::artifacts::{ArtifactSlots, PromoteMode};
use crate::session::output::OutputChannel;

/// Outcome of the most recent compile or run, for display.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationState {
    #[default]
    Unknown,
    Success,
    EvaluationError,
}

/// Counters over the player's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FrameStats {
    pub frames: u64,
    pub compiles: u64,
    pub compile_errors: u64,
    pub starts: u64,
    pub steps: u64,
    pub step_errors: u64,
    pub segments: u64,
}

/// Coordinates clock, scheduler, artifact slots and surface for one script.
///
/// All state changes go through methods that run inside a batch; when the outermost batch
/// closes, any change to an observed value produces exactly one `schedule()` and one
/// notification to subscribers. Frames run inside a batch too, so changes a frame makes
/// (time advancing, the dirty flag clearing) schedule its successor.
pub struct Player<S: Surface = CpuSurface> {
    runtime: Rc<dyn Runtime>,
    surface: S,
    scheduler: FrameScheduler,
    observers: Observers,
    clock: Clock,
    batch_clock: ClockSnapshot,
    source: String,
    script_dirty: Watched<bool>,
    visible: Watched<bool>,
    playback_speed: Watched<u32>,
    resolution: Watched<Resolution>,
    viewport: Viewport,
    evaluation: EvaluationState,
    slots: ArtifactSlots,
    output: OutputChannel,
    draw: DrawList,
    stats: FrameStats,
}

impl<S: Surface> std::fmt::Debug for Player<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("clock", &self.clock)
            .field("script_dirty", &self.script_dirty.value())
            .field("visible", &self.visible.value())
            .field("evaluation", &self.evaluation)
            .field("slots", &self.slots)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Player<CpuSurface> {
    /// Player drawing into a [`CpuSurface`] sized from `config.viewport`.
    pub fn new(
        runtime: Rc<dyn Runtime>,
        host: Box<dyn FrameHost>,
        config: &PlayerConfig,
    ) -> ToodleResult<Self> {
        config.validate()?;
        let surface = CpuSurface::new(config.viewport.resolution()?)?;
        Self::with_surface(runtime, host, surface, config)
    }
}

impl<S: Surface> Player<S> {
    pub fn with_surface(
        runtime: Rc<dyn Runtime>,
        host: Box<dyn FrameHost>,
        mut surface: S,
        config: &PlayerConfig,
    ) -> ToodleResult<Self> {
        config.validate()?;
        let resolution = config.viewport.resolution()?;
        if surface.resolution() != resolution {
            surface.resize(resolution)?;
        }
        let (start, end) = config.loop_bounds();
        let mut clock = Clock::new(start, end, config.loop_mode)?;
        if config.autoplay {
            clock.play();
        }
        Ok(Self {
            runtime,
            surface,
            scheduler: FrameScheduler::new(host),
            observers: Observers::default(),
            batch_clock: clock.snapshot(),
            clock,
            source: String::new(),
            script_dirty: Watched::new(false),
            visible: Watched::new(config.visible),
            playback_speed: Watched::new(config.playback_speed),
            resolution: Watched::new(resolution),
            viewport: config.viewport,
            evaluation: EvaluationState::Unknown,
            slots: ArtifactSlots::default(),
            output: OutputChannel::default(),
            draw: DrawList::default(),
            stats: FrameStats::default(),
        })
    }

    /// Run `f` as one update. Nested batches fold into the outermost one.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let outermost = !self.observers.in_batch();
        if outermost {
            self.batch_clock = self.clock.snapshot();
        }
        self.observers.begin_batch();
        let out = f(self);
        if outermost {
            let now = self.clock.snapshot();
            if now.state != self.batch_clock.state {
                self.observers.mark(Signal::ClockState);
            }
            if now.t != self.batch_clock.t {
                self.observers.mark(Signal::ClockTime);
            }
        }
        if let Some(changes) = self.observers.end_batch()
            && !changes.is_empty()
        {
            tracing::trace!(?changes, "state changed");
            self.scheduler.schedule();
            self.observers.notify(changes);
        }
        out
    }

    pub fn subscribe(
        &mut self,
        mask: ChangeSet,
        subscriber: impl FnMut(ChangeSet) + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(mask, Box::new(subscriber))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn set_dirty(&mut self) {
        if self.script_dirty.set(true) {
            self.observers.mark(Signal::ScriptDirty);
        }
    }

    /// Replace the source text (an edit). Compiles on the next frame.
    pub fn set_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        self.batch(|p| {
            p.source = source;
            p.set_dirty();
        });
    }

    /// Switch to a different script: drops the active image and its environment right away
    /// and compiles the new text on the next frame.
    pub fn switch_script(&mut self, source: impl Into<String>) {
        let source = source.into();
        self.batch(|p| {
            p.slots.clear_active();
            p.slots.clear_pending();
            p.surface.clear();
            p.source = source;
            p.set_dirty();
            tracing::debug!("script switched");
        });
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.batch(|p| {
            if p.visible.set(visible) {
                p.observers.mark(Signal::Visibility);
            }
        });
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> ToodleResult<()> {
        viewport.validate()?;
        let resolution = viewport.resolution()?;
        self.batch(|p| -> ToodleResult<()> {
            p.viewport = viewport;
            if p.resolution.set(resolution) {
                p.surface.resize(resolution)?;
                p.observers.mark(Signal::Resolution);
            }
            Ok(())
        })
    }

    /// Steps per advancing frame; must be at least 1.
    pub fn set_playback_speed(&mut self, speed: u32) -> ToodleResult<()> {
        if speed == 0 {
            return Err(ToodleError::validation("playback speed must be >= 1"));
        }
        self.batch(|p| {
            if p.playback_speed.set(speed) {
                p.observers.mark(Signal::PlaybackSpeed);
            }
        });
        Ok(())
    }

    pub fn play(&mut self) {
        self.batch(|p| p.clock.play());
    }

    pub fn pause(&mut self) {
        self.batch(|p| p.clock.pause());
    }

    pub fn play_pause(&mut self) {
        self.batch(|p| p.clock.play_pause());
    }

    /// Stop the clock and fully reset: the environment is released and the surface cleared,
    /// so the next frame redraws from a fresh environment at the loop start.
    pub fn stop(&mut self) {
        self.batch(|p| {
            p.clock.stop();
            p.reset_environment();
        });
    }

    /// Restart the active script from its first step and rewind the clock.
    pub fn restart(&mut self) {
        self.batch(|p| {
            p.clock.rewind();
            p.reset_environment();
        });
    }

    /// Promote the pending image on demand. Returns `false` if there was nothing new to load.
    pub fn load(&mut self) -> bool {
        self.batch(|p| {
            if !p.slots.can_load() {
                return false;
            }
            p.slots.promote(PromoteMode::Share);
            p.reset_environment();
            true
        })
    }

    pub fn set_loop_bounds(&mut self, start: Seconds, end: Seconds) -> ToodleResult<()> {
        self.batch(|p| p.clock.set_loop_bounds(start, end))
    }

    pub fn set_loop_mode(&mut self, mode: LoopMode) {
        self.batch(|p| p.clock.set_loop_mode(mode));
    }

    fn reset_environment(&mut self) {
        self.slots.clear_environment();
        self.surface.clear();
        // Not an observed value; ask for the redraw directly.
        self.scheduler.schedule();
    }

    /// Release every runtime handle. The player keeps working afterwards; a later frame
    /// recompiles if the source is marked dirty again.
    pub fn teardown(&mut self) {
        tracing::debug!("teardown");
        self.slots.teardown();
    }

    /// Deliver a host refresh. Returns whether a frame ran.
    pub fn on_refresh(&mut self, now_ms: f64) -> bool {
        let Some(elapsed) = self.scheduler.begin_frame(now_ms) else {
            return false;
        };
        self.frame(elapsed);
        self.scheduler.finish_frame();
        true
    }

    /// Run the frame pipeline once with `elapsed_ms` of wall time, outside of any scheduler
    /// bookkeeping.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn frame(&mut self, elapsed_ms: f64) {
        self.batch(|p| p.run_frame(elapsed_ms));
    }

    fn run_frame(&mut self, elapsed_ms: f64) {
        if !self.visible.value() {
            return;
        }
        self.stats.frames += 1;

        let advancing = self.clock.tick(elapsed_ms, true);
        // A wrapped tick can land on the same t, so the change set alone is not enough.
        if self.clock.is_playing() {
            self.scheduler.schedule();
        }

        if self.script_dirty.value() {
            self.recompile();
        }

        if !self.slots.has_active() && self.slots.pending().is_some() {
            self.slots.promote(PromoteMode::Share);
            self.slots.clear_environment();
            self.surface.clear();
        }

        if !self.slots.has_environment() && self.slots.has_active() {
            self.start_environment();
        }

        if advancing {
            self.step_environment();
        }

        if !self.draw.is_empty() {
            if let Err(err) = self.surface.render(&self.draw, self.viewport.pixel_ratio) {
                tracing::error!(error = %err, "render failed");
                self.output.print_err(err.to_string());
            }
            self.draw.clear();
        }
    }

    fn recompile(&mut self) {
        self.output.clear();
        self.stats.compiles += 1;
        let result = self.runtime.compile(&self.source);
        if self.script_dirty.set(false) {
            self.observers.mark(Signal::ScriptDirty);
        }
        match result {
            Ok(raw) => {
                let image = Image::adopt(Rc::clone(&self.runtime), raw);
                self.slots.store_compiled(image);
                self.evaluation = EvaluationState::Success;
            }
            Err(err) => {
                self.stats.compile_errors += 1;
                self.slots.clear_pending();
                self.fail(&err);
            }
        }
    }

    fn start_environment(&mut self) {
        let Some(image) = self.slots.active() else {
            return;
        };
        match self.runtime.start(image.raw()) {
            Ok(started) => {
                self.stats.starts += 1;
                let env = Environment::adopt(Rc::clone(&self.runtime), started.environment);
                self.slots.set_environment(env);
                self.draw.fill(started.background);
                for line in started.output {
                    self.output.print(line, false);
                }
            }
            Err(err) => self.fail(&err),
        }
    }

    fn step_environment(&mut self) {
        for _ in 0..self.playback_speed.value() {
            let Some(env) = self.slots.environment() else {
                break;
            };
            match self.runtime.step(env.raw()) {
                Ok(out) => {
                    self.stats.steps += 1;
                    self.stats.segments += out.lines.len() as u64;
                    if let Some(bg) = out.background {
                        self.draw.fill(bg);
                    }
                    self.draw.lines(out.lines);
                    for line in out.output {
                        self.output.print(line, false);
                    }
                }
                Err(err) => {
                    self.stats.step_errors += 1;
                    self.fail(&err);
                    self.slots.clear_environment();
                    break;
                }
            }
        }
    }

    /// Record a compile/start/step failure. Repeats of the last reported message are not
    /// written again, so a script that fails every frame does not flood the output.
    fn fail(&mut self, err: &ToodleError) {
        self.evaluation = EvaluationState::EvaluationError;
        let msg = err.message();
        if self.output.last().is_some_and(|l| l.is_err && l.text == msg) {
            return;
        }
        tracing::warn!(error = %err, "evaluation failed");
        self.output.print_err(msg);
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn state(&self) -> PlaybackState {
        self.clock.state()
    }

    pub fn t(&self) -> Seconds {
        self.clock.t()
    }

    pub fn evaluation_state(&self) -> EvaluationState {
        self.evaluation
    }

    pub fn can_load(&self) -> bool {
        self.slots.can_load()
    }

    pub fn can_restart(&self) -> bool {
        self.slots.has_active()
    }

    pub fn slots(&self) -> &ArtifactSlots {
        &self.slots
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_script_dirty(&self) -> bool {
        self.script_dirty.value()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.value()
    }

    pub fn playback_speed(&self) -> u32 {
        self.playback_speed.value()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution.value()
    }

    pub fn output(&self) -> &OutputChannel {
        &self.output
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }
}
