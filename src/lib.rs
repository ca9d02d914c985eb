//! Toodle plays compiled turtle scripts on demand.
//!
//! A [`Player`] ties together a looping [`Clock`], a [`FrameScheduler`] that only asks the host
//! for a frame when something observable changed, and the reference-counted artifacts a
//! [`Runtime`] hands out (compiled images and running environments):
//!
//! - Give the player source text with [`Player::set_source`]
//! - Drive it from a host refresh with [`Player::on_refresh`] (or a [`HeadlessDisplay`])
//! - Read back pixels from the [`CpuSurface`] or draw lists from a [`RecordingSurface`]
#![forbid(unsafe_code)]

mod config;
mod foundation;

pub(crate) mod playback;
pub(crate) mod render;
pub(crate) mod runtime;
pub(crate) mod script;
pub(crate) mod session;

pub use crate::config::PlayerConfig;
pub use crate::foundation::core::{Color, Line, Point, Resolution, Seconds, Vec2, Viewport};
pub use crate::foundation::error::{ToodleError, ToodleResult};

pub use crate::playback::clock::{Clock, ClockSnapshot, Direction, LoopMode, PlaybackState};
pub use crate::playback::headless::HeadlessHost;
pub use crate::playback::observe::{ChangeSet, Observers, Signal, SubscriptionId, Watched};
pub use crate::playback::scheduler::{FrameHost, FrameScheduler};

pub use crate::render::cpu::CpuSurface;
pub use crate::render::recording::RecordingSurface;
pub use crate::render::{DrawCmd, DrawList, FrameRGBA, Surface};

pub use crate::runtime::handle::{Environment, EnvironmentKind, HandleKind, Image, ImageKind, Owned};
pub use crate::runtime::ledger::HandleTable;
pub use crate::runtime::{GeometryBatch, RawHandle, ResourceKind, Runtime, Started, StepOutput};

pub use crate::script::runtime::{MAX_SEGMENTS_PER_STEP, ScriptRuntime};

pub use crate::session::artifacts::{ArtifactSlots, PromoteMode};
pub use crate::session::display::{HeadlessDisplay, RunSummary};
pub use crate::session::output::{MAX_OUTPUT_LINES, OutputChannel, OutputLine};
pub use crate::session::player::{EvaluationState, FrameStats, Player};
