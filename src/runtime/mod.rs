//! Boundary to the compiler/runtime collaborator.
//!
//! The runtime hands out raw handles for compiled images and running environments and keeps a
//! reference count for each on its side. Nothing on this side touches those counts directly:
//! raw handles are wrapped in [`handle::Owned`] as soon as they cross the boundary.

pub(crate) mod handle;
pub(crate) mod ledger;

use crate::foundation::core::{Color, Line};
use crate::foundation::error::ToodleResult;

/// Untyped handle value as issued by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(pub u64);

impl std::fmt::Display for RawHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Environment,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Environment => "environment",
        }
    }
}

/// Result of instantiating an image. The environment handle arrives with a count of one that
/// the caller owns.
#[derive(Clone, Debug, PartialEq)]
pub struct Started {
    pub environment: RawHandle,
    pub background: Color,
    /// Lines printed by setup.
    pub output: Vec<String>,
}

/// Ordered line segments emitted by one step. The batch is consumed by drawing and dropped
/// afterwards; it never outlives the frame that produced it.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct GeometryBatch {
    lines: Vec<Line>,
}

impl GeometryBatch {
    pub fn new(lines: Vec<Line>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<Line> {
        self.lines
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct StepOutput {
    pub lines: GeometryBatch,
    /// Background paint requested by this step, if any.
    pub background: Option<Color>,
    /// Lines printed by this step.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
}

/// Synchronous runtime operations.
///
/// `compile` returns an image handle that already carries one reference owned by the caller;
/// `start` does the same for the environment it creates. `retain`/`release` adjust counts and
/// must balance exactly; a release past zero is misuse on the runtime's side.
pub trait Runtime {
    fn compile(&self, source: &str) -> ToodleResult<RawHandle>;

    fn start(&self, image: RawHandle) -> ToodleResult<Started>;

    fn step(&self, environment: RawHandle) -> ToodleResult<StepOutput>;

    fn retain(&self, kind: ResourceKind, handle: RawHandle);

    fn release(&self, kind: ResourceKind, handle: RawHandle);
}
