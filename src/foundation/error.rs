pub type ToodleResult<T> = Result<T, ToodleError>;

#[derive(thiserror::Error, Debug)]
pub enum ToodleError {
    #[error("validation error: {0}")]
    Validation(String),

    /// Source text failed to produce an image. Recoverable.
    #[error("compile error: {0}")]
    Compile(String),

    /// A running environment faulted mid-playback. Recoverable.
    #[error("step error: {0}")]
    Step(String),

    #[error("render error: {0}")]
    Render(String),

    /// Retain/release imbalance or use of a dead handle. Never user-recoverable.
    #[error("resource misuse: {0}")]
    ResourceMisuse(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToodleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn compile(msg: impl Into<String>) -> Self {
        Self::Compile(msg.into())
    }

    pub fn step(msg: impl Into<String>) -> Self {
        Self::Step(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn resource_misuse(msg: impl Into<String>) -> Self {
        Self::ResourceMisuse(msg.into())
    }

    /// The bare message, without the display prefix. Used when surfacing errors to the output
    /// channel, which already knows which stage failed.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(m)
            | Self::Compile(m)
            | Self::Step(m)
            | Self::Render(m)
            | Self::ResourceMisuse(m) => m.clone(),
            Self::Other(e) => e.to_string(),
        }
    }
}
