use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScriptError {
    pub(crate) offset: usize,
    pub(crate) message: String,
}

impl ScriptError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }

    /// 1-based line and column of the error within `src`.
    pub(crate) fn location(&self, src: &str) -> (usize, usize) {
        let upto = &src[..self.offset.min(src.len())];
        let line = upto.matches('\n').count() + 1;
        let col = upto.rfind('\n').map_or(upto.len(), |nl| upto.len() - nl - 1) + 1;
        (line, col)
    }

    pub(crate) fn render(&self, src: &str) -> String {
        let (line, col) = self.location(src);
        format!("{line}:{col}: {}", self.message)
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "script error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for ScriptError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_one_based() {
        let src = "forward(1)\n  turn(x)";
        let e = ScriptError::new(src.find("x").unwrap(), "unknown name");
        assert_eq!(e.location(src), (2, 8));
        assert_eq!(e.render(src), "2:8: unknown name");
    }
}
