use std::collections::VecDeque;

/// One line written by the runtime or the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct OutputLine {
    pub text: String,
    pub is_err: bool,
}

/// Lines kept by an [`OutputChannel`]; older lines are dropped first.
pub const MAX_OUTPUT_LINES: usize = 1000;

/// Text sink shown next to the canvas. Cleared before every compile so it only ever shows
/// output of the current source.
#[derive(Clone, Debug, Default)]
pub struct OutputChannel {
    lines: VecDeque<OutputLine>,
    dropped: u64,
}

impl OutputChannel {
    pub fn print(&mut self, text: impl Into<String>, is_err: bool) {
        if self.lines.len() == MAX_OUTPUT_LINES {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(OutputLine {
            text: text.into(),
            is_err,
        });
    }

    pub fn print_err(&mut self, text: impl Into<String>) {
        self.print(text, true);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.dropped = 0;
    }

    pub fn lines(&self) -> impl DoubleEndedIterator<Item = &OutputLine> + ExactSizeIterator {
        self.lines.iter()
    }

    pub fn last(&self) -> Option<&OutputLine> {
        self.lines.back()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Lines dropped from the front since the last clear.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .filter(|l| l.is_err)
            .map(|l| l.text.as_str())
    }

    /// All lines joined with newlines.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&line.text);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_and_clears() {
        let mut out = OutputChannel::default();
        out.print("hello", false);
        out.print_err("boom");
        assert_eq!(out.text(), "hello\nboom");
        assert_eq!(out.errors().collect::<Vec<_>>(), vec!["boom"]);
        out.clear();
        assert!(out.is_empty());
    }

    #[test]
    fn keeps_only_the_newest_lines() {
        let mut out = OutputChannel::default();
        for i in 0..MAX_OUTPUT_LINES + 5 {
            out.print(i.to_string(), false);
        }
        assert_eq!(out.len(), MAX_OUTPUT_LINES);
        assert_eq!(out.dropped(), 5);
        assert_eq!(out.lines().next().unwrap().text, "5");
        assert_eq!(out.last().unwrap().text, (MAX_OUTPUT_LINES + 4).to_string());
        out.clear();
        assert_eq!(out.dropped(), 0);
    }
}
