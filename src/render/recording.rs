use crate::foundation::core::Resolution;
use crate::foundation::error::ToodleResult;
use crate::render::{DrawCmd, DrawList, Surface};

/// Surface that keeps every draw list it receives instead of pixels.
#[derive(Debug)]
pub struct RecordingSurface {
    resolution: Resolution,
    frames: Vec<DrawList>,
    clears: usize,
    resizes: Vec<Resolution>,
}

impl RecordingSurface {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            frames: Vec::new(),
            clears: 0,
            resizes: Vec::new(),
        }
    }

    /// Draw lists in the order they were rendered. Cleared by [`Surface::clear`].
    pub fn frames(&self) -> &[DrawList] {
        &self.frames
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    pub fn resizes(&self) -> &[Resolution] {
        &self.resizes
    }

    /// Every command rendered since the last clear, flattened.
    pub fn commands(&self) -> impl Iterator<Item = &DrawCmd> {
        self.frames.iter().flat_map(|f| f.cmds())
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, resolution: Resolution) -> ToodleResult<()> {
        self.resolution = resolution;
        self.resizes.push(resolution);
        Ok(())
    }

    fn clear(&mut self) {
        self.frames.clear();
        self.clears += 1;
    }

    fn render(&mut self, list: &DrawList, _pixel_ratio: f64) -> ToodleResult<()> {
        if !list.is_empty() {
            self.frames.push(list.clone());
        }
        Ok(())
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}
