//! Output surfaces.
//!
//! The frame pipeline collects one [`DrawList`] per frame and hands it to a [`Surface`]. A
//! surface accumulates output across frames (turtle trails persist) until it is cleared.

pub(crate) mod composite;
pub(crate) mod cpu;
pub(crate) mod recording;

use crate::foundation::core::{Color, Resolution};
use crate::foundation::error::{ToodleError, ToodleResult};
use crate::runtime::GeometryBatch;

/// A rendered frame.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Straight-alpha copy, the layout image encoders expect.
    pub fn to_straight(&self) -> Self {
        if !self.premultiplied {
            return self.clone();
        }
        let mut data = Vec::with_capacity(self.data.len());
        for px in self.data.chunks_exact(4) {
            data.extend_from_slice(&composite::unpremultiply([px[0], px[1], px[2], px[3]]));
        }
        Self {
            width: self.width,
            height: self.height,
            data,
            premultiplied: false,
        }
    }

    pub fn save_png(&self, path: &std::path::Path) -> ToodleResult<()> {
        let straight = self.to_straight();
        image::save_buffer_with_format(
            path,
            &straight.data,
            straight.width,
            straight.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| ToodleError::render(format!("write {}: {e}", path.display())))
    }
}

/// One paint operation, in frame order.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCmd {
    /// Cover the whole surface with a color, composited over what is there.
    Fill(Color),
    Lines(GeometryBatch),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawList {
    cmds: Vec<DrawCmd>,
}

impl DrawList {
    pub fn fill(&mut self, color: Color) {
        self.cmds.push(DrawCmd::Fill(color));
    }

    pub fn lines(&mut self, batch: GeometryBatch) {
        if !batch.is_empty() {
            self.cmds.push(DrawCmd::Lines(batch));
        }
    }

    pub fn cmds(&self) -> &[DrawCmd] {
        &self.cmds
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.cmds
            .iter()
            .map(|c| match c {
                DrawCmd::Lines(b) => b.len(),
                DrawCmd::Fill(_) => 0,
            })
            .sum()
    }

    /// Drop all commands, and with them every geometry batch of the frame.
    pub fn clear(&mut self) {
        self.cmds.clear();
    }
}

/// Render target driven by the frame pipeline.
pub trait Surface {
    fn resize(&mut self, resolution: Resolution) -> ToodleResult<()>;

    /// Discard accumulated output.
    fn clear(&mut self);

    /// Paint `list` on top of the accumulated output. Logical coordinates are scaled by
    /// `pixel_ratio`.
    fn render(&mut self, list: &DrawList, pixel_ratio: f64) -> ToodleResult<()>;

    fn resolution(&self) -> Resolution;

    /// Current contents, if the surface keeps pixels.
    fn snapshot(&self) -> Option<FrameRGBA> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{Line, Point};

    #[test]
    fn empty_batches_are_not_recorded() {
        let mut list = DrawList::default();
        list.lines(GeometryBatch::default());
        assert!(list.is_empty());
        list.fill(Color::BLACK);
        list.lines(GeometryBatch::new(vec![Line {
            start: Point::ORIGIN,
            end: Point::new(1.0, 1.0),
            color: Color::WHITE,
            width: 1.0,
        }]));
        assert_eq!(list.cmds().len(), 2);
        assert_eq!(list.segment_count(), 1);
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn straight_conversion_unpremultiplies() {
        let f = FrameRGBA {
            width: 1,
            height: 1,
            data: vec![128, 0, 0, 128],
            premultiplied: true,
        };
        let s = f.to_straight();
        assert!(!s.premultiplied);
        assert_eq!(s.pixel(0, 0), Some([255, 0, 0, 128]));
        assert_eq!(s.pixel(1, 0), None);
    }
}
