use kurbo::{BezPath, Cap, PathEl, Point, Stroke, StrokeOpts};

use crate::foundation::core::{Color, Line, Resolution};
use crate::foundation::error::{ToodleError, ToodleResult};
use crate::render::composite::over_in_place;
use crate::render::{DrawCmd, DrawList, FrameRGBA, Surface};

const STROKE_TOLERANCE: f64 = 0.1;

/// Software surface backed by `vello_cpu`.
///
/// Each `render` rasterizes its draw list into a transparent layer, which is then composited
/// over the accumulation buffer. Logical coordinates have their origin at the center of the
/// surface with y pointing up.
pub struct CpuSurface {
    width: u16,
    height: u16,
    accum: Vec<u8>,
    layer: vello_cpu::Pixmap,
}

impl std::fmt::Debug for CpuSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl CpuSurface {
    pub fn new(resolution: Resolution) -> ToodleResult<Self> {
        let (width, height) = dims(resolution)?;
        Ok(Self {
            width,
            height,
            accum: vec![0; resolution.pixel_count() * 4],
            layer: vello_cpu::Pixmap::new(width, height),
        })
    }

    /// Logical point to pixel space.
    fn to_px(&self, p: Point, pixel_ratio: f64) -> vello_cpu::kurbo::Point {
        vello_cpu::kurbo::Point::new(
            f64::from(self.width) / 2.0 + p.x * pixel_ratio,
            f64::from(self.height) / 2.0 - p.y * pixel_ratio,
        )
    }

    fn draw_line(&self, ctx: &mut vello_cpu::RenderContext, line: &Line, pixel_ratio: f64) {
        let width = line.width * pixel_ratio;
        if width <= 0.0 || line.color.a <= 0.0 {
            return;
        }
        let a = self.to_px(line.start, pixel_ratio);
        let b = self.to_px(line.end, pixel_ratio);
        let mut seg = BezPath::new();
        seg.move_to((a.x, a.y));
        seg.line_to((b.x, b.y));
        let style = Stroke::new(width).with_caps(Cap::Round);
        let outline = kurbo::stroke(seg.iter(), &style, &StrokeOpts::default(), STROKE_TOLERANCE);
        set_color(ctx, line.color);
        ctx.fill_path(&bezpath_to_cpu(&outline));
    }
}

impl Surface for CpuSurface {
    fn resize(&mut self, resolution: Resolution) -> ToodleResult<()> {
        let (width, height) = dims(resolution)?;
        if (width, height) == (self.width, self.height) {
            return Ok(());
        }
        tracing::debug!(width, height, "cpu surface resized");
        *self = Self::new(resolution)?;
        Ok(())
    }

    fn clear(&mut self) {
        self.accum.fill(0);
    }

    fn render(&mut self, list: &DrawList, pixel_ratio: f64) -> ToodleResult<()> {
        if list.is_empty() {
            return Ok(());
        }
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(ToodleError::render("pixel ratio must be finite and > 0"));
        }

        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        let full = vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        );
        for cmd in list.cmds() {
            match cmd {
                DrawCmd::Fill(color) => {
                    set_color(&mut ctx, *color);
                    ctx.fill_rect(&full);
                }
                DrawCmd::Lines(batch) => {
                    for line in batch.lines() {
                        self.draw_line(&mut ctx, line, pixel_ratio);
                    }
                }
            }
        }
        ctx.flush();

        self.layer.data_as_u8_slice_mut().fill(0);
        ctx.render_to_pixmap(&mut self.layer);
        over_in_place(&mut self.accum, self.layer.data_as_u8_slice())
    }

    fn resolution(&self) -> Resolution {
        Resolution {
            width: u32::from(self.width),
            height: u32::from(self.height),
        }
    }

    fn snapshot(&self) -> Option<FrameRGBA> {
        Some(FrameRGBA {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data: self.accum.clone(),
            premultiplied: true,
        })
    }
}

fn dims(resolution: Resolution) -> ToodleResult<(u16, u16)> {
    let w = u16::try_from(resolution.width)
        .map_err(|_| ToodleError::render("surface width exceeds u16"))?;
    let h = u16::try_from(resolution.height)
        .map_err(|_| ToodleError::render("surface height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(ToodleError::render("surface size must be non-zero"));
    }
    Ok((w, h))
}

fn set_color(ctx: &mut vello_cpu::RenderContext, color: Color) {
    let [r, g, b, a] = color.to_rgba8();
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
