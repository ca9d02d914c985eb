use crate::foundation::error::{ToodleError, ToodleResult};

pub use kurbo::{Point, Vec2};

/// Playback timestamp in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Seconds(pub f64);

impl Seconds {
    pub const ZERO: Self = Self(0.0);

    pub fn from_millis(ms: f64) -> Self {
        Self(ms / 1000.0)
    }

    pub fn as_f64(self) -> f64 {
        self.0
    }
}

/// Straight-alpha color with channels in `0.0..=1.0`, the way the runtime reports it.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_finite(self) -> bool {
        self.r.is_finite() && self.g.is_finite() && self.b.is_finite() && self.a.is_finite()
    }

    /// Straight RGBA8, each channel clamped then rounded.
    pub fn to_rgba8(self) -> [u8; 4] {
        fn q(c: f64) -> u8 {
            (c.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Premultiplied RGBA8.
    pub fn to_premul_rgba8(self) -> [u8; 4] {
        let [r, g, b, a] = self.to_rgba8();
        let a16 = u16::from(a);
        let premul = |c: u8| -> u8 { (((u16::from(c) * a16) + 127) / 255) as u8 };
        [premul(r), premul(g), premul(b), a]
    }
}

/// One drawable segment produced by a step. Coordinates are in logical units about the
/// surface center, y pointing up.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Line {
    pub start: Point,
    pub end: Point,
    pub color: Color,
    pub width: f64,
}

/// Pixel dimensions of a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> ToodleResult<Self> {
        if width == 0 || height == 0 {
            return Err(ToodleError::validation("Resolution must be non-zero"));
        }
        if u16::try_from(width).is_err() || u16::try_from(height).is_err() {
            return Err(ToodleError::validation("Resolution must fit in u16"));
        }
        Ok(Self { width, height })
    }

    pub fn pixel_count(self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// Logical canvas size plus device pixel ratio. The target resolution is derived, so a ratio
/// change alone re-targets the surface.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            pixel_ratio: 1.0,
        }
    }
}

impl Viewport {
    pub fn validate(&self) -> ToodleResult<()> {
        if !self.pixel_ratio.is_finite() || self.pixel_ratio <= 0.0 {
            return Err(ToodleError::validation(
                "Viewport pixel_ratio must be finite and > 0",
            ));
        }
        self.resolution().map(|_| ())
    }

    pub fn resolution(&self) -> ToodleResult<Resolution> {
        let w = (f64::from(self.width) * self.pixel_ratio).round();
        let h = (f64::from(self.height) * self.pixel_ratio).round();
        Resolution::new(w as u32, h as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_premul_scales_channels_by_alpha() {
        assert_eq!(Color::rgb(1.0, 0.0, 0.0).to_premul_rgba8(), [255, 0, 0, 255]);
        assert_eq!(
            Color::rgba(1.0, 1.0, 1.0, 0.0).to_premul_rgba8(),
            [0, 0, 0, 0]
        );
        let [r, _, _, a] = Color::rgba(1.0, 0.0, 0.0, 0.5).to_premul_rgba8();
        assert_eq!(a, 128);
        assert_eq!(r, 128);
    }

    #[test]
    fn color_channels_are_clamped() {
        assert_eq!(
            Color::rgba(2.0, -1.0, 0.5, 1.0).to_rgba8(),
            [255, 0, 128, 255]
        );
    }

    #[test]
    fn viewport_resolution_applies_pixel_ratio() {
        let v = Viewport {
            width: 256,
            height: 128,
            pixel_ratio: 2.0,
        };
        assert_eq!(v.resolution().unwrap(), Resolution::new(512, 256).unwrap());
    }

    #[test]
    fn viewport_rejects_bad_ratio_and_size() {
        let mut v = Viewport::default();
        v.pixel_ratio = 0.0;
        assert!(v.validate().is_err());
        let v = Viewport {
            width: 0,
            ..Viewport::default()
        };
        assert!(v.validate().is_err());
        let v = Viewport {
            width: 70_000,
            ..Viewport::default()
        };
        assert!(v.validate().is_err());
    }
}
