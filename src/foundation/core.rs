use crate::foundation::error::{ReelError, ReelResult};

pub use kurbo::{Affine, Line, Point, Rect, Size};

/// Width of the chart's x-axis: one day measured in hours after local noon.
pub const HOURS_PER_DAY: f64 = 24.0;

/// Chart bands per day: the hour ticks 0..=24, each one animated frame.
pub const CHART_BANDS: usize = 25;

/// Maximum number of daylight/twilight background bands in one day.
pub const MAX_DAY_BANDS: usize = 9;

/// Chart band (hour-of-day index) that a chart x-coordinate falls into.
///
/// Values outside the axis clamp to the first/last band.
pub fn chart_band_of(x: f64) -> usize {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    (x.floor() as usize).min(CHART_BANDS - 1)
}

/// Absolute 0-based frame index in an encoded stream.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Rate used for both previews and exports: two animated days per second.
    pub const CHART: Fps = Fps { num: 50, den: 1 };

    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> ReelResult<Self> {
        if den == 0 {
            return Err(ReelError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ReelError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    pub fn frame_duration(self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.frame_duration_secs())
    }

    /// Whole frames that fit in one second (at least one).
    pub fn frames_per_second_floor(self) -> u64 {
        (self.as_f64().floor() as u64).max(1)
    }
}

/// Axis-aligned extent in chart units: origin is the lower-left corner (hours, degrees).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Extent {
    pub origin: Point,
    pub size: Size,
}

impl Extent {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// Full-height band between two hours on the altitude axis.
    pub fn band(start: f64, end: f64) -> Self {
        Self::new(start, -90.0, end - start, 180.0)
    }

    pub fn x(&self) -> f64 {
        self.origin.x
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    /// Right-hand edge (`x + width`).
    pub fn right(&self) -> f64 {
        self.origin.x + self.size.width
    }

    pub fn with_x(mut self, x: f64) -> Self {
        self.origin.x = x;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.size.width = width;
        self
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.size)
    }
}

/// Straight-alpha RGBA8 colour as resolved for a mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn grey(level: u8) -> Self {
        Self::rgb(level, level, level)
    }

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> ReelResult<Self> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ReelError::validation(format!("colour '{s}' must start with '#'")))?;
        if hex.len() != 6 && hex.len() != 8 {
            return Err(ReelError::validation(format!(
                "colour '{s}' must have 6 or 8 hex digits"
            )));
        }
        let channel = |i: usize| -> ReelResult<u8> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| ReelError::validation(format!("colour '{s}': {e}")))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
            a: if hex.len() == 8 { channel(6)? } else { 255 },
        })
    }

    /// Same colour with alpha taken from a 0..=1 opacity.
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self { a, ..self }
    }

    /// Premultiplied RGBA8 bytes.
    pub fn premultiplied(self) -> [u8; 4] {
        let a = u16::from(self.a);
        let premul = |c: u8| -> u8 { (((u16::from(c) * a) + 127) / 255) as u8 };
        [premul(self.r), premul(self.g), premul(self.b), self.a]
    }

    pub fn to_svg_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_band_floors_and_clamps() {
        assert_eq!(chart_band_of(0.0), 0);
        assert_eq!(chart_band_of(5.99), 5);
        assert_eq!(chart_band_of(24.0), 24);
        assert_eq!(chart_band_of(30.0), 24);
        assert_eq!(chart_band_of(-1.0), 0);
        assert_eq!(chart_band_of(f64::NAN), 0);
    }

    #[test]
    fn fps_rejects_zero_parts() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(50, 0).is_err());
        let fps = Fps::new(50, 1).unwrap();
        assert_eq!(fps.frames_per_second_floor(), 50);
        assert!((fps.frame_duration_secs() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn extent_edges() {
        let e = Extent::new(5.0, -90.0, 3.0, 180.0);
        assert_eq!(e.right(), 8.0);
        assert_eq!(e.with_x(6.0).right(), 9.0);
        assert_eq!(Extent::band(2.5, 4.0).width(), 1.5);
    }

    #[test]
    fn hex_colours_parse() {
        assert_eq!(Rgba8::from_hex("#ff4040").unwrap(), Rgba8::rgb(255, 64, 64));
        assert_eq!(Rgba8::from_hex("#00000080").unwrap().a, 128);
        assert!(Rgba8::from_hex("ff4040").is_err());
        assert!(Rgba8::from_hex("#ff40").is_err());
        assert!(Rgba8::from_hex("#gg4040").is_err());
    }

    #[test]
    fn premultiply_half_alpha() {
        assert_eq!(Rgba8::rgb(255, 0, 0).with_opacity(0.5).premultiplied(), [128, 0, 0, 128]);
    }
}
