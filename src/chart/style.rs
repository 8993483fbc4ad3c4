use crate::foundation::core::{MAX_DAY_BANDS, Rgba8};
use crate::render::cpu::RasterOpts;

/// Target arc colours, outermost planet first.
pub const TARGET_PALETTE: [Rgba8; 7] = [
    Rgba8::rgb(0x57, 0x57, 0xe5), // Neptune
    Rgba8::rgb(0x1f, 0x99, 0x1f), // Uranus
    Rgba8::rgb(0xdf, 0x41, 0xe5), // Saturn
    Rgba8::rgb(0x39, 0xe5, 0xe5), // Jupiter
    Rgba8::rgb(0xff, 0x40, 0x40), // Mars
    Rgba8::rgb(0xe5, 0xcd, 0x45), // Venus
    Rgba8::rgb(0x92, 0xcc, 0x7c), // Mercury
];

/// Palette slot used when a query has exactly one target.
pub const SINGLE_TARGET_SLOT: usize = 4;

/// Background rectangle colours, by band position from noon through night to noon.
pub const BAND_DECOR: [Rgba8; MAX_DAY_BANDS] = [
    Rgba8::rgb(0xbf, 0x7b, 0x00),
    Rgba8::rgb(0x5b, 0x6b, 0x91),
    Rgba8::rgb(0x38, 0x33, 0x9e),
    Rgba8::rgb(0x29, 0x00, 0x7a),
    Rgba8::rgb(0x00, 0x00, 0x47),
    Rgba8::rgb(0x29, 0x00, 0x7a),
    Rgba8::rgb(0x38, 0x33, 0x9e),
    Rgba8::rgb(0x5b, 0x6b, 0x91),
    Rgba8::rgb(0xbf, 0x7b, 0x00),
];

/// Presentation settings for a chart session, fixed for its lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartStyle {
    pub palette: Vec<Rgba8>,
    pub band_decor: [Rgba8; MAX_DAY_BANDS],
    pub line_width: f64,
    pub arc_z: i32,
    pub band_z: i32,
    pub altitude_range: (f64, f64),
    pub threshold: f64,
    pub threshold_color: Rgba8,
    pub grid_alpha: f64,
    pub raster: RasterOpts,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            palette: TARGET_PALETTE.to_vec(),
            band_decor: BAND_DECOR,
            line_width: 4.0,
            arc_z: 2,
            band_z: 1,
            altitude_range: (-30.0, 90.0),
            threshold: 30.0,
            threshold_color: Rgba8::grey(0x80),
            grid_alpha: 0.2,
            raster: RasterOpts::default(),
        }
    }
}

impl ChartStyle {
    /// Lunar segments are grey, brighter the more of the moon is lit.
    pub fn lunar_color(&self, illumination: f64) -> Rgba8 {
        Rgba8::grey((illumination.clamp(0.0, 1.0) * 255.0).floor() as u8)
    }

    /// Palette slot of target `index` out of `count`.
    pub fn target_slot(&self, index: usize, count: usize) -> usize {
        let slot = if count == 1 { SINGLE_TARGET_SLOT } else { index };
        slot % self.palette.len().max(1)
    }

    /// Target colour for one hour, fading as the moon brightens.
    pub fn target_color(&self, slot: usize, illumination: f64) -> Rgba8 {
        let base = self
            .palette
            .get(slot)
            .copied()
            .unwrap_or(TARGET_PALETTE[SINGLE_TARGET_SLOT]);
        base.with_opacity(0.6 - 0.4 * illumination.clamp(0.0, 1.0))
    }

    pub fn grid_color(&self) -> Rgba8 {
        self.raster.ink.with_opacity(self.grid_alpha)
    }
}
