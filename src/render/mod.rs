//! Rasterization of the retained chart scene.

pub mod cpu;

use crate::foundation::error::{ReelError, ReelResult};

/// A rendered frame as RGBA8 pixels.
///
/// Chart frames are painted onto an opaque face colour, so premultiplied and straight bytes agree;
/// the flag is kept explicit for sinks that flatten onto a background.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    pub fn expected_len(width: u32, height: u32) -> usize {
        (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    }

    pub fn check_len(&self) -> ReelResult<()> {
        let expected = Self::expected_len(self.width, self.height);
        if self.data.len() != expected {
            return Err(ReelError::validation(format!(
                "frame data length mismatch: got {}, expected {expected}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// RGBA8 of the pixel at `(x, y)`, if inside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

pub(crate) fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Source-over composite of premultiplied RGBA8 `src` onto `dst`.
pub(crate) fn over_in_place(dst: &mut [u8], src: &[u8]) -> ReelResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255 - sa;
        for i in 0..4 {
            let v = u16::from(s[i]) + mul_div255(u16::from(d[i]), inv);
            d[i] = v.min(255) as u8;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_transparent_src_is_identity() {
        let mut dst = vec![10, 20, 30, 255];
        over_in_place(&mut dst, &[0, 0, 0, 0]).unwrap();
        assert_eq!(dst, vec![10, 20, 30, 255]);
    }

    #[test]
    fn over_opaque_src_replaces() {
        let mut dst = vec![10, 20, 30, 255];
        over_in_place(&mut dst, &[200, 100, 50, 255]).unwrap();
        assert_eq!(dst, vec![200, 100, 50, 255]);
    }

    #[test]
    fn over_rejects_mismatched_buffers() {
        let mut dst = vec![0; 8];
        assert!(over_in_place(&mut dst, &[0; 4]).is_err());
    }

    #[test]
    fn pixel_lookup_bounds() {
        let f = FrameRGBA {
            width: 2,
            height: 1,
            data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            premultiplied: true,
        };
        f.check_len().unwrap();
        assert_eq!(f.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(f.pixel(2, 0), None);
    }
}
