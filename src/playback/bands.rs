use crate::canvas::{Canvas, MarkId};
use crate::foundation::core::Extent;
use crate::foundation::error::{ReelError, ReelResult};

/// Moves the background band rectangles during playback. Bands are only ever resized.
#[derive(Clone, Debug)]
pub struct BandShifter {
    blocks: Vec<MarkId>,
}

impl BandShifter {
    pub fn new(blocks: Vec<MarkId>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[MarkId] {
        &self.blocks
    }

    fn block(&self, band: usize) -> ReelResult<MarkId> {
        self.blocks.get(band).copied().ok_or_else(|| {
            ReelError::consistency(format!(
                "background band {band} outside 0..{}",
                self.blocks.len()
            ))
        })
    }

    /// Apply a day-0 partial extent.
    pub fn grow<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        band: usize,
        extent: Extent,
    ) -> ReelResult<()> {
        canvas.set_rect_extent(self.block(band)?, extent)
    }

    /// Resize `band` and move the right-hand neighbour's left edge by the width difference, so
    /// the two still meet.
    ///
    /// A neighbour whose right edge the new boundary overruns collapses to zero width at the
    /// boundary, and the next band along takes up the remainder. Right edges never move.
    pub fn shift<C: Canvas + ?Sized>(
        &self,
        canvas: &mut C,
        band: usize,
        extent: Extent,
    ) -> ReelResult<()> {
        let block = self.block(band)?;
        let shift = canvas.rect_extent(block)?.width() - extent.width();
        canvas.set_rect_extent(block, extent)?;

        let mut edge = None;
        for next in self.blocks.iter().skip(band + 1) {
            let n = canvas.rect_extent(*next)?;
            let left = *edge.get_or_insert(n.x() - shift);
            let right = n.right();
            if right >= left {
                return canvas.set_rect_extent(*next, n.with_x(left).with_width(right - left));
            }
            canvas.set_rect_extent(*next, n.with_x(left).with_width(0.0))?;
        }
        Ok(())
    }

    /// Erode every band whose left edge lies in hour `clip_at`: its left edge moves to
    /// `clip_at + 1`, its right edge stays, and the width never goes negative.
    pub fn decay<C: Canvas + ?Sized>(&self, canvas: &mut C, clip_at: usize) -> ReelResult<()> {
        for block in &self.blocks {
            let e = canvas.rect_extent(*block)?;
            if e.x().floor() != clip_at as f64 {
                continue;
            }
            let new_x = clip_at as f64 + 1.0;
            let width = (e.right() - new_x).max(0.0);
            canvas.set_rect_extent(*block, e.with_x(new_x).with_width(width))?;
        }
        Ok(())
    }
}
