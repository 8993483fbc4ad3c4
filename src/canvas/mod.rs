//! Chart-surface capability consumed by the recorder, the playback engine and the session.
//!
//! The core never computes pixel geometry. It decides when, and with which parameters, these
//! primitives run; an implementation owns the retained marks.

pub mod scene;

use crate::foundation::core::{Extent, Line, Point, Rgba8};
use crate::foundation::error::ReelResult;
use crate::render::FrameRGBA;

/// Opaque handle to a retained mark (line batch, rectangle, guide or grid).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkId(pub(crate) u32);

/// How urgently a redraw is wanted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Redraw {
    /// Before the next frame is shown or captured.
    Immediate,
    /// Whenever the surface is next idle.
    Deferred,
}

pub trait Canvas {
    /// Add a batch of line segments. `colors` maps onto segments by position; when shorter, the
    /// last colour repeats.
    fn add_line_batch(
        &mut self,
        segments: &[Line],
        colors: &[Rgba8],
        width: f64,
        z_order: i32,
    ) -> ReelResult<MarkId>;

    /// Append `point` to the last polyline of `batch`, overriding its colour and width.
    fn extend_line_batch(
        &mut self,
        batch: MarkId,
        point: Point,
        color: Rgba8,
        width: f64,
    ) -> ReelResult<()>;

    /// Drop the earliest point of the batch's first polyline; once only two points remain the
    /// whole batch is removed instead. Returns `true` when the batch was removed.
    fn shrink_or_remove_line_batch(&mut self, batch: MarkId) -> ReelResult<bool>;

    fn add_rect(&mut self, extent: Extent, color: Rgba8, z_order: i32) -> MarkId;

    fn rect_extent(&self, rect: MarkId) -> ReelResult<Extent>;

    fn set_rect_extent(&mut self, rect: MarkId, extent: Extent) -> ReelResult<()>;

    /// Horizontal guide line at altitude `y`.
    fn add_guide(&mut self, y: f64, color: Rgba8) -> MarkId;

    fn set_guide(&mut self, guide: MarkId, y: f64) -> ReelResult<()>;

    fn add_grid(&mut self, color: Rgba8) -> MarkId;

    fn set_visible(&mut self, mark: MarkId, visible: bool) -> ReelResult<()>;

    fn set_tick_label(&mut self, index: usize, text: &str) -> ReelResult<()>;

    fn set_tick_labels(&mut self, labels: &[String]) -> ReelResult<()>;

    fn set_title(&mut self, text: &str);

    fn set_y_range(&mut self, min: f64, max: f64) -> ReelResult<()>;

    /// Remove every line batch and collapse every rectangle to zero width at x = 0.
    fn clear_sheet(&mut self);

    /// Save the whole chart, clear it and blank the title and tick labels for playback.
    fn fresh_sheet(&mut self);

    /// Discard everything drawn since [`Canvas::fresh_sheet`] and put the saved chart back.
    fn restore_sheet(&mut self) -> ReelResult<()>;

    fn redraw(&mut self, mode: Redraw);

    /// Rasterize the current state into one frame.
    fn capture(&mut self) -> ReelResult<FrameRGBA>;
}
