use std::collections::BTreeMap;

use crate::canvas::{Canvas, MarkId, Redraw};
use crate::foundation::core::{CHART_BANDS, Extent, Line, Point, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};
use crate::render::FrameRGBA;
use crate::render::cpu::{ChartRasterizer, RasterOpts};

const GRID_Z: i32 = 1;
const GUIDE_Z: i32 = 3;

pub const WAITING_TITLE: &str = "Waiting...";
pub const BLANK_TICK: &str = "--:00";

/// A collection of polylines drawn as one unit.
///
/// Directly rendered arcs hold one two-point polyline per hour; batches grown during playback
/// hold a single polyline extended point by point.
#[derive(Clone, Debug, PartialEq)]
pub struct LineBatch {
    pub paths: Vec<Vec<Point>>,
    pub colors: Vec<Rgba8>,
    pub widths: Vec<f64>,
    pub z_order: i32,
    pub visible: bool,
}

impl LineBatch {
    pub fn point_count(&self) -> usize {
        self.paths.iter().map(Vec::len).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RectMark {
    pub extent: Extent,
    pub color: Rgba8,
    pub z_order: i32,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GuideMark {
    pub y: f64,
    pub color: Rgba8,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridMark {
    pub color: Rgba8,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Mark {
    Lines(LineBatch),
    Rect(RectMark),
    Guide(GuideMark),
    Grid(GridMark),
}

impl Mark {
    pub fn z_order(&self) -> i32 {
        match self {
            Mark::Lines(b) => b.z_order,
            Mark::Rect(r) => r.z_order,
            Mark::Guide(_) => GUIDE_Z,
            Mark::Grid(_) => GRID_Z,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            Mark::Lines(b) => b.visible,
            Mark::Rect(r) => r.visible,
            Mark::Guide(g) => g.visible,
            Mark::Grid(g) => g.visible,
        }
    }

    fn set_visible(&mut self, visible: bool) {
        match self {
            Mark::Lines(b) => b.visible = visible,
            Mark::Rect(r) => r.visible = visible,
            Mark::Guide(g) => g.visible = visible,
            Mark::Grid(g) => g.visible = visible,
        }
    }
}

#[derive(Clone, Debug)]
struct SavedSheet {
    batches: Vec<(u32, LineBatch)>,
    rects: Vec<(u32, Extent)>,
    title: String,
    ticks: Vec<String>,
}

/// Redraw requests seen so far, by urgency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RedrawCounts {
    pub immediate: u64,
    pub deferred: u64,
}

/// Default hour labels: the 25 hour ticks starting at local noon.
pub fn noon_tick_labels() -> Vec<String> {
    (0..CHART_BANDS)
        .map(|h| format!("{:02}:00", (h + 12) % 24))
        .collect()
}

/// Retained chart scene in data units (x: hours after noon, y: altitude in degrees).
pub struct ChartCanvas {
    marks: BTreeMap<u32, Mark>,
    next_id: u32,
    title: String,
    ticks: Vec<String>,
    y_range: (f64, f64),
    saved: Option<SavedSheet>,
    redraws: RedrawCounts,
    raster: RasterOpts,
    rasterizer: Option<ChartRasterizer>,
}

impl ChartCanvas {
    pub fn new(raster: RasterOpts) -> Self {
        Self {
            marks: BTreeMap::new(),
            next_id: 0,
            title: String::new(),
            ticks: noon_tick_labels(),
            y_range: (-30.0, 90.0),
            saved: None,
            redraws: RedrawCounts::default(),
            raster,
            rasterizer: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn tick_labels(&self) -> &[String] {
        &self.ticks
    }

    pub fn y_range(&self) -> (f64, f64) {
        self.y_range
    }

    pub fn raster_opts(&self) -> RasterOpts {
        self.raster
    }

    pub fn redraws(&self) -> RedrawCounts {
        self.redraws
    }

    /// `true` between `fresh_sheet` and `restore_sheet`.
    pub fn has_saved_sheet(&self) -> bool {
        self.saved.is_some()
    }

    pub fn mark(&self, id: MarkId) -> Option<&Mark> {
        self.marks.get(&id.0)
    }

    pub fn line_batch(&self, id: MarkId) -> Option<&LineBatch> {
        match self.marks.get(&id.0) {
            Some(Mark::Lines(b)) => Some(b),
            _ => None,
        }
    }

    pub fn line_batches(&self) -> impl Iterator<Item = (MarkId, &LineBatch)> + '_ {
        self.marks.iter().filter_map(|(id, m)| match m {
            Mark::Lines(b) => Some((MarkId(*id), b)),
            _ => None,
        })
    }

    /// Marks ordered for painting: ascending z-order, ties in creation order.
    pub fn marks_in_paint_order(&self) -> Vec<(MarkId, &Mark)> {
        let mut out: Vec<_> = self.marks.iter().map(|(id, m)| (MarkId(*id), m)).collect();
        out.sort_by_key(|(id, m)| (m.z_order(), *id));
        out
    }

    fn insert(&mut self, mark: Mark) -> MarkId {
        let id = self.next_id;
        self.next_id += 1;
        self.marks.insert(id, mark);
        MarkId(id)
    }

    fn lines_mut(&mut self, id: MarkId) -> ReelResult<&mut LineBatch> {
        match self.marks.get_mut(&id.0) {
            Some(Mark::Lines(b)) => Ok(b),
            Some(_) => Err(ReelError::geometry(format!("mark {} is not a line batch", id.0))),
            None => Err(ReelError::geometry(format!("line batch {} does not exist", id.0))),
        }
    }

    fn rect_mut(&mut self, id: MarkId) -> ReelResult<&mut RectMark> {
        match self.marks.get_mut(&id.0) {
            Some(Mark::Rect(r)) => Ok(r),
            Some(_) => Err(ReelError::geometry(format!("mark {} is not a rectangle", id.0))),
            None => Err(ReelError::geometry(format!("rectangle {} does not exist", id.0))),
        }
    }

    fn take_line_batches(&mut self) -> Vec<(u32, LineBatch)> {
        let ids: Vec<u32> = self
            .marks
            .iter()
            .filter(|(_, m)| matches!(m, Mark::Lines(_)))
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter()
            .filter_map(|id| match self.marks.remove(&id) {
                Some(Mark::Lines(b)) => Some((id, b)),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for ChartCanvas {
    fn add_line_batch(
        &mut self,
        segments: &[Line],
        colors: &[Rgba8],
        width: f64,
        z_order: i32,
    ) -> ReelResult<MarkId> {
        if segments.is_empty() {
            return Err(ReelError::geometry("line batch needs at least one segment"));
        }
        let Some(last) = colors.last().copied() else {
            return Err(ReelError::geometry("line batch needs at least one colour"));
        };
        let batch = LineBatch {
            paths: segments.iter().map(|s| vec![s.p0, s.p1]).collect(),
            colors: (0..segments.len())
                .map(|i| colors.get(i).copied().unwrap_or(last))
                .collect(),
            widths: vec![width; segments.len()],
            z_order,
            visible: true,
        };
        Ok(self.insert(Mark::Lines(batch)))
    }

    fn extend_line_batch(
        &mut self,
        batch: MarkId,
        point: Point,
        color: Rgba8,
        width: f64,
    ) -> ReelResult<()> {
        let b = self.lines_mut(batch)?;
        let (Some(path), Some(c), Some(w)) =
            (b.paths.last_mut(), b.colors.last_mut(), b.widths.last_mut())
        else {
            return Err(ReelError::geometry("cannot extend an empty line batch"));
        };
        path.push(point);
        *c = color;
        *w = width;
        Ok(())
    }

    fn shrink_or_remove_line_batch(&mut self, batch: MarkId) -> ReelResult<bool> {
        let b = self.lines_mut(batch)?;
        let Some(first) = b.paths.first_mut() else {
            return Err(ReelError::geometry("cannot shrink an empty line batch"));
        };
        match first.len() {
            0 | 1 => Err(ReelError::geometry(format!(
                "line batch {} holds a degenerate polyline",
                batch.0
            ))),
            2 => {
                self.marks.remove(&batch.0);
                Ok(true)
            }
            _ => {
                first.remove(0);
                Ok(false)
            }
        }
    }

    fn add_rect(&mut self, extent: Extent, color: Rgba8, z_order: i32) -> MarkId {
        self.insert(Mark::Rect(RectMark {
            extent,
            color,
            z_order,
            visible: true,
        }))
    }

    fn rect_extent(&self, rect: MarkId) -> ReelResult<Extent> {
        match self.marks.get(&rect.0) {
            Some(Mark::Rect(r)) => Ok(r.extent),
            _ => Err(ReelError::geometry(format!("rectangle {} does not exist", rect.0))),
        }
    }

    fn set_rect_extent(&mut self, rect: MarkId, extent: Extent) -> ReelResult<()> {
        self.rect_mut(rect)?.extent = extent;
        Ok(())
    }

    fn add_guide(&mut self, y: f64, color: Rgba8) -> MarkId {
        self.insert(Mark::Guide(GuideMark {
            y,
            color,
            visible: true,
        }))
    }

    fn set_guide(&mut self, guide: MarkId, y: f64) -> ReelResult<()> {
        match self.marks.get_mut(&guide.0) {
            Some(Mark::Guide(g)) => {
                g.y = y;
                Ok(())
            }
            _ => Err(ReelError::geometry(format!("guide {} does not exist", guide.0))),
        }
    }

    fn add_grid(&mut self, color: Rgba8) -> MarkId {
        self.insert(Mark::Grid(GridMark {
            color,
            visible: true,
        }))
    }

    fn set_visible(&mut self, mark: MarkId, visible: bool) -> ReelResult<()> {
        // Batches stashed by `fresh_sheet` keep their flag so `restore_sheet` brings it back.
        if let Some(saved) = self.saved.as_mut()
            && let Some((_, b)) = saved.batches.iter_mut().find(|(id, _)| *id == mark.0)
        {
            b.visible = visible;
            return Ok(());
        }
        self.marks
            .get_mut(&mark.0)
            .ok_or_else(|| ReelError::geometry(format!("mark {} does not exist", mark.0)))?
            .set_visible(visible);
        Ok(())
    }

    fn set_tick_label(&mut self, index: usize, text: &str) -> ReelResult<()> {
        let slot = self.ticks.get_mut(index).ok_or_else(|| {
            ReelError::geometry(format!("tick index {index} outside 0..{CHART_BANDS}"))
        })?;
        if slot != text {
            *slot = text.to_owned();
        }
        Ok(())
    }

    fn set_tick_labels(&mut self, labels: &[String]) -> ReelResult<()> {
        if labels.len() != CHART_BANDS {
            return Err(ReelError::geometry(format!(
                "expected {CHART_BANDS} tick labels, got {}",
                labels.len()
            )));
        }
        self.ticks = labels.to_vec();
        Ok(())
    }

    fn set_title(&mut self, text: &str) {
        self.title = text.to_owned();
    }

    fn set_y_range(&mut self, min: f64, max: f64) -> ReelResult<()> {
        if !(min.is_finite() && max.is_finite()) || min >= max {
            return Err(ReelError::geometry(format!(
                "invalid altitude range {min}..{max}"
            )));
        }
        self.y_range = (min, max);
        Ok(())
    }

    fn clear_sheet(&mut self) {
        drop(self.take_line_batches());
        for mark in self.marks.values_mut() {
            if let Mark::Rect(r) = mark {
                r.extent = Extent::new(0.0, r.extent.origin.y, 0.0, r.extent.size.height);
            }
        }
    }

    fn fresh_sheet(&mut self) {
        if self.saved.is_some() {
            return;
        }
        let batches = self.take_line_batches();
        let rects: Vec<(u32, Extent)> = self
            .marks
            .iter()
            .filter_map(|(id, m)| match m {
                Mark::Rect(r) => Some((*id, r.extent)),
                _ => None,
            })
            .collect();
        self.clear_sheet();
        let title = std::mem::replace(&mut self.title, WAITING_TITLE.to_owned());
        let ticks = std::mem::replace(&mut self.ticks, vec![BLANK_TICK.to_owned(); CHART_BANDS]);
        self.saved = Some(SavedSheet {
            batches,
            rects,
            title,
            ticks,
        });
    }

    fn restore_sheet(&mut self) -> ReelResult<()> {
        let saved = self
            .saved
            .take()
            .ok_or_else(|| ReelError::consistency("restore_sheet without a saved sheet"))?;
        self.clear_sheet();
        for (id, batch) in saved.batches {
            self.marks.insert(id, Mark::Lines(batch));
        }
        for (id, extent) in saved.rects {
            if let Some(Mark::Rect(r)) = self.marks.get_mut(&id) {
                r.extent = extent;
            }
        }
        self.title = saved.title;
        self.ticks = saved.ticks;
        Ok(())
    }

    fn redraw(&mut self, mode: Redraw) {
        match mode {
            Redraw::Immediate => self.redraws.immediate += 1,
            Redraw::Deferred => self.redraws.deferred += 1,
        }
    }

    fn capture(&mut self) -> ReelResult<FrameRGBA> {
        let mut rasterizer = self
            .rasterizer
            .take()
            .unwrap_or_else(|| ChartRasterizer::new(self.raster));
        let frame = rasterizer.render(self);
        self.rasterizer = Some(rasterizer);
        frame
    }
}
