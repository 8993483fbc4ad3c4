use std::sync::mpsc;

use skyreel::foundation::core::{Extent, Line, Point};
use skyreel::playback::filter::VisibilityFilter;
use skyreel::steps::layer::{LayerKind, LayerSet};
use skyreel::{
    Canvas, ChartCanvas, ChartSession, ChartStyle, FrameRGBA, LayerCommand, MarkId, PlaybackOpts,
    PlaybackOutcome, Query, RasterOpts, Redraw, ReelResult, Rgba8, StampLog,
};

#[derive(Clone, Debug, PartialEq)]
enum Call {
    AddLines { segments: Vec<Line>, colors: Vec<Rgba8> },
    Extend { point: Point, color: Rgba8 },
    Shrink,
    SetRect,
    Visibility,
    Other,
}

/// Canvas wrapper that logs every primitive before delegating.
struct Recording {
    inner: ChartCanvas,
    calls: Vec<Call>,
}

impl Canvas for Recording {
    fn add_line_batch(
        &mut self,
        segments: &[Line],
        colors: &[Rgba8],
        width: f64,
        z_order: i32,
    ) -> ReelResult<MarkId> {
        self.calls.push(Call::AddLines {
            segments: segments.to_vec(),
            colors: colors.to_vec(),
        });
        self.inner.add_line_batch(segments, colors, width, z_order)
    }

    fn extend_line_batch(
        &mut self,
        batch: MarkId,
        point: Point,
        color: Rgba8,
        width: f64,
    ) -> ReelResult<()> {
        self.calls.push(Call::Extend { point, color });
        self.inner.extend_line_batch(batch, point, color, width)
    }

    fn shrink_or_remove_line_batch(&mut self, batch: MarkId) -> ReelResult<bool> {
        self.calls.push(Call::Shrink);
        self.inner.shrink_or_remove_line_batch(batch)
    }

    fn add_rect(&mut self, extent: Extent, color: Rgba8, z_order: i32) -> MarkId {
        self.calls.push(Call::Other);
        self.inner.add_rect(extent, color, z_order)
    }

    fn rect_extent(&self, rect: MarkId) -> ReelResult<Extent> {
        self.inner.rect_extent(rect)
    }

    fn set_rect_extent(&mut self, rect: MarkId, extent: Extent) -> ReelResult<()> {
        self.calls.push(Call::SetRect);
        self.inner.set_rect_extent(rect, extent)
    }

    fn add_guide(&mut self, y: f64, color: Rgba8) -> MarkId {
        self.calls.push(Call::Other);
        self.inner.add_guide(y, color)
    }

    fn set_guide(&mut self, guide: MarkId, y: f64) -> ReelResult<()> {
        self.calls.push(Call::Other);
        self.inner.set_guide(guide, y)
    }

    fn add_grid(&mut self, color: Rgba8) -> MarkId {
        self.calls.push(Call::Other);
        self.inner.add_grid(color)
    }

    fn set_visible(&mut self, mark: MarkId, visible: bool) -> ReelResult<()> {
        self.calls.push(Call::Visibility);
        self.inner.set_visible(mark, visible)
    }

    fn set_tick_label(&mut self, index: usize, text: &str) -> ReelResult<()> {
        self.calls.push(Call::Other);
        self.inner.set_tick_label(index, text)
    }

    fn set_tick_labels(&mut self, labels: &[String]) -> ReelResult<()> {
        self.calls.push(Call::Other);
        self.inner.set_tick_labels(labels)
    }

    fn set_title(&mut self, text: &str) {
        self.calls.push(Call::Other);
        self.inner.set_title(text);
    }

    fn set_y_range(&mut self, min: f64, max: f64) -> ReelResult<()> {
        self.calls.push(Call::Other);
        self.inner.set_y_range(min, max)
    }

    fn clear_sheet(&mut self) {
        self.calls.push(Call::Other);
        self.inner.clear_sheet();
    }

    fn fresh_sheet(&mut self) {
        self.calls.push(Call::Other);
        self.inner.fresh_sheet();
    }

    fn restore_sheet(&mut self) -> ReelResult<()> {
        self.calls.push(Call::Other);
        self.inner.restore_sheet()
    }

    fn redraw(&mut self, mode: Redraw) {
        self.inner.redraw(mode);
    }

    fn capture(&mut self) -> ReelResult<FrameRGBA> {
        self.inner.capture()
    }
}

/// Mars is drawn in the single-target red; lunar segments are grey.
fn is_mars(color: &Rgba8) -> bool {
    (color.r, color.g, color.b) == (0xff, 0x40, 0x40)
}

fn is_lunar(color: &Rgba8) -> bool {
    color.r == color.g && color.g == color.b
}

fn line_color(call: &Call) -> Option<Rgba8> {
    match call {
        Call::AddLines { colors, .. } => colors.last().copied(),
        Call::Extend { color, .. } => Some(*color),
        _ => None,
    }
}

fn presented() -> ChartSession<Recording> {
    let query = Query::load(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/data/query_3day.json"
    ))
    .unwrap();
    let raster = RasterOpts {
        width: 192,
        height: 108,
        ..RasterOpts::default()
    };
    let canvas = Recording {
        inner: ChartCanvas::new(raster),
        calls: Vec::new(),
    };
    let style = ChartStyle {
        raster,
        ..ChartStyle::default()
    };
    let mut session = ChartSession::new(canvas, style).unwrap();
    session.present(&query).unwrap();
    session
}

fn animate(session: &mut ChartSession<Recording>, day_cap: i32) -> Vec<Call> {
    session.canvas_mut().calls.clear();
    let mut out = StampLog::new();
    session
        .animate(&PlaybackOpts::preview(day_cap), &mut out, None)
        .unwrap();
    std::mem::take(&mut session.canvas_mut().calls)
}

#[test]
fn hidden_layer_is_never_replayed() {
    let mut session = presented();
    let lunar = session.ids().lunar;
    session.apply(LayerCommand::Hide(lunar)).unwrap();

    let calls = animate(&mut session, 1);
    let lines: Vec<Rgba8> = calls.iter().filter_map(line_color).collect();
    assert!(!lines.is_empty());
    assert!(lines.iter().all(is_mars));
    assert!(!lines.iter().any(is_lunar));
    assert!(!session.layers().require(lunar).unwrap().is_visible());
}

#[test]
fn hidden_background_is_not_resized() {
    let mut session = presented();
    session.handle_key('b').unwrap();

    let calls = animate(&mut session, 3);
    // Saving and restoring the sheet moves rectangles internally; the replay never does.
    assert!(!calls.contains(&Call::SetRect));
}

#[test]
fn toggles_during_playback_do_not_change_the_replay() {
    let mut session = presented();
    let ids = session.ids();
    let (tx, rx) = mpsc::channel();
    tx.send(LayerCommand::Hide(ids.transits)).unwrap();
    tx.send(LayerCommand::Toggle(ids.lunar)).unwrap();

    session.canvas_mut().calls.clear();
    let mut out = StampLog::new();
    let outcome = session
        .animate(&PlaybackOpts::preview(3), &mut out, Some(&rx))
        .unwrap();
    let PlaybackOutcome::Completed(stats) = outcome else {
        panic!("cancelled");
    };
    assert_eq!(stats.commands_applied, 2);

    let calls = std::mem::take(&mut session.canvas_mut().calls);
    let adds: Vec<&Call> = calls
        .iter()
        .filter(|c| matches!(c, Call::AddLines { .. }))
        .collect();
    // One batch per arc per day, both arcs, despite the toggles.
    assert_eq!(adds.len(), 6);

    // Visibility comes back from the snapshot, not from the toggles.
    assert!(session.layers().require(ids.transits).unwrap().is_visible());
    assert!(session.layers().require(ids.lunar).unwrap().is_visible());
}

#[test]
fn replayed_segments_match_the_direct_render() {
    let mut session = presented();
    let direct: Vec<(Vec<Point>, Vec<Rgba8>)> = session
        .canvas()
        .inner
        .line_batches()
        .filter(|(_, b)| b.colors.iter().all(is_mars))
        .map(|(_, b)| {
            let mut points = vec![b.paths[0][0]];
            points.extend(b.paths.iter().map(|p| p[1]));
            (points, b.colors.clone())
        })
        .collect();
    assert_eq!(direct.len(), 3);

    let calls = animate(&mut session, 3);
    let mut replayed: Vec<(Vec<Point>, Vec<Rgba8>)> = Vec::new();
    for call in calls {
        match call {
            Call::AddLines { segments, colors } if colors.iter().all(is_mars) => {
                assert_eq!(segments.len(), 1);
                replayed.push((vec![segments[0].p0, segments[0].p1], colors));
            }
            Call::Extend { point, color } if is_mars(&color) => {
                let (points, colors) = replayed.last_mut().unwrap();
                points.push(point);
                colors.push(color);
            }
            _ => {}
        }
    }
    assert_eq!(replayed, direct);
}

#[test]
fn begin_then_end_restores_every_layer() {
    let mut canvas = ChartCanvas::new(RasterOpts::default());
    let mut layers = LayerSet::new();
    let bg = layers
        .add("Day Bands", LayerKind::Animated, Some('b'), true)
        .unwrap();
    let lunar = layers
        .add("Lunar Path", LayerKind::Animated, Some('l'), true)
        .unwrap();
    let main = layers
        .add("Transit Arc", LayerKind::Animated, Some('m'), true)
        .unwrap();
    let grid = layers
        .add("Grid", LayerKind::Static, Some('g'), false)
        .unwrap();
    layers.apply(LayerCommand::Hide(lunar), &mut canvas).unwrap();
    layers.apply(LayerCommand::Hide(grid), &mut canvas).unwrap();

    let before: Vec<bool> = layers.iter().map(|l| l.is_visible()).collect();
    let mut filter = VisibilityFilter::new(bg);
    filter.begin(&mut layers, &mut canvas).unwrap();
    assert!(layers.require(bg).unwrap().is_visible());
    assert!(!layers.require(main).unwrap().is_visible());
    assert!(filter.is_animated(main));
    assert!(!filter.is_animated(lunar));

    filter.end(&mut layers, &mut canvas).unwrap();
    let after: Vec<bool> = layers.iter().map(|l| l.is_visible()).collect();
    assert_eq!(before, after);

    filter.end(&mut layers, &mut canvas).unwrap();
    assert_eq!(canvas.redraws().deferred, 1);
}
