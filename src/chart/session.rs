use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::Receiver;

use chrono::{Days, NaiveDate};

use crate::canvas::scene::noon_tick_labels;
use crate::canvas::{Canvas, MarkId, Redraw};
use crate::chart::query::{DayData, Query};
use crate::chart::style::{ChartStyle, SINGLE_TARGET_SLOT};
use crate::foundation::core::{
    CHART_BANDS, Extent, HOURS_PER_DAY, Line, MAX_DAY_BANDS, Point, Rgba8,
};
use crate::foundation::error::{ReelError, ReelResult};
use crate::playback::PlaybackOpts;
use crate::playback::bands::BandShifter;
use crate::playback::engine::{Animator, PlaybackStats};
use crate::playback::filter::VisibilityFilter;
use crate::playback::frames::FrameOut;
use crate::playback::state::PlaybackState;
use crate::steps::layer::{LayerCommand, LayerEvent, LayerKind, LayerSet};
use crate::steps::recorder::{record_background, record_line, record_ticks, record_title};
use crate::steps::step::{LayerId, StepLog};

/// Label of the background layer; also its part of the title.
pub const DAY_BANDS_LABEL: &str = "Day Bands";

/// How a call to [`ChartSession::animate`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// No day cap was chosen; nothing was replayed.
    Cancelled,
    Completed(PlaybackStats),
}

/// Disables the animate control for as long as it lives.
struct TriggerGuard(Rc<Cell<bool>>);

impl TriggerGuard {
    fn disarm(trigger: &Rc<Cell<bool>>) -> Self {
        trigger.set(false);
        Self(Rc::clone(trigger))
    }
}

impl Drop for TriggerGuard {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

#[derive(Clone, Debug)]
struct Presentation {
    start: NaiveDate,
    total_days: u32,
    /// Target count of the first drawn day; arc indices depend on it.
    targets: Option<usize>,
}

/// Layer ids of a session, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartLayers {
    pub background: LayerId,
    pub lunar: LayerId,
    pub transits: LayerId,
    pub threshold: LayerId,
    pub grid: LayerId,
}

/// One chart: the layers that draw on it, the unified replay timeline and the playback control.
pub struct ChartSession<C: Canvas> {
    canvas: C,
    style: ChartStyle,
    layers: LayerSet,
    ids: ChartLayers,
    band_rects: Vec<MarkId>,
    threshold_guide: MarkId,
    timeline: StepLog,
    filter: VisibilityFilter,
    presentation: Option<Presentation>,
    day: u32,
    trigger: Rc<Cell<bool>>,
}

impl<C: Canvas> ChartSession<C> {
    pub fn new(mut canvas: C, style: ChartStyle) -> ReelResult<Self> {
        let mut layers = LayerSet::new();
        let ids = ChartLayers {
            background: layers.add(DAY_BANDS_LABEL, LayerKind::Animated, Some('b'), true)?,
            lunar: layers.add("Lunar Path", LayerKind::Animated, Some('l'), true)?,
            transits: layers.add("Transit Arc", LayerKind::Animated, Some('m'), true)?,
            threshold: layers.add("Threshold", LayerKind::Static, Some('t'), false)?,
            grid: layers.add("Grid", LayerKind::Static, Some('g'), false)?,
        };

        let (min, max) = style.altitude_range;
        canvas.set_y_range(min, max)?;

        let mut band_rects = Vec::with_capacity(MAX_DAY_BANDS);
        for decor in style.band_decor {
            let rect = canvas.add_rect(Extent::new(0.0, -90.0, 0.0, 180.0), decor, style.band_z);
            layers.require_mut(ids.background)?.add_to_veil(rect);
            band_rects.push(rect);
        }
        let threshold_guide = canvas.add_guide(style.threshold, style.threshold_color);
        layers
            .require_mut(ids.threshold)?
            .add_to_veil(threshold_guide);
        let grid = canvas.add_grid(style.grid_color());
        layers.require_mut(ids.grid)?.add_to_veil(grid);
        layers.draw_veils(&mut canvas)?;

        Ok(Self {
            canvas,
            style,
            layers,
            ids,
            band_rects,
            threshold_guide,
            timeline: StepLog::new(),
            filter: VisibilityFilter::new(ids.background),
            presentation: None,
            day: 0,
            trigger: Rc::new(Cell::new(true)),
        })
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    pub fn style(&self) -> &ChartStyle {
        &self.style
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    pub fn ids(&self) -> ChartLayers {
        self.ids
    }

    pub fn band_rects(&self) -> &[MarkId] {
        &self.band_rects
    }

    /// Unified replay log of every drawn day.
    pub fn timeline(&self) -> &StepLog {
        &self.timeline
    }

    pub fn filter(&self) -> &VisibilityFilter {
        &self.filter
    }

    /// Whether the animate control can currently be used.
    pub fn trigger_enabled(&self) -> bool {
        self.trigger.get()
    }

    /// Shared flag behind [`ChartSession::trigger_enabled`], for observers that outlive a borrow.
    pub fn trigger_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.trigger)
    }

    pub fn total_days(&self) -> u32 {
        self.presentation.as_ref().map_or(0, |p| p.total_days)
    }

    /// Start a new presentation: wipe every log and the chart, and name the transit layer.
    pub fn commence(&mut self, name: &str, start: NaiveDate, total_days: u32) -> ReelResult<()> {
        if self.filter.is_active() {
            return Err(ReelError::consistency(
                "cannot start a new presentation during playback",
            ));
        }
        self.layers.wipe_logs();
        for id in [self.ids.lunar, self.ids.transits] {
            self.layers.require_mut(id)?.clear_veil();
        }
        self.layers.require_mut(self.ids.transits)?.set_label(name);
        self.timeline.clear();
        self.canvas.clear_sheet();
        self.presentation = Some(Presentation {
            start,
            total_days,
            targets: None,
        });
        self.day = 0;
        tracing::debug!(query = name, %start, total_days, "presentation commenced");
        Ok(())
    }

    /// Draw one whole day directly and record the steps that replay it.
    #[tracing::instrument(level = "debug", skip(self, data), fields(bands = data.bands.len(), targets = data.targets.len()))]
    pub fn draw_day(&mut self, day: u32, data: &DayData) -> ReelResult<()> {
        let total = self.total_days();
        let Some(presentation) = self.presentation.as_mut().filter(|_| day < total) else {
            return Err(ReelError::consistency(format!(
                "day {day} outside the commenced presentation of {total} days"
            )));
        };
        data.validate(day as usize)?;
        let count = data.targets.len();
        let expected = *presentation.targets.get_or_insert(count);
        if count != expected {
            return Err(ReelError::validation(format!(
                "day {day}: expected {expected} targets like the first day, got {count}"
            )));
        }

        self.draw_day_bands(day, data)?;
        self.draw_arcs(day, data)?;

        for id in [self.ids.background, self.ids.lunar, self.ids.transits] {
            let layer = self.layers.require(id)?;
            self.timeline.collate_day(day, layer.log())?;
        }

        self.day = day;
        let title = self.render_title();
        record_title(&mut self.timeline, day, title)?;

        let labels = data.tick_labels.clone().unwrap_or_else(noon_tick_labels);
        self.canvas.set_tick_labels(&labels)?;
        for (hour, label) in labels.iter().enumerate() {
            record_ticks(&mut self.timeline, day, hour, label.as_str())?;
        }
        Ok(())
    }

    fn draw_day_bands(&mut self, day: u32, data: &DayData) -> ReelResult<()> {
        let layer = self.layers.require_mut(self.ids.background)?;
        for (band, rect) in self.band_rects.iter().enumerate() {
            // Unused rectangles wait at the right edge with no width.
            let extent = match data.bands.get(band) {
                Some(b) => Extent::band(b.start, b.end),
                None => Extent::band(HOURS_PER_DAY, HOURS_PER_DAY),
            };
            self.canvas.set_rect_extent(*rect, extent)?;
            record_background(layer, day, band, extent, self.style.band_z)?;
        }
        Ok(())
    }

    fn draw_arcs(&mut self, day: u32, data: &DayData) -> ReelResult<()> {
        let illumination = &data.lunar.illumination;

        let lunar_colors: Vec<_> = illumination[..CHART_BANDS - 1]
            .iter()
            .map(|i| self.style.lunar_color(*i))
            .collect();
        self.draw_arc(self.ids.lunar, 0, day, &data.lunar.altitudes, &lunar_colors)?;

        let count = data.targets.len();
        for (i, target) in data.targets.iter().enumerate() {
            let slot = self.style.target_slot(i, count);
            let arc = if count == 1 { SINGLE_TARGET_SLOT } else { i };
            let colors: Vec<_> = illumination[..CHART_BANDS - 1]
                .iter()
                .map(|illum| self.style.target_color(slot, *illum))
                .collect();
            self.draw_arc(self.ids.transits, arc as u32, day, &target.altitudes, &colors)?;
        }
        Ok(())
    }

    fn draw_arc(
        &mut self,
        layer: LayerId,
        arc: u32,
        day: u32,
        altitudes: &[f64],
        colors: &[Rgba8],
    ) -> ReelResult<()> {
        let segments: Vec<Line> = altitudes
            .windows(2)
            .enumerate()
            .map(|(h, alt)| {
                let h = h as f64;
                Line::new(Point::new(h, alt[0]), Point::new(h + 1.0, alt[1]))
            })
            .collect();
        let width = self.style.line_width;
        let z = self.style.arc_z;
        let batch = self.canvas.add_line_batch(&segments, colors, width, z)?;

        let layer = self.layers.require_mut(layer)?;
        layer.add_to_veil(batch);
        for (segment, color) in segments.iter().zip(colors) {
            record_line(layer, arc, day, *segment, *color, width, z)?;
        }
        Ok(())
    }

    /// Apply every layer's visibility to the full view and show it.
    pub fn complete(&mut self) -> ReelResult<()> {
        self.layers.draw_veils(&mut self.canvas)?;
        self.canvas.redraw(Redraw::Immediate);
        tracing::info!(
            days = self.total_days(),
            steps = self.timeline.len(),
            "presentation complete"
        );
        Ok(())
    }

    /// Draw a whole query: commence, every day, complete.
    pub fn present(&mut self, query: &Query) -> ReelResult<()> {
        query.validate()?;
        self.commence(&query.name, query.start, query.total_days())?;
        for (day, data) in (0..).zip(&query.days) {
            self.draw_day(day, data)?;
        }
        self.complete()
    }

    /// Change one layer's visibility. The title follows title-affecting layers, except during
    /// playback, where it is replayed instead.
    pub fn apply(&mut self, cmd: LayerCommand) -> ReelResult<LayerEvent> {
        let event = self.layers.apply(cmd, &mut self.canvas)?;
        if event.affects_title && !self.filter.is_active() {
            self.render_title();
        }
        Ok(event)
    }

    /// Keyboard shortcut; unbound keys are ignored.
    pub fn handle_key(&mut self, key: char) -> ReelResult<Option<LayerEvent>> {
        match self.layers.command_for_key(key) {
            Some(cmd) => self.apply(cmd).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_threshold(&mut self, value: f64) -> ReelResult<()> {
        if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
            return Err(ReelError::validation(format!(
                "threshold {value} outside -90..=90"
            )));
        }
        self.canvas.set_guide(self.threshold_guide, value)?;
        self.canvas.redraw(Redraw::Immediate);
        Ok(())
    }

    /// Set the visible altitude range; a minimum at or above the maximum is pulled one degree
    /// below it. Returns the range applied.
    pub fn set_altitude_range(&mut self, min: f64, max: f64) -> ReelResult<(f64, f64)> {
        let min = if min >= max { max - 1.0 } else { min };
        self.canvas.set_y_range(min, max)?;
        self.canvas.redraw(Redraw::Immediate);
        Ok((min, max))
    }

    /// Build the title from what is visible and the days drawn so far, and show it.
    pub fn render_title(&mut self) -> String {
        let mut parts: Vec<&str> = [self.ids.lunar, self.ids.transits]
            .into_iter()
            .filter_map(|id| self.layers.get(id))
            .filter(|l| l.is_visible())
            .map(|l| l.label())
            .collect();
        if self
            .layers
            .get(self.ids.background)
            .is_some_and(|l| l.is_visible())
        {
            parts.push(DAY_BANDS_LABEL);
        }

        let mut title = match parts.as_slice() {
            [] => String::new(),
            [one] => (*one).to_owned(),
            [rest @ .., last] => format!("{} and {last}", rest.join(", ")),
        };
        if !title.is_empty() {
            title.push(' ');
        }
        if let Some(p) = &self.presentation {
            let end = p
                .start
                .checked_add_days(Days::new(u64::from(self.day)))
                .unwrap_or(p.start);
            let start_str = p.start.format("%d/%m/%Y").to_string();
            if end == p.start {
                title.push_str(&start_str);
            } else {
                title.push_str(&format!("[{start_str}:{}]", end.format("%d/%m/%Y")));
            }
        }

        self.canvas.set_title(&title);
        title
    }

    /// Replay the recorded presentation into `frames`.
    ///
    /// The animate control is disabled for the call. Frame output, chart and layer visibility
    /// are restored on every exit path once the run has started; the first error wins.
    pub fn animate(
        &mut self,
        opts: &PlaybackOpts,
        frames: &mut dyn FrameOut,
        commands: Option<&Receiver<LayerCommand>>,
    ) -> ReelResult<PlaybackOutcome> {
        let _trigger = TriggerGuard::disarm(&self.trigger);
        let Some(day_cap) = opts.day_cap else {
            tracing::info!("playback dismissed");
            return Ok(PlaybackOutcome::Cancelled);
        };
        let state = PlaybackState::new(day_cap, self.total_days())?;

        self.filter.begin(&mut self.layers, &mut self.canvas)?;
        self.canvas.fresh_sheet();

        let run = self.replay(frames, state, commands);

        let closed = frames.close(&mut self.canvas);
        let restored = self.canvas.restore_sheet();
        let ended = self.filter.end(&mut self.layers, &mut self.canvas);
        self.render_title();

        match run {
            Ok(stats) => {
                closed?;
                restored?;
                ended?;
                tracing::info!(
                    frames = stats.frames,
                    expiries = stats.expiries,
                    unwind_days = stats.unwind_days,
                    "playback finished"
                );
                Ok(PlaybackOutcome::Completed(stats))
            }
            Err(err) => {
                for cleanup in [closed, restored, ended] {
                    if let Err(e) = cleanup {
                        tracing::warn!(error = %e, "cleanup after failed playback also failed");
                    }
                }
                Err(err)
            }
        }
    }

    fn replay(
        &mut self,
        frames: &mut dyn FrameOut,
        state: PlaybackState,
        commands: Option<&Receiver<LayerCommand>>,
    ) -> ReelResult<PlaybackStats> {
        frames.open(&mut self.canvas)?;

        let layers = &mut self.layers;
        let mut animator = Animator::new(
            &self.timeline,
            &self.filter,
            BandShifter::new(self.band_rects.clone()),
        );
        animator.run(&mut self.canvas, frames, state, |canvas| {
            let Some(rx) = commands else {
                return Ok(0);
            };
            let mut applied = 0;
            while let Ok(cmd) = rx.try_recv() {
                layers.apply(cmd, canvas)?;
                applied += 1;
            }
            Ok(applied)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::scene::{ChartCanvas, WAITING_TITLE};
    use crate::chart::query::{ArcTrace, DayBandKind, LunarTrace, TwilightBand};
    use crate::playback::frames::StampLog;
    use crate::render::cpu::RasterOpts;

    fn day_data(targets: usize) -> DayData {
        DayData {
            tick_labels: None,
            lunar: LunarTrace {
                altitudes: (0..CHART_BANDS).map(|h| h as f64 * 2.0 - 20.0).collect(),
                illumination: vec![0.25; CHART_BANDS],
            },
            targets: (0..targets)
                .map(|i| ArcTrace {
                    name: format!("T{i}"),
                    altitudes: vec![10.0 + i as f64; CHART_BANDS],
                })
                .collect(),
            bands: vec![
                TwilightBand {
                    start: 0.0,
                    end: 5.5,
                    kind: DayBandKind::Day,
                },
                TwilightBand {
                    start: 5.5,
                    end: 18.0,
                    kind: DayBandKind::Night,
                },
                TwilightBand {
                    start: 18.0,
                    end: 24.0,
                    kind: DayBandKind::Day,
                },
            ],
        }
    }

    fn session() -> ChartSession<ChartCanvas> {
        ChartSession::new(
            ChartCanvas::new(RasterOpts::default()),
            ChartStyle::default(),
        )
        .unwrap()
    }

    fn presented(days: u32, targets: usize) -> ChartSession<ChartCanvas> {
        let mut s = session();
        s.commence("Mars", NaiveDate::from_ymd_opt(2025, 1, 30).unwrap(), days)
            .unwrap();
        for d in 0..days {
            s.draw_day(d, &day_data(targets)).unwrap();
        }
        s.complete().unwrap();
        s
    }

    #[test]
    fn title_lists_visible_layers_and_dates() {
        let mut s = presented(3, 1);
        assert_eq!(
            s.canvas().title(),
            "Lunar Path, Mars and Day Bands [30/01/2025:01/02/2025]"
        );
        s.handle_key('l').unwrap();
        assert_eq!(
            s.canvas().title(),
            "Mars and Day Bands [30/01/2025:01/02/2025]"
        );
        s.handle_key('b').unwrap();
        s.handle_key('m').unwrap();
        assert_eq!(s.canvas().title(), "[30/01/2025:01/02/2025]");
        assert!(s.handle_key('z').unwrap().is_none());
    }

    #[test]
    fn single_day_title_has_one_date() {
        let s = presented(1, 2);
        assert_eq!(
            s.canvas().title(),
            "Lunar Path, Mars and Day Bands 30/01/2025"
        );
    }

    #[test]
    fn draw_day_collates_in_layer_order() {
        let s = presented(1, 2);
        let band0: Vec<&str> = s
            .timeline()
            .steps(0, 0)
            .iter()
            .map(|st| st.kind.name())
            .collect();
        // Only the first band touches hour 0; then lunar, two targets, title, ticks.
        assert_eq!(
            band0,
            vec!["dayband", "line", "line", "line", "title", "ticks"]
        );
        let ticks = s.timeline().steps(0, 24);
        assert_eq!(ticks.last().map(|st| st.kind.name()), Some("ticks"));
    }

    #[test]
    fn single_target_uses_the_pinned_arc_index() {
        let s = presented(1, 1);
        let transits = s.layers().require(s.ids().transits).unwrap();
        assert!(transits.log().iter().all(|st| st.arc == 4));
        let lunar = s.layers().require(s.ids().lunar).unwrap();
        assert!(lunar.log().iter().all(|st| st.arc == 0));
        assert_eq!(lunar.log().len(), 24);
    }

    #[test]
    fn unused_band_rects_are_parked() {
        let s = presented(1, 0);
        let parked = s.canvas().rect_extent(s.band_rects()[5]).unwrap();
        assert_eq!((parked.x(), parked.width()), (24.0, 0.0));
        let night = s.canvas().rect_extent(s.band_rects()[1]).unwrap();
        assert_eq!((night.x(), night.width()), (5.5, 12.5));
    }

    #[test]
    fn draw_day_outside_presentation_is_rejected() {
        let mut s = presented(2, 1);
        assert!(matches!(
            s.draw_day(2, &day_data(1)),
            Err(ReelError::Consistency(_))
        ));
    }

    #[test]
    fn changing_target_count_is_rejected() {
        let mut s = session();
        s.commence("Mars", NaiveDate::from_ymd_opt(2025, 1, 30).unwrap(), 3)
            .unwrap();
        s.draw_day(0, &day_data(1)).unwrap();
        let batches = s.canvas().line_batches().count();
        assert!(matches!(
            s.draw_day(1, &day_data(2)),
            Err(ReelError::Validation(_))
        ));
        // Nothing of the rejected day reaches the chart or the timeline.
        assert_eq!(s.canvas().line_batches().count(), batches);
        assert!(s.timeline().steps(1, 0).is_empty());
        s.draw_day(1, &day_data(1)).unwrap();
    }

    #[test]
    fn windowed_run_of_a_drawn_presentation_ends_empty() {
        let s = presented(3, 2);
        let timeline = s.timeline().clone();
        let rects = s.band_rects().to_vec();
        let mut canvas = s.into_canvas();
        canvas.fresh_sheet();

        let filter = VisibilityFilter::new(LayerId(0));
        let mut animator = Animator::new(&timeline, &filter, BandShifter::new(rects));
        let mut out = StampLog::new();
        animator
            .run(
                &mut canvas,
                &mut out,
                PlaybackState::new(1, 3).unwrap(),
                |_| Ok(0),
            )
            .unwrap();
        assert_eq!(canvas.line_batches().count(), 0);
    }

    #[test]
    fn altitude_range_pulls_min_below_max() {
        let mut s = session();
        assert_eq!(s.set_altitude_range(40.0, 20.0).unwrap(), (19.0, 20.0));
        assert_eq!(s.canvas().y_range(), (19.0, 20.0));
        assert!(s.set_threshold(120.0).is_err());
        s.set_threshold(15.0).unwrap();
    }

    #[test]
    fn dismissed_playback_reenables_the_trigger() {
        let mut s = presented(2, 1);
        let opts = PlaybackOpts {
            day_cap: None,
            ..PlaybackOpts::preview(1)
        };
        let mut out = StampLog::new();
        assert_eq!(
            s.animate(&opts, &mut out, None).unwrap(),
            PlaybackOutcome::Cancelled
        );
        assert!(s.trigger_enabled());
        assert_eq!(out.opened(), 0);
    }

    #[test]
    fn playback_restores_the_full_view() {
        let mut s = presented(2, 1);
        s.handle_key('l').unwrap();
        let before_title = s.canvas().title().to_owned();
        let before_batches = s.canvas().line_batches().count();

        let mut opts = PlaybackOpts::preview(2);
        opts.output = crate::playback::OutputMode::DryRun;
        let mut out = StampLog::new();
        let outcome = s.animate(&opts, &mut out, None).unwrap();
        assert!(matches!(outcome, PlaybackOutcome::Completed(st) if st.frames == 50));
        assert_eq!((out.opened(), out.closed()), (1, 1));

        assert_eq!(s.canvas().title(), before_title);
        assert_ne!(s.canvas().title(), WAITING_TITLE);
        assert_eq!(s.canvas().line_batches().count(), before_batches);
        assert!(!s.layers().require(s.ids().lunar).unwrap().is_visible());
        assert!(s.layers().require(s.ids().transits).unwrap().is_visible());
        assert!(!s.filter().is_active());
        assert!(s.trigger_enabled());
    }

    #[test]
    fn bad_day_cap_is_a_config_error_and_leaves_no_state() {
        let mut s = presented(2, 1);
        let mut out = StampLog::new();
        let err = s
            .animate(&PlaybackOpts::preview(3), &mut out, None)
            .unwrap_err();
        assert!(matches!(err, ReelError::Config(_)));
        assert!(!s.filter().is_active());
        assert!(!s.canvas().has_saved_sheet());
        assert!(s.trigger_enabled());
    }
}
