use crate::canvas::Canvas;
use crate::canvas::scene::BLANK_TICK;
use crate::foundation::core::CHART_BANDS;
use crate::foundation::error::ReelResult;
use crate::playback::bands::BandShifter;
use crate::playback::filter::VisibilityFilter;
use crate::playback::frames::FrameOut;
use crate::playback::limiter::ArcLimiter;
use crate::playback::state::PlaybackState;
use crate::steps::step::{StepKind, StepLog};

/// Where the cursor was when a frame was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameStamp {
    pub day: u32,
    pub hour: usize,
    pub day_cap: i32,
    pub end_of_days: bool,
    pub final_day: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub frames: u64,
    pub expiries: u64,
    /// Iterations of the last day replayed while winding down.
    pub unwind_days: u32,
    pub commands_applied: u32,
}

/// Replays a unified step log hour by hour, emitting one frame per hour.
pub struct Animator<'a> {
    timeline: &'a StepLog,
    filter: &'a VisibilityFilter,
    bands: BandShifter,
    limiter: ArcLimiter,
}

impl<'a> Animator<'a> {
    pub fn new(timeline: &'a StepLog, filter: &'a VisibilityFilter, bands: BandShifter) -> Self {
        Self {
            timeline,
            filter,
            bands,
            limiter: ArcLimiter::new(),
        }
    }

    pub fn limiter(&self) -> &ArcLimiter {
        &self.limiter
    }

    /// Run to completion. `between_frames` is called after every frame and returns how many
    /// external commands it applied.
    #[tracing::instrument(level = "debug", skip_all, fields(day_cap = state.day_cap(), days = state.total_days()))]
    pub fn run(
        &mut self,
        canvas: &mut dyn Canvas,
        frames: &mut dyn FrameOut,
        mut state: PlaybackState,
        mut between_frames: impl FnMut(&mut dyn Canvas) -> ReelResult<u32>,
    ) -> ReelResult<PlaybackStats> {
        let mut stats = PlaybackStats::default();

        while state.more_days() {
            tracing::debug!(
                day = state.day(),
                day_cap = state.day_cap(),
                phase = ?state.phase(),
                "replaying day"
            );
            for hour in 0..CHART_BANDS {
                self.replay_hour(canvas, &state, hour)?;

                let final_day = state.final_day();
                if final_day {
                    self.bands.decay(canvas, hour)?;
                    canvas.set_tick_label(hour, BLANK_TICK)?;
                }

                let stamp = FrameStamp {
                    day: state.day(),
                    hour,
                    day_cap: state.day_cap(),
                    end_of_days: state.end_of_days(),
                    final_day,
                };
                frames.capture(canvas, &stamp)?;
                stats.frames += 1;
                stats.commands_applied += between_frames(canvas)?;
            }
            if state.end_of_days() {
                stats.unwind_days += 1;
            }
            state.step_day();
        }

        stats.expiries = self.limiter.expiries();
        Ok(stats)
    }

    fn replay_hour(
        &mut self,
        canvas: &mut dyn Canvas,
        state: &PlaybackState,
        hour: usize,
    ) -> ReelResult<()> {
        for step in self.timeline.steps(state.day(), hour) {
            if !self.filter.is_animated(step.layer) {
                continue;
            }
            if state.too_many_days() && step.is_line() {
                self.limiter.expire(canvas, step.layer, step.arc)?;
            }
            if state.end_of_days() {
                continue;
            }
            match &step.kind {
                StepKind::Title { text } => canvas.set_title(text),
                StepKind::Ticks { label, index } => canvas.set_tick_label(*index, label)?,
                StepKind::Line {
                    segment,
                    color,
                    width,
                } => self.limiter.extend(
                    canvas,
                    step.layer,
                    step.arc,
                    hour,
                    *segment,
                    *color,
                    *width,
                    step.z_order,
                )?,
                StepKind::DayBand { band, extent } => self.bands.grow(canvas, *band, *extent)?,
                StepKind::BandShift { band, extent } => {
                    self.bands.shift(canvas, *band, *extent)?
                }
            }
        }
        Ok(())
    }
}
