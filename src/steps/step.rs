use std::collections::BTreeMap;

use crate::foundation::core::{CHART_BANDS, Extent, Line, Rgba8};
use crate::foundation::error::{ReelError, ReelResult};

/// Identifier of a layer registered in a [`crate::steps::layer::LayerSet`].
///
/// Steps refer to their owner by id only; the layer set is the single owner of layer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u16);

impl LayerId {
    /// Owner of title and tick-label steps. Never registered, so playback always animates it.
    pub const CHROME: LayerId = LayerId(u16::MAX);
}

/// The drawing delta a [`Step`] replays.
#[derive(Clone, Debug, PartialEq)]
pub enum StepKind {
    /// One hourly segment of an arc, with its resolved colour.
    Line {
        segment: Line,
        color: Rgba8,
        width: f64,
    },
    /// Day 0 only: partial extent that grows background band `band` into existence.
    DayBand { band: usize, extent: Extent },
    /// Day > 0: new extent for background band `band`; the right-hand neighbour compensates.
    BandShift { band: usize, extent: Extent },
    Title { text: String },
    Ticks { label: String, index: usize },
}

impl StepKind {
    /// Short lowercase name, used in log and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Line { .. } => "line",
            StepKind::DayBand { .. } => "dayband",
            StepKind::BandShift { .. } => "bandshift",
            StepKind::Title { .. } => "title",
            StepKind::Ticks { .. } => "ticks",
        }
    }
}

/// Immutable record of one drawing delta, keyed for replay by `(day, chart_band)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub layer: LayerId,
    /// Arc index within the owning layer; 0 for non-arc kinds.
    pub arc: u32,
    pub day: u32,
    /// Hour-of-day index (0..=24) this step is replayed in.
    pub chart_band: usize,
    pub z_order: i32,
    pub kind: StepKind,
}

impl Step {
    /// Arc segments are the only steps the limiter expires.
    pub fn is_line(&self) -> bool {
        matches!(self.kind, StepKind::Line { .. })
    }
}

/// All steps of one day, one ordered list per chart band.
pub type DaySteps = [Vec<Step>; CHART_BANDS];

fn empty_day() -> Box<DaySteps> {
    Box::new(std::array::from_fn(|_| Vec::new()))
}

/// Step log keyed by day, then chart band. Within a band, insertion order is drawing order.
///
/// Lookups never create entries: an unrecorded day or band reads as an empty list.
#[derive(Clone, Debug, Default)]
pub struct StepLog {
    days: BTreeMap<u32, Box<DaySteps>>,
}

impl StepLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `step` to its `(day, chart_band)` list.
    ///
    /// Chart bands past 24 are a consistency error.
    pub fn push(&mut self, step: Step) -> ReelResult<()> {
        if step.chart_band >= CHART_BANDS {
            return Err(ReelError::consistency(format!(
                "{} step for day {} has chart band {} (max {})",
                step.kind.name(),
                step.day,
                step.chart_band,
                CHART_BANDS - 1
            )));
        }
        let band = step.chart_band;
        self.days.entry(step.day).or_insert_with(empty_day)[band].push(step);
        Ok(())
    }

    /// Steps recorded for `(day, band)`, in drawing order.
    pub fn steps(&self, day: u32, band: usize) -> &[Step] {
        self.days
            .get(&day)
            .and_then(|d| d.get(band))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Append every step `other` holds for `day`, band by band.
    pub fn collate_day(&mut self, day: u32, other: &StepLog) -> ReelResult<()> {
        let Some(src) = other.days.get(&day) else {
            return Ok(());
        };
        for steps in src.iter() {
            for step in steps {
                self.push(step.clone())?;
            }
        }
        Ok(())
    }

    /// Number of distinct days with at least one recorded band entry.
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    /// `true` when no day has been recorded.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Total number of recorded steps.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Drop every recorded day.
    pub fn clear(&mut self) {
        self.days.clear();
    }

    /// Every step in replay order: day, then band, then insertion.
    pub fn iter(&self) -> impl Iterator<Item = &Step> + '_ {
        self.days
            .values()
            .flat_map(|d| d.iter())
            .flat_map(|steps| steps.iter())
    }
}
