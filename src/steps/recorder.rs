//! Converts directly drawn chart deltas into replayable steps.
//!
//! Nothing here touches a canvas; callers draw the full view themselves from the same data.

use crate::foundation::core::{Extent, Line, Rgba8, chart_band_of};
use crate::foundation::error::{ReelError, ReelResult};
use crate::steps::layer::Layer;
use crate::steps::step::{LayerId, Step, StepKind, StepLog};

/// z-order of title and tick-label steps.
pub const CHROME_Z: i32 = 1;

/// Record one hourly arc segment. The step replays in the hour its segment starts.
#[allow(clippy::too_many_arguments)]
pub fn record_line(
    layer: &mut Layer,
    arc: u32,
    day: u32,
    segment: Line,
    color: Rgba8,
    width: f64,
    z_order: i32,
) -> ReelResult<()> {
    if !segment.p0.x.is_finite() || !segment.p1.x.is_finite() {
        return Err(ReelError::geometry("arc segment has a non-finite hour"));
    }
    let id = layer.id();
    layer.record(Step {
        layer: id,
        arc,
        day,
        chart_band: chart_band_of(segment.p0.x),
        z_order,
        kind: StepKind::Line {
            segment,
            color,
            width,
        },
    })
}

/// Record the extent of background band `band` for `day`.
///
/// Day 0 grows the band in: one step per chart band its span touches, each at most one hour wider
/// than the last. Later days record a single shift, replayed in the hour the band now ends.
pub fn record_background(
    layer: &mut Layer,
    day: u32,
    band: usize,
    extent: Extent,
    z_order: i32,
) -> ReelResult<()> {
    let start = extent.x();
    let total = extent.width();
    if !start.is_finite() || !total.is_finite() || start < 0.0 || total < 0.0 {
        return Err(ReelError::geometry(format!(
            "background band {band} has invalid extent x={start} w={total}"
        )));
    }
    let id = layer.id();

    if day > 0 {
        return layer.record(Step {
            layer: id,
            arc: 0,
            day,
            chart_band: chart_band_of(start + total),
            z_order,
            kind: StepKind::BandShift { band, extent },
        });
    }

    let mut width = total.min(1.0 - start.fract());
    for chart_band in chart_band_of(start)..=chart_band_of(start + total) {
        layer.record(Step {
            layer: id,
            arc: 0,
            day,
            chart_band,
            z_order,
            kind: StepKind::DayBand {
                band,
                extent: extent.with_width(width),
            },
        })?;
        width = (width + 1.0).min(total);
    }
    Ok(())
}

pub fn record_title(log: &mut StepLog, day: u32, text: impl Into<String>) -> ReelResult<()> {
    log.push(Step {
        layer: LayerId::CHROME,
        arc: 0,
        day,
        chart_band: 0,
        z_order: CHROME_Z,
        kind: StepKind::Title { text: text.into() },
    })
}

pub fn record_ticks(
    log: &mut StepLog,
    day: u32,
    index: usize,
    label: impl Into<String>,
) -> ReelResult<()> {
    log.push(Step {
        layer: LayerId::CHROME,
        arc: 0,
        day,
        chart_band: index,
        z_order: CHROME_Z,
        kind: StepKind::Ticks {
            label: label.into(),
            index,
        },
    })
}
