use std::collections::{HashMap, VecDeque};

use crate::canvas::{Canvas, MarkId};
use crate::foundation::core::{Line, Rgba8};
use crate::foundation::error::ReelResult;
use crate::steps::step::LayerId;

/// Line batches created during playback, per (layer, arc), oldest first.
///
/// Each day of an arc grows one batch; expiry eats the oldest batch from its tail end.
#[derive(Debug, Default)]
pub struct ArcLimiter {
    groups: HashMap<(LayerId, u32), VecDeque<MarkId>>,
    expiries: u64,
}

impl ArcLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hour 0 opens a new batch from `segment`; later hours append its end point to the newest
    /// batch, whose trailing colour and width take the new values.
    #[allow(clippy::too_many_arguments)]
    pub fn extend<C: Canvas + ?Sized>(
        &mut self,
        canvas: &mut C,
        layer: LayerId,
        arc: u32,
        hour: usize,
        segment: Line,
        color: Rgba8,
        width: f64,
        z_order: i32,
    ) -> ReelResult<()> {
        let group = self.groups.entry((layer, arc)).or_default();
        match group.back().copied() {
            Some(newest) if hour != 0 => canvas.extend_line_batch(newest, segment.p1, color, width),
            // An arc whose first recorded hour is not 0 still needs a batch to grow.
            _ => {
                let batch = canvas.add_line_batch(&[segment], &[color], width, z_order)?;
                group.push_back(batch);
                Ok(())
            }
        }
    }

    /// Shrink the oldest batch by one point, removing it once it is down to one segment.
    /// Returns `true` when a batch was removed.
    pub fn expire<C: Canvas + ?Sized>(
        &mut self,
        canvas: &mut C,
        layer: LayerId,
        arc: u32,
    ) -> ReelResult<bool> {
        let Some(group) = self.groups.get_mut(&(layer, arc)) else {
            return Ok(false);
        };
        let Some(oldest) = group.front().copied() else {
            return Ok(false);
        };
        self.expiries += 1;
        let removed = canvas.shrink_or_remove_line_batch(oldest)?;
        if removed {
            group.pop_front();
        }
        Ok(removed)
    }

    /// `expire` calls that found a batch to work on.
    pub fn expiries(&self) -> u64 {
        self.expiries
    }

    pub fn group_len(&self, layer: LayerId, arc: u32) -> usize {
        self.groups.get(&(layer, arc)).map_or(0, VecDeque::len)
    }

    pub fn batch_count(&self) -> usize {
        self.groups.values().map(VecDeque::len).sum()
    }
}
