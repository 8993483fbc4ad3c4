use std::collections::BTreeMap;

use crate::canvas::{Canvas, Redraw};
use crate::foundation::error::{ReelError, ReelResult};
use crate::steps::layer::{LayerCommand, LayerSet};
use crate::steps::step::LayerId;

/// Visibility of every animated layer at the instant playback began.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisibilitySnapshot {
    states: BTreeMap<LayerId, bool>,
}

impl VisibilitySnapshot {
    pub fn capture(layers: &LayerSet) -> Self {
        Self {
            states: layers
                .animated()
                .map(|l| (l.id(), l.is_visible()))
                .collect(),
        }
    }

    pub fn get(&self, layer: LayerId) -> Option<bool> {
        self.states.get(&layer).copied()
    }

    /// Layers unknown to the snapshot (chrome, late additions) are replayed.
    pub fn is_animated(&self, layer: LayerId) -> bool {
        self.get(layer).unwrap_or(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, bool)> + '_ {
        self.states.iter().map(|(id, v)| (*id, *v))
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Decides which steps a run replays, and hides the full view while it does.
#[derive(Debug)]
pub struct VisibilityFilter {
    background: LayerId,
    snapshot: Option<VisibilitySnapshot>,
}

impl VisibilityFilter {
    pub fn new(background: LayerId) -> Self {
        Self {
            background,
            snapshot: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn snapshot(&self) -> Option<&VisibilitySnapshot> {
        self.snapshot.as_ref()
    }

    /// Snapshot every animated layer, then hide all of them except the background.
    pub fn begin<C: Canvas + ?Sized>(
        &mut self,
        layers: &mut LayerSet,
        canvas: &mut C,
    ) -> ReelResult<()> {
        if self.snapshot.is_some() {
            return Err(ReelError::consistency("playback already in progress"));
        }
        let snapshot = VisibilitySnapshot::capture(layers);
        for (id, visible) in snapshot.iter() {
            if visible && id != self.background {
                layers.apply(LayerCommand::Hide(id), canvas)?;
            }
        }
        tracing::debug!(layers = snapshot.len(), "visibility snapshot taken");
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Snapshot lookup for the running playback; everything animates when no run is active.
    pub fn is_animated(&self, layer: LayerId) -> bool {
        self.snapshot
            .as_ref()
            .is_none_or(|s| s.is_animated(layer))
    }

    /// Put every snapshotted layer back to its recorded visibility. A no-op when not active.
    pub fn end<C: Canvas + ?Sized>(
        &mut self,
        layers: &mut LayerSet,
        canvas: &mut C,
    ) -> ReelResult<()> {
        let Some(snapshot) = self.snapshot.take() else {
            return Ok(());
        };
        for (id, visible) in snapshot.iter() {
            let cmd = if visible {
                LayerCommand::Show(id)
            } else {
                LayerCommand::Hide(id)
            };
            layers.apply(cmd, canvas)?;
        }
        canvas.redraw(Redraw::Deferred);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::scene::ChartCanvas;
    use crate::render::cpu::RasterOpts;
    use crate::steps::layer::LayerKind;

    fn setup() -> (LayerSet, LayerId, LayerId, LayerId, LayerId) {
        let mut set = LayerSet::new();
        let bg = set
            .add("Day Bands", LayerKind::Animated, Some('b'), true)
            .unwrap();
        let lunar = set
            .add("Lunar Path", LayerKind::Animated, Some('l'), true)
            .unwrap();
        let main = set
            .add("Transit Arc", LayerKind::Animated, Some('m'), true)
            .unwrap();
        let grid = set.add("Grid", LayerKind::Static, Some('g'), false).unwrap();
        (set, bg, lunar, main, grid)
    }

    #[test]
    fn begin_hides_everything_but_background() {
        let (mut set, bg, lunar, main, grid) = setup();
        let mut canvas = ChartCanvas::new(RasterOpts::default());
        set.apply(LayerCommand::Hide(main), &mut canvas).unwrap();

        let mut filter = VisibilityFilter::new(bg);
        filter.begin(&mut set, &mut canvas).unwrap();
        assert!(set.require(bg).unwrap().is_visible());
        assert!(!set.require(lunar).unwrap().is_visible());
        assert!(set.require(grid).unwrap().is_visible());

        assert!(filter.is_animated(bg));
        assert!(filter.is_animated(lunar));
        assert!(!filter.is_animated(main));
        assert!(filter.is_animated(LayerId::CHROME));
        assert!(filter.snapshot().unwrap().get(grid).is_none());
        assert!(filter.begin(&mut set, &mut canvas).is_err());
    }

    #[test]
    fn toggles_during_playback_do_not_reach_the_snapshot() {
        let (mut set, bg, lunar, main, _) = setup();
        let mut canvas = ChartCanvas::new(RasterOpts::default());
        let mut filter = VisibilityFilter::new(bg);
        filter.begin(&mut set, &mut canvas).unwrap();

        set.apply(LayerCommand::Toggle(lunar), &mut canvas).unwrap();
        set.apply(LayerCommand::Hide(bg), &mut canvas).unwrap();
        assert!(filter.is_animated(lunar));
        assert!(filter.is_animated(bg));
        assert!(filter.is_animated(main));
    }

    #[test]
    fn begin_then_end_restores_exact_visibility() {
        let (mut set, bg, lunar, main, _) = setup();
        let mut canvas = ChartCanvas::new(RasterOpts::default());
        set.apply(LayerCommand::Hide(lunar), &mut canvas).unwrap();
        let before: Vec<bool> = set.iter().map(|l| l.is_visible()).collect();

        let mut filter = VisibilityFilter::new(bg);
        filter.begin(&mut set, &mut canvas).unwrap();
        filter.end(&mut set, &mut canvas).unwrap();
        let after: Vec<bool> = set.iter().map(|l| l.is_visible()).collect();
        assert_eq!(before, after);
        assert!(!filter.is_active());
        assert!(filter.is_animated(main));

        let deferred = canvas.redraws().deferred;
        filter.end(&mut set, &mut canvas).unwrap();
        assert_eq!(canvas.redraws().deferred, deferred);
    }
}
