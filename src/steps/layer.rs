use crate::canvas::{Canvas, MarkId, Redraw};
use crate::foundation::error::{ReelError, ReelResult};
use crate::steps::step::{LayerId, Step, StepLog};

/// Whether a layer takes part in playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    /// Records steps and is replayed (background, arcs).
    Animated,
    /// Never records steps and is left alone by playback (grid, threshold guide).
    Static,
}

/// A named, toggleable recorder.
///
/// The veil is the complete set of directly drawn marks, shown or hidden as a whole; the log holds
/// the same content split into per-hour steps.
#[derive(Clone, Debug)]
pub struct Layer {
    id: LayerId,
    label: String,
    kind: LayerKind,
    visible: bool,
    shortcut: Option<char>,
    affects_title: bool,
    veil: Vec<MarkId>,
    log: StepLog,
}

impl Layer {
    fn new(id: LayerId, label: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id,
            label: label.into(),
            kind,
            visible: true,
            shortcut: None,
            affects_title: false,
            veil: Vec::new(),
            log: StepLog::new(),
        }
    }

    /// Id handed out by [`LayerSet::add`].
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Name shown in the chart title.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Rename the layer, e.g. after the query target.
    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    /// Animated layers record steps and take part in playback.
    pub fn is_animated(&self) -> bool {
        self.kind == LayerKind::Animated
    }

    /// Current visibility, as last set by a [`LayerCommand`].
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Uppercase keyboard shortcut, if any.
    pub fn shortcut(&self) -> Option<char> {
        self.shortcut
    }

    /// Whether toggling this layer changes the chart title.
    pub fn affects_title(&self) -> bool {
        self.affects_title
    }

    /// Marks drawn for the full view of this layer.
    pub fn veil(&self) -> &[MarkId] {
        &self.veil
    }

    /// Attach a drawn mark; it follows the layer's visibility from now on.
    pub fn add_to_veil(&mut self, mark: MarkId) {
        self.veil.push(mark);
    }

    /// Forget veil marks that no longer exist on the canvas.
    pub fn clear_veil(&mut self) {
        self.veil.clear();
    }

    /// Steps recorded for replay.
    pub fn log(&self) -> &StepLog {
        &self.log
    }

    /// Append a step owned by this layer. Static layers never record.
    pub fn record(&mut self, step: Step) -> ReelResult<()> {
        if self.kind == LayerKind::Static {
            return Err(ReelError::consistency(format!(
                "static layer '{}' cannot record {} steps",
                self.label,
                step.kind.name()
            )));
        }
        if step.layer != self.id {
            return Err(ReelError::consistency(format!(
                "step owned by layer {} recorded into layer {}",
                step.layer.0, self.id.0
            )));
        }
        self.log.push(step)
    }

    /// Clear the step log ahead of a new query. The veil is kept.
    pub fn wipe(&mut self) {
        self.log.clear();
    }

    /// Show or hide every veil mark according to the layer's visibility.
    pub fn draw_veil<C: Canvas + ?Sized>(&self, canvas: &mut C) -> ReelResult<()> {
        for mark in &self.veil {
            canvas.set_visible(*mark, self.visible)?;
        }
        Ok(())
    }
}

/// Explicit visibility change for one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerCommand {
    Show(LayerId),
    Hide(LayerId),
    Toggle(LayerId),
}

impl LayerCommand {
    /// Layer the command targets.
    pub fn layer(self) -> LayerId {
        match self {
            LayerCommand::Show(id) | LayerCommand::Hide(id) | LayerCommand::Toggle(id) => id,
        }
    }
}

/// Outcome of an applied [`LayerCommand`], for observers that re-poll chart state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerEvent {
    pub layer: LayerId,
    /// Visibility after the command.
    pub visible: bool,
    /// `false` when the layer already had the requested visibility.
    pub changed: bool,
    pub affects_title: bool,
}

/// Owner of every layer of a session, addressed by [`LayerId`].
#[derive(Clone, Debug, Default)]
pub struct LayerSet {
    layers: Vec<Layer>,
}

impl LayerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer; ids are handed out in registration order.
    pub fn add(
        &mut self,
        label: impl Into<String>,
        kind: LayerKind,
        shortcut: Option<char>,
        affects_title: bool,
    ) -> ReelResult<LayerId> {
        let raw = u16::try_from(self.layers.len())
            .ok()
            .filter(|raw| *raw != LayerId::CHROME.0)
            .ok_or_else(|| ReelError::consistency("too many layers"))?;
        let id = LayerId(raw);
        let mut layer = Layer::new(id, label, kind);
        layer.shortcut = shortcut.map(|c| c.to_ascii_uppercase());
        layer.affects_title = affects_title;
        self.layers.push(layer);
        Ok(id)
    }

    /// Look up a layer by id.
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(usize::from(id.0))
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(usize::from(id.0))
    }

    /// Like [`LayerSet::get`], but an unknown id is a consistency error.
    pub fn require(&self, id: LayerId) -> ReelResult<&Layer> {
        self.get(id)
            .ok_or_else(|| ReelError::consistency(format!("unknown layer {}", id.0)))
    }

    pub fn require_mut(&mut self, id: LayerId) -> ReelResult<&mut Layer> {
        self.get_mut(id)
            .ok_or_else(|| ReelError::consistency(format!("unknown layer {}", id.0)))
    }

    /// Layers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.layers.iter()
    }

    /// Only the layers that take part in playback.
    pub fn animated(&self) -> impl Iterator<Item = &Layer> + '_ {
        self.layers.iter().filter(|l| l.is_animated())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Clear every layer's step log ahead of a new presentation.
    pub fn wipe_logs(&mut self) {
        for layer in &mut self.layers {
            layer.wipe();
        }
    }

    /// Set a layer's visibility, update its veil and request a redraw.
    pub fn apply<C: Canvas + ?Sized>(
        &mut self,
        cmd: LayerCommand,
        canvas: &mut C,
    ) -> ReelResult<LayerEvent> {
        let layer = self.require_mut(cmd.layer())?;
        let visible = match cmd {
            LayerCommand::Show(_) => true,
            LayerCommand::Hide(_) => false,
            LayerCommand::Toggle(_) => !layer.visible,
        };
        let changed = visible != layer.visible;
        layer.visible = visible;
        layer.draw_veil(canvas)?;
        canvas.redraw(Redraw::Immediate);
        tracing::debug!(layer = %layer.label, visible, "layer visibility");
        Ok(LayerEvent {
            layer: layer.id,
            visible,
            changed,
            affects_title: layer.affects_title,
        })
    }

    /// Toggle command bound to a keyboard shortcut (case-insensitive).
    pub fn command_for_key(&self, key: char) -> Option<LayerCommand> {
        let key = key.to_ascii_uppercase();
        self.layers
            .iter()
            .find(|l| l.shortcut == Some(key))
            .map(|l| LayerCommand::Toggle(l.id))
    }

    /// Re-apply every layer's visibility to its veil.
    pub fn draw_veils<C: Canvas + ?Sized>(&self, canvas: &mut C) -> ReelResult<()> {
        for layer in &self.layers {
            layer.draw_veil(canvas)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::scene::ChartCanvas;
    use crate::foundation::core::{Extent, Rgba8};
    use crate::render::cpu::RasterOpts;
    use crate::steps::step::StepKind;

    fn title_step(layer: LayerId) -> Step {
        Step {
            layer,
            arc: 0,
            day: 0,
            chart_band: 0,
            z_order: 1,
            kind: StepKind::Title {
                text: "x".to_owned(),
            },
        }
    }

    #[test]
    fn static_layers_refuse_steps() {
        let mut set = LayerSet::new();
        let grid = set.add("Grid", LayerKind::Static, Some('g'), false).unwrap();
        let err = set
            .require_mut(grid)
            .unwrap()
            .record(title_step(grid))
            .unwrap_err();
        assert!(matches!(err, ReelError::Consistency(_)));
    }

    #[test]
    fn record_checks_owner() {
        let mut set = LayerSet::new();
        let a = set.add("A", LayerKind::Animated, None, true).unwrap();
        let b = set.add("B", LayerKind::Animated, None, true).unwrap();
        assert!(set.require_mut(a).unwrap().record(title_step(b)).is_err());
        set.require_mut(a).unwrap().record(title_step(a)).unwrap();
        assert_eq!(set.require(a).unwrap().log().len(), 1);
        set.wipe_logs();
        assert!(set.require(a).unwrap().log().is_empty());
    }

    #[test]
    fn apply_updates_veil_and_reports_change() {
        let mut canvas = ChartCanvas::new(RasterOpts::default());
        let mut set = LayerSet::new();
        let bands = set
            .add("Day Bands", LayerKind::Animated, Some('b'), true)
            .unwrap();
        let rect = canvas.add_rect(Extent::band(0.0, 24.0), Rgba8::grey(0), 1);
        set.require_mut(bands).unwrap().add_to_veil(rect);

        let ev = set.apply(LayerCommand::Toggle(bands), &mut canvas).unwrap();
        assert!(!ev.visible && ev.changed && ev.affects_title);
        assert!(!canvas.mark(rect).unwrap().is_visible());

        let ev = set.apply(LayerCommand::Hide(bands), &mut canvas).unwrap();
        assert!(!ev.changed);
        assert_eq!(canvas.redraws().immediate, 2);

        set.apply(LayerCommand::Show(bands), &mut canvas).unwrap();
        assert!(canvas.mark(rect).unwrap().is_visible());
    }

    #[test]
    fn shortcuts_are_case_insensitive() {
        let mut set = LayerSet::new();
        let lunar = set
            .add("Lunar Path", LayerKind::Animated, Some('l'), true)
            .unwrap();
        assert_eq!(set.command_for_key('L'), Some(LayerCommand::Toggle(lunar)));
        assert_eq!(set.command_for_key('l'), Some(LayerCommand::Toggle(lunar)));
        assert_eq!(set.command_for_key('x'), None);
    }
}
