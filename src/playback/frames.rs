use std::time::{Duration, Instant};

use crate::canvas::{Canvas, Redraw};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::ReelResult;
use crate::playback::engine::FrameStamp;
use crate::render::FrameRGBA;

/// Consumer of the frames a playback run emits, one per replayed hour.
pub trait FrameOut {
    /// Called once after the sheet has been cleared, before the first hour.
    fn open(&mut self, canvas: &mut dyn Canvas) -> ReelResult<()>;

    fn capture(&mut self, canvas: &mut dyn Canvas, stamp: &FrameStamp) -> ReelResult<()>;

    /// Finalize output. Safe to call more than once and after a failed `open`/`capture`.
    fn close(&mut self, canvas: &mut dyn Canvas) -> ReelResult<()>;
}

/// Real-time preview: redraws each frame and sleeps until the next frame is due.
///
/// Deadlines advance by exactly one frame, so time spent drawing is absorbed; once drawing runs
/// behind, the schedule restarts from now instead of bursting to catch up.
#[derive(Debug)]
pub struct PacedPreview {
    frame: Duration,
    deadline: Option<Instant>,
    frames: u64,
}

impl PacedPreview {
    pub fn new(fps: Fps) -> Self {
        Self {
            frame: fps.frame_duration(),
            deadline: None,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl FrameOut for PacedPreview {
    fn open(&mut self, canvas: &mut dyn Canvas) -> ReelResult<()> {
        canvas.redraw(Redraw::Immediate);
        self.deadline = Some(Instant::now());
        Ok(())
    }

    fn capture(&mut self, canvas: &mut dyn Canvas, _stamp: &FrameStamp) -> ReelResult<()> {
        canvas.redraw(Redraw::Immediate);
        let now = Instant::now();
        let next = self.deadline.unwrap_or(now) + self.frame;
        if next > now {
            std::thread::sleep(next - now);
            self.deadline = Some(next);
        } else {
            self.deadline = Some(now);
        }
        self.frames += 1;
        Ok(())
    }

    fn close(&mut self, canvas: &mut dyn Canvas) -> ReelResult<()> {
        if self.deadline.take().is_some() {
            canvas.redraw(Redraw::Deferred);
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExportState {
    Idle,
    Streaming,
    Closed,
}

/// Export: every replayed hour is rasterized and pushed into a [`FrameSink`].
///
/// The stream opens and closes with `hold_frames` copies of the first and last frame (one
/// second at the stream rate by default).
pub struct EncodedExport<S: FrameSink> {
    sink: S,
    fps: Fps,
    hold_frames: u64,
    next: u64,
    state: ExportState,
}

impl<S: FrameSink> EncodedExport<S> {
    pub fn new(sink: S, fps: Fps) -> Self {
        Self {
            sink,
            fps,
            hold_frames: fps.frames_per_second_floor(),
            next: 0,
            state: ExportState::Idle,
        }
    }

    pub fn with_hold_frames(mut self, hold_frames: u64) -> Self {
        self.hold_frames = hold_frames;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Frames pushed so far, hold frames included.
    pub fn frames_pushed(&self) -> u64 {
        self.next
    }

    fn push(&mut self, frame: &FrameRGBA) -> ReelResult<()> {
        self.sink.push_frame(FrameIndex(self.next), frame)?;
        self.next += 1;
        Ok(())
    }

    fn push_held(&mut self, frame: &FrameRGBA) -> ReelResult<()> {
        for _ in 0..self.hold_frames {
            self.push(frame)?;
        }
        Ok(())
    }
}

impl<S: FrameSink> FrameOut for EncodedExport<S> {
    fn open(&mut self, canvas: &mut dyn Canvas) -> ReelResult<()> {
        canvas.redraw(Redraw::Immediate);
        let frame = canvas.capture()?;
        self.sink.begin(SinkConfig {
            width: frame.width,
            height: frame.height,
            fps: self.fps,
        })?;
        self.state = ExportState::Streaming;
        self.push_held(&frame)
    }

    fn capture(&mut self, canvas: &mut dyn Canvas, _stamp: &FrameStamp) -> ReelResult<()> {
        canvas.redraw(Redraw::Immediate);
        let frame = canvas.capture()?;
        self.push(&frame)
    }

    fn close(&mut self, canvas: &mut dyn Canvas) -> ReelResult<()> {
        if self.state != ExportState::Streaming {
            return Ok(());
        }
        self.state = ExportState::Closed;
        let held = canvas.capture().and_then(|frame| self.push_held(&frame));
        // The stream is finalized even when the closing frames could not be produced.
        let ended = self.sink.end();
        tracing::debug!(frames = self.next, "export closed");
        held.and(ended)
    }
}

/// Records frame stamps without drawing anything; used for dry runs and by tests.
#[derive(Debug, Default)]
pub struct StampLog {
    stamps: Vec<FrameStamp>,
    opened: u32,
    closed: u32,
}

impl StampLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stamps(&self) -> &[FrameStamp] {
        &self.stamps
    }

    pub fn opened(&self) -> u32 {
        self.opened
    }

    pub fn closed(&self) -> u32 {
        self.closed
    }
}

impl FrameOut for StampLog {
    fn open(&mut self, _canvas: &mut dyn Canvas) -> ReelResult<()> {
        self.opened += 1;
        Ok(())
    }

    fn capture(&mut self, _canvas: &mut dyn Canvas, stamp: &FrameStamp) -> ReelResult<()> {
        self.stamps.push(*stamp);
        Ok(())
    }

    fn close(&mut self, _canvas: &mut dyn Canvas) -> ReelResult<()> {
        self.closed += 1;
        Ok(())
    }
}
