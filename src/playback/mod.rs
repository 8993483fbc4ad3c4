//! Deferred playback: replays recorded step logs hour by hour into a frame output.

pub mod bands;
pub mod engine;
pub mod filter;
pub mod frames;
pub mod limiter;
pub mod state;

use std::path::PathBuf;

use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::foundation::core::Fps;
use crate::playback::frames::{EncodedExport, FrameOut, PacedPreview, StampLog};

/// Where replayed frames go.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputMode {
    /// Paced on-screen style preview at `fps`.
    Preview { fps: Fps },
    /// Encoded MP4 via the system `ffmpeg`.
    Export {
        path: PathBuf,
        fps: Fps,
        /// Copies of the first and last frame; `None` holds for one second.
        hold_frames: Option<u64>,
    },
    /// Walk the whole run without drawing or pacing.
    DryRun,
}

/// Options for one playback run.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackOpts {
    /// Days visible at once. `None` means the run was dismissed before it started.
    pub day_cap: Option<i32>,
    pub output: OutputMode,
}

impl PlaybackOpts {
    pub fn preview(day_cap: i32) -> Self {
        Self {
            day_cap: Some(day_cap),
            output: OutputMode::Preview { fps: Fps::CHART },
        }
    }

    pub fn export(day_cap: i32, path: impl Into<PathBuf>) -> Self {
        Self {
            day_cap: Some(day_cap),
            output: OutputMode::Export {
                path: path.into(),
                fps: Fps::CHART,
                hold_frames: None,
            },
        }
    }

    /// Build the frame output for [`PlaybackOpts::output`].
    pub fn frame_out(&self) -> Box<dyn FrameOut> {
        match &self.output {
            OutputMode::Preview { fps } => Box::new(PacedPreview::new(*fps)),
            OutputMode::Export {
                path,
                fps,
                hold_frames,
            } => {
                let export = EncodedExport::new(FfmpegSink::new(FfmpegSinkOpts::new(path)), *fps);
                match hold_frames {
                    Some(n) => Box::new(export.with_hold_frames(*n)),
                    None => Box::new(export),
                }
            }
            OutputMode::DryRun => Box::new(StampLog::new()),
        }
    }
}
