//! Skyreel draws hour-by-hour altitude charts of the moon and chosen targets over a range of
//! days, and replays them as an animation.
//!
//! Every mark drawn for the full chart is also recorded as a step keyed by day and hour. A
//! playback run replays those steps one hour per frame, either accumulating every day or keeping
//! a sliding window of recent days that winds down to an empty chart at the end:
//!
//! - Load a [`Query`] and draw it with a [`ChartSession`]
//! - Capture still frames from the [`ChartCanvas`]
//! - [`ChartSession::animate`] into a paced preview or an encoded MP4 via a [`FrameSink`]
#![forbid(unsafe_code)]

pub mod canvas;
pub mod chart;
pub mod encode;
pub mod foundation;
pub mod playback;
pub mod render;
pub mod steps;

pub use crate::foundation::core::{Extent, Fps, FrameIndex, Rgba8};
pub use crate::foundation::error::{ReelError, ReelResult};

pub use crate::canvas::scene::ChartCanvas;
pub use crate::canvas::{Canvas, MarkId, Redraw};
pub use crate::chart::query::{DayData, Query};
pub use crate::chart::session::{ChartSession, PlaybackOutcome};
pub use crate::chart::style::ChartStyle;
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::playback::engine::{FrameStamp, PlaybackStats};
pub use crate::playback::frames::{EncodedExport, FrameOut, PacedPreview, StampLog};
pub use crate::playback::{OutputMode, PlaybackOpts};
pub use crate::render::FrameRGBA;
pub use crate::render::cpu::RasterOpts;
pub use crate::steps::layer::{LayerCommand, LayerEvent};
