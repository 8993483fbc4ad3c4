//! Encoding sinks.
//!
//! Sinks consume captured chart frames in stream order; export playback feeds them through
//! [`crate::playback::frames::EncodedExport`].

/// `ffmpeg`-based sink (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// Generic frame sink trait and the in-memory sink.
pub mod sink;
