//! Video source abstraction
//!
//! The scheduler opens the active title's file fresh on every rendering
//! tick and drops the handle before sleeping; no decoder state survives
//! across ticks. Seeking to an arbitrary frame index is the source's
//! concern.

use image::RgbImage;
use slowmovie_common::Result;
use std::path::Path;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;

/// Opens video files and hands out per-file handles.
pub trait VideoSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoHandle>>;
}

/// One opened video file.
///
/// Not `Send`: FFmpeg contexts must stay on the blocking thread that
/// opened them. A handle lives and dies inside a single render call.
pub trait VideoHandle {
    /// Total frame count reported by the container.
    fn total_frames(&self) -> i64;

    /// Decode the frame at `index` as packed RGB.
    fn read_frame(&mut self, index: i64) -> Result<RgbImage>;
}
