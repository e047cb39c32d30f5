//! Shared mocks for unit tests: an in-memory video source and a
//! recording display sink.

use crate::display::DisplaySink;
use crate::video::{VideoHandle, VideoSource};
use image::RgbImage;
use slowmovie_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Video source producing solid-color 1920x1080 frames, with switches
/// for open and decode failures.
pub struct MockVideoSource {
    total_frames: i64,
    fail_open: bool,
    fail_read: bool,
}

impl MockVideoSource {
    pub fn with_frames(total_frames: i64) -> Self {
        Self {
            total_frames,
            fail_open: false,
            fail_read: false,
        }
    }

    pub fn failing_open() -> Self {
        Self {
            total_frames: 0,
            fail_open: true,
            fail_read: false,
        }
    }

    pub fn failing_read(total_frames: i64) -> Self {
        Self {
            total_frames,
            fail_open: false,
            fail_read: true,
        }
    }
}

impl VideoSource for MockVideoSource {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoHandle>> {
        if self.fail_open {
            return Err(Error::Video(format!(
                "mock: cannot open {}",
                path.display()
            )));
        }
        Ok(Box::new(MockHandle {
            total_frames: self.total_frames,
            fail_read: self.fail_read,
        }))
    }
}

struct MockHandle {
    total_frames: i64,
    fail_read: bool,
}

impl VideoHandle for MockHandle {
    fn total_frames(&self) -> i64 {
        self.total_frames
    }

    fn read_frame(&mut self, index: i64) -> Result<RgbImage> {
        if self.fail_read {
            return Err(Error::Video(format!("mock: cannot decode frame {index}")));
        }
        Ok(RgbImage::from_pixel(1920, 1080, image::Rgb([200, 40, 40])))
    }
}

/// Display sink that records every call, optionally failing.
pub struct RecordingDisplay {
    calls: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingDisplay {
    pub fn succeeding() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl DisplaySink for RecordingDisplay {
    fn render(&self, _image: &RgbImage, artifact: &Path) -> Result<()> {
        if self.fail {
            return Err(Error::Display("mock: hardware unavailable".to_string()));
        }
        self.calls.lock().unwrap().push(artifact.to_path_buf());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
