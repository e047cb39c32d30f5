//! Frame extraction, letterbox transform and artifact persistence
//!
//! One successful render produces exactly one artifact: a JPEG at a
//! stable per-title path, always holding the most recently rendered
//! frame. Artifact persistence - not display success - is what gates the
//! cursor advance in the scheduler.

use crate::display::DisplaySink;
use crate::video::VideoSource;
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};
use slowmovie_common::db::{Settings, Title};
use slowmovie_common::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// JPEG quality for the persisted frame artifact.
const ARTIFACT_JPEG_QUALITY: u8 = 90;

/// Placement of a source frame on the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Letterbox {
    pub width: u32,
    pub height: u32,
    pub x_offset: u32,
    pub y_offset: u32,
}

/// Largest aspect-preserving fit of (src_w, src_h) within
/// (target_w, target_h), centered with floor-division offsets.
pub fn letterbox_fit(src_w: u32, src_h: u32, target_w: u32, target_h: u32) -> Letterbox {
    let src_ratio = f64::from(src_w) / f64::from(src_h);
    let target_ratio = f64::from(target_w) / f64::from(target_h);

    let (width, height) = if src_ratio > target_ratio {
        let height = (f64::from(target_w) * f64::from(src_h) / f64::from(src_w)).round() as u32;
        (target_w, height)
    } else {
        let width = (f64::from(target_h) * f64::from(src_w) / f64::from(src_h)).round() as u32;
        (width, target_h)
    };

    Letterbox {
        width,
        height,
        x_offset: (target_w - width) / 2,
        y_offset: (target_h - height) / 2,
    }
}

/// Scale the frame and center it on a black canvas of the target size.
pub fn compose(frame: &RgbImage, target_w: u32, target_h: u32) -> RgbImage {
    let fit = letterbox_fit(frame.width(), frame.height(), target_w, target_h);

    let resized = imageops::resize(frame, fit.width, fit.height, imageops::FilterType::Triangle);

    // RgbImage::new zero-fills, which is already black
    let mut canvas = RgbImage::new(target_w, target_h);
    imageops::replace(
        &mut canvas,
        &resized,
        i64::from(fit.x_offset),
        i64::from(fit.y_offset),
    );
    canvas
}

/// Remaining-playback estimate for operator display. Not consulted by
/// any scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackRemaining {
    pub years: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

/// Decompose `((total - current) / skip) * (minutes * 60000)` ms into
/// 365-day years, days, hours and minutes by successive integer division.
pub fn remaining_playback(
    total_frames: i64,
    current_frame: i64,
    skip_frames: i64,
    time_per_frame_minutes: i64,
) -> PlaybackRemaining {
    let ticks_left = (total_frames - current_frame).max(0) / skip_frames.max(1);
    let total_ms = ticks_left * time_per_frame_minutes.max(0) * 60_000;

    let years = total_ms / 31_536_000_000;
    let remainder = total_ms % 31_536_000_000;
    let days = remainder / 86_400_000;
    let remainder = remainder % 86_400_000;
    let hours = remainder / 3_600_000;
    let remainder = remainder % 3_600_000;
    let minutes = remainder / 60_000;

    PlaybackRemaining {
        years,
        days,
        hours,
        minutes,
    }
}

impl fmt::Display for PlaybackRemaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} years, {} days, {} hours, {} minutes",
            self.years, self.days, self.hours, self.minutes
        )
    }
}

/// Result of one successful render.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    /// The frame index actually rendered (after any invariant restore).
    pub rendered_frame: i64,
    pub artifact: PathBuf,
    /// False when the display sink failed; the artifact is still valid
    /// and the cursor still advances.
    pub displayed: bool,
}

/// Extracts, transforms and persists one frame per invocation.
pub struct FrameRenderer {
    source: Arc<dyn VideoSource>,
    display: Arc<dyn DisplaySink>,
    output_dir: PathBuf,
}

impl FrameRenderer {
    pub fn new(
        source: Arc<dyn VideoSource>,
        display: Arc<dyn DisplaySink>,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            source,
            display,
            output_dir,
        }
    }

    /// Stable artifact location for a title, keyed by id.
    pub fn artifact_path(&self, title_id: i64) -> PathBuf {
        self.output_dir.join(format!("title_{}.jpg", title_id))
    }

    /// Render the frame at the title's cursor.
    ///
    /// Blocking (decode + encode); the scheduler runs it inside
    /// `spawn_blocking`. On open or decode failure no artifact is written
    /// and no display call is made, so the caller retries the same frame.
    pub fn render_title(&self, title: &Title, settings: &Settings) -> Result<RenderOutcome> {
        let video_path = Path::new(&settings.video_root_path).join(&title.relative_path);
        let mut handle = self.source.open(&video_path)?;

        let frame_index = self.effective_frame(title, handle.total_frames());
        let frame = handle.read_frame(frame_index)?;

        let (target_w, target_h) = settings.target_resolution();
        let canvas = compose(&frame, target_w, target_h);

        std::fs::create_dir_all(&self.output_dir)?;
        let artifact = self.artifact_path(title.id);
        let writer = BufWriter::new(File::create(&artifact)?);
        let encoder = JpegEncoder::new_with_quality(writer, ARTIFACT_JPEG_QUALITY);
        canvas
            .write_with_encoder(encoder)
            .map_err(|e| Error::Internal(format!("failed to encode frame artifact: {e}")))?;

        let remaining = remaining_playback(
            title.total_frames,
            frame_index,
            title.skip(),
            title.time_per_frame,
        );
        let next_at = chrono::Local::now() + chrono::Duration::from_std(title.tick_interval())
            .unwrap_or_else(|_| chrono::Duration::minutes(1));
        info!(
            title_id = title.id,
            frame = frame_index,
            "Rendered frame; estimated playback remaining: {}; next frame at {}",
            remaining,
            next_at.format("%Y-%m-%d %H:%M:%S")
        );

        // The artifact is persisted: cursor advance is now earned whether
        // or not the hardware accepts the frame
        let displayed = match self.display.render(&canvas, &artifact) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    title_id = title.id,
                    sink = self.display.name(),
                    "Display sink failed: {e}"
                );
                false
            }
        };

        Ok(RenderOutcome {
            rendered_frame: frame_index,
            artifact,
            displayed,
        })
    }

    /// Restore the cursor invariant rather than trusting callers: an
    /// externally-edited `total_frames` can shrink underneath us.
    fn effective_frame(&self, title: &Title, source_frames: i64) -> i64 {
        let mut frame = title.current_frame;

        if frame < 0 || (title.total_frames > 0 && frame >= title.total_frames) {
            warn!(
                title_id = title.id,
                current_frame = title.current_frame,
                total_frames = title.total_frames,
                "Cursor out of range, wrapping to 0"
            );
            frame = 0;
        }

        if source_frames > 0 && frame >= source_frames {
            warn!(
                title_id = title.id,
                frame,
                source_frames,
                "Cursor beyond frames present in the file, wrapping to 0"
            );
            frame = 0;
        }

        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockVideoSource, RecordingDisplay};
    use slowmovie_common::db::Title;

    fn test_title(total_frames: i64, current_frame: i64, skip_frames: i64) -> Title {
        Title {
            id: 3,
            relative_path: "clip.mp4".to_string(),
            total_frames,
            current_frame,
            skip_frames,
            time_per_frame: 60,
            is_active: true,
            is_random: false,
            use_quiet_hours: false,
            quiet_start_hour: 22,
            quiet_end_hour: 7,
        }
    }

    fn test_settings(dir: &Path) -> Settings {
        Settings {
            video_root_path: dir.to_string_lossy().to_string(),
            resolution: "800,480".to_string(),
        }
    }

    #[test]
    fn letterbox_landscape_into_800x480() {
        let fit = letterbox_fit(1920, 1080, 800, 480);
        assert_eq!(
            fit,
            Letterbox {
                width: 800,
                height: 450,
                x_offset: 0,
                y_offset: 15,
            }
        );
    }

    #[test]
    fn letterbox_portrait_into_800x480() {
        let fit = letterbox_fit(480, 800, 800, 480);
        assert_eq!(
            fit,
            Letterbox {
                width: 288,
                height: 480,
                x_offset: 256,
                y_offset: 0,
            }
        );
    }

    #[test]
    fn letterbox_exact_aspect_match_fills_canvas() {
        let fit = letterbox_fit(1600, 960, 800, 480);
        assert_eq!(
            fit,
            Letterbox {
                width: 800,
                height: 480,
                x_offset: 0,
                y_offset: 0,
            }
        );
    }

    #[test]
    fn compose_centers_with_black_borders() {
        let frame = RgbImage::from_pixel(1920, 1080, image::Rgb([200, 40, 40]));
        let canvas = compose(&frame, 800, 480);

        assert_eq!(canvas.dimensions(), (800, 480));
        // Top and bottom borders are black
        assert_eq!(canvas.get_pixel(400, 0), &image::Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(400, 479), &image::Rgb([0, 0, 0]));
        // Content area keeps the frame color
        assert_eq!(canvas.get_pixel(400, 240), &image::Rgb([200, 40, 40]));
        // First content row starts at the y offset
        assert_eq!(canvas.get_pixel(0, 15), &image::Rgb([200, 40, 40]));
        assert_eq!(canvas.get_pixel(0, 14), &image::Rgb([0, 0, 0]));
    }

    #[test]
    fn remaining_playback_decomposition() {
        // 172800 frames left, 1 per minute: 120 days exactly
        let remaining = remaining_playback(172_800, 0, 1, 1);
        assert_eq!(
            remaining,
            PlaybackRemaining {
                years: 0,
                days: 120,
                hours: 0,
                minutes: 0,
            }
        );

        // 5 frames left at skip 10 is zero whole ticks: nothing remains
        let remaining = remaining_playback(100, 95, 10, 60);
        assert_eq!(
            remaining,
            PlaybackRemaining {
                years: 0,
                days: 0,
                hours: 0,
                minutes: 0,
            }
        );

        // A year and change
        let remaining = remaining_playback(525_600 + 1_440, 0, 1, 1);
        assert_eq!(remaining.years, 1);
        assert_eq!(remaining.days, 1);
        assert_eq!(remaining.hours, 0);
        assert_eq!(remaining.minutes, 0);
    }

    #[test]
    fn remaining_playback_is_robust_to_bad_inputs() {
        let remaining = remaining_playback(100, 200, 0, -5);
        assert_eq!(
            remaining,
            PlaybackRemaining {
                years: 0,
                days: 0,
                hours: 0,
                minutes: 0,
            }
        );
    }

    #[test]
    fn render_persists_artifact_at_stable_path() {
        let dir = tempfile::tempdir().unwrap();
        let display = Arc::new(RecordingDisplay::succeeding());
        let renderer = FrameRenderer::new(
            Arc::new(MockVideoSource::with_frames(100)),
            display.clone(),
            dir.path().join("frames"),
        );

        let title = test_title(100, 40, 1);
        let outcome = renderer
            .render_title(&title, &test_settings(dir.path()))
            .unwrap();

        assert_eq!(outcome.rendered_frame, 40);
        assert!(outcome.displayed);
        assert_eq!(outcome.artifact, dir.path().join("frames").join("title_3.jpg"));
        assert!(outcome.artifact.exists());
        assert_eq!(display.call_count(), 1);

        let persisted = image::open(&outcome.artifact).unwrap();
        assert_eq!(persisted.width(), 800);
        assert_eq!(persisted.height(), 480);
    }

    #[test]
    fn render_failure_writes_nothing_and_skips_display() {
        let dir = tempfile::tempdir().unwrap();
        let display = Arc::new(RecordingDisplay::succeeding());
        let renderer = FrameRenderer::new(
            Arc::new(MockVideoSource::failing_read(100)),
            display.clone(),
            dir.path().join("frames"),
        );

        let title = test_title(100, 40, 1);
        let result = renderer.render_title(&title, &test_settings(dir.path()));

        assert!(result.is_err());
        assert!(!renderer.artifact_path(title.id).exists());
        assert_eq!(display.call_count(), 0);
    }

    #[test]
    fn display_failure_still_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FrameRenderer::new(
            Arc::new(MockVideoSource::with_frames(100)),
            Arc::new(RecordingDisplay::failing()),
            dir.path().join("frames"),
        );

        let title = test_title(100, 40, 1);
        let outcome = renderer
            .render_title(&title, &test_settings(dir.path()))
            .unwrap();

        assert!(!outcome.displayed);
        assert!(outcome.artifact.exists());
    }

    #[test]
    fn out_of_range_cursor_wraps_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FrameRenderer::new(
            Arc::new(MockVideoSource::with_frames(50)),
            Arc::new(RecordingDisplay::succeeding()),
            dir.path().join("frames"),
        );

        // total_frames shrank underneath the cursor
        let title = test_title(50, 80, 1);
        let outcome = renderer
            .render_title(&title, &test_settings(dir.path()))
            .unwrap();

        assert_eq!(outcome.rendered_frame, 0);
    }
}
