//! FFmpeg-backed video source
//!
//! Opens the container, seeks to the keyframe preceding the requested
//! frame index and decodes forward until the target timestamp, then
//! converts the frame to packed RGB. One handle per tick; nothing is
//! cached between ticks.

use crate::video::{VideoHandle, VideoSource};
use image::RgbImage;
use slowmovie_common::{Error, Result};
use std::path::Path;
use std::sync::Once;
use tracing::debug;

/// Static flag to ensure FFmpeg is initialized only once.
static FFMPEG_INIT: Once = Once::new();

/// Initialize FFmpeg with a quiet log level.
///
/// Safe to call multiple times; the work happens once. The ERROR log
/// level suppresses per-file container warnings that would otherwise
/// flood the service log on every tick.
fn init_ffmpeg() -> Result<()> {
    let mut init_result: Result<()> = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(Error::Video(format!("FFmpeg initialization failed: {e}")));
            return;
        }

        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

/// Video source backed by FFmpeg.
pub struct FfmpegSource;

impl FfmpegSource {
    pub fn new() -> Result<Self> {
        init_ffmpeg()?;
        Ok(Self)
    }
}

impl VideoSource for FfmpegSource {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoHandle>> {
        Ok(Box::new(FfmpegHandle::open(path)?))
    }
}

struct FfmpegHandle {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
    /// Video stream time base in seconds per tick.
    time_base: f64,
    fps: f64,
    total_frames: i64,
}

impl FfmpegHandle {
    fn open(path: &Path) -> Result<Self> {
        let ictx = ffmpeg_next::format::input(&path)
            .map_err(|e| Error::Video(format!("failed to open {}: {}", path.display(), e)))?;

        let (stream_index, fps, time_base, stream_frames, stream_duration, parameters) = {
            let stream = ictx
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| {
                    Error::Video(format!("no video stream in {}", path.display()))
                })?;

            let rate = stream.avg_frame_rate();
            let fps = if rate.denominator() > 0 && rate.numerator() > 0 {
                f64::from(rate.numerator()) / f64::from(rate.denominator())
            } else {
                25.0
            };

            let tb = stream.time_base();
            let time_base = if tb.denominator() > 0 {
                f64::from(tb.numerator()) / f64::from(tb.denominator())
            } else {
                0.0
            };

            (
                stream.index(),
                fps,
                time_base,
                stream.frames(),
                stream.duration(),
                stream.parameters(),
            )
        };

        // Not every container records a frame count; fall back to
        // duration * fps, which is close enough for cursor wrapping
        let total_frames = if stream_frames > 0 {
            stream_frames
        } else if stream_duration > 0 && time_base > 0.0 {
            (stream_duration as f64 * time_base * fps) as i64
        } else {
            0
        };

        let context = ffmpeg_next::codec::context::Context::from_parameters(parameters)
            .map_err(|e| Error::Video(format!("failed to create codec context: {e}")))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| Error::Video(format!("failed to create video decoder: {e}")))?;

        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(Error::Video(format!(
                "invalid video dimensions {}x{} in {}",
                decoder.width(),
                decoder.height(),
                path.display()
            )));
        }

        debug!(
            path = %path.display(),
            fps,
            total_frames,
            "Opened video stream"
        );

        Ok(Self {
            ictx,
            decoder,
            stream_index,
            time_base,
            fps,
            total_frames,
        })
    }
}

impl VideoHandle for FfmpegHandle {
    fn total_frames(&self) -> i64 {
        self.total_frames
    }

    fn read_frame(&mut self, index: i64) -> Result<RgbImage> {
        if index < 0 {
            return Err(Error::Video(format!("negative frame index {index}")));
        }

        let target_secs = index as f64 / self.fps;
        let ts = (target_secs * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;

        // RangeTo lets FFmpeg land on the keyframe at or before the target
        self.ictx
            .seek(ts, ..ts)
            .map_err(|e| Error::Video(format!("seek to frame {index} failed: {e}")))?;
        self.decoder.flush();

        // Half-frame tolerance for imprecise container timestamps
        let tolerance = 0.5 / self.fps;
        let mut decoded = ffmpeg_next::frame::Video::empty();
        let mut matched = false;

        'packets: for (stream, packet) in self.ictx.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            if self.decoder.send_packet(&packet).is_err() {
                // Corrupt packet; keep decoding forward
                continue;
            }
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts_secs = decoded.pts().unwrap_or(0) as f64 * self.time_base;
                if pts_secs + tolerance >= target_secs {
                    matched = true;
                    break 'packets;
                }
            }
        }

        if !matched {
            // Drain buffered frames at end of stream; a request near the
            // tail may still be queued in the decoder
            let _ = self.decoder.send_eof();
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts_secs = decoded.pts().unwrap_or(0) as f64 * self.time_base;
                if pts_secs + tolerance >= target_secs {
                    matched = true;
                    break;
                }
            }
        }

        if !matched {
            return Err(Error::Video(format!(
                "frame {index} not found (stream reports {} frames)",
                self.total_frames
            )));
        }

        convert_frame(&decoded)
    }
}

/// Convert a decoded frame to packed RGB, handling row stride.
fn convert_frame(frame: &ffmpeg_next::frame::Video) -> Result<RgbImage> {
    let width = frame.width();
    let height = frame.height();
    if width == 0 || height == 0 {
        return Err(Error::Video(format!(
            "decoded frame has invalid dimensions {width}x{height}"
        )));
    }

    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        frame.format(),
        width,
        height,
        ffmpeg_next::format::Pixel::RGB24,
        width,
        height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .map_err(|e| Error::Video(format!("failed to create scaler: {e}")))?;

    let mut rgb = ffmpeg_next::frame::Video::empty();
    scaler
        .run(frame, &mut rgb)
        .map_err(|e| Error::Video(format!("failed to scale frame: {e}")))?;

    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = (width * 3) as usize;

    let mut bytes = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let row_start = y * stride;
        bytes.extend_from_slice(&data[row_start..row_start + row_len]);
    }

    RgbImage::from_raw(width, height, bytes)
        .ok_or_else(|| Error::Video("frame buffer size mismatch".to_string()))
}
