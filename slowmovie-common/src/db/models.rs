//! Typed database rows
//!
//! All reads go through these records so the scheduler never performs
//! speculative field lookups on loose result rows. Each store read
//! returns a fresh snapshot; nothing here is cached across ticks.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;

/// Fallback target resolution when the stored value cannot be parsed.
pub const DEFAULT_RESOLUTION: (u32, u32) = (800, 480);

/// One row per known video.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Title {
    pub id: i64,
    /// Video location relative to the configured root. Unique.
    pub relative_path: String,
    pub total_frames: i64,
    /// The playback cursor. The engine restores `0 <= current_frame <
    /// total_frames` itself; external edits may break it at any time.
    pub current_frame: i64,
    /// Frames advanced per tick, >= 1.
    pub skip_frames: i64,
    /// Minutes between ticks for this title.
    pub time_per_frame: i64,
    pub is_active: bool,
    /// Reserved flag for non-sequential frame selection. Stored and
    /// surfaced, but the engine implements sequential advance only.
    pub is_random: bool,
    pub use_quiet_hours: bool,
    pub quiet_start_hour: i64,
    pub quiet_end_hour: i64,
}

impl Title {
    /// The per-title tick interval. Values below one minute are treated
    /// as one minute so a malformed row cannot busy-loop the scheduler.
    pub fn tick_interval(&self) -> std::time::Duration {
        let minutes = if self.time_per_frame < 1 {
            warn!(
                title_id = self.id,
                time_per_frame = self.time_per_frame,
                "time_per_frame below 1 minute, clamping to 1"
            );
            1
        } else {
            self.time_per_frame
        };
        std::time::Duration::from_secs(minutes as u64 * 60)
    }

    /// Frames advanced per tick, clamped to at least 1.
    pub fn skip(&self) -> i64 {
        self.skip_frames.max(1)
    }
}

/// Singleton settings row. Must exist before the scheduler runs.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Settings {
    pub video_root_path: String,
    /// Serialized as "width,height".
    pub resolution: String,
}

impl Settings {
    /// Parsed target resolution. A malformed value degrades to
    /// [`DEFAULT_RESOLUTION`] with a warning rather than stopping playback.
    pub fn target_resolution(&self) -> (u32, u32) {
        match parse_resolution(&self.resolution) {
            Some(res) => res,
            None => {
                warn!(
                    resolution = %self.resolution,
                    "Malformed resolution in settings, falling back to {}x{}",
                    DEFAULT_RESOLUTION.0,
                    DEFAULT_RESOLUTION.1
                );
                DEFAULT_RESOLUTION
            }
        }
    }
}

/// Parse a "width,height" pair of positive integers.
pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once(',')?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    if w == 0 || h == 0 {
        return None;
    }
    Some((w, h))
}

/// Observational record of the most recently rendered title.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title_id: i64,
    pub updated_at: chrono::NaiveDateTime,
}
