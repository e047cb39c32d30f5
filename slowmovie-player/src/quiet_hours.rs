//! Quiet-hours suppression policy
//!
//! Pure function of the title's configured window and the current
//! wall-clock hour. The window is half-open and may wrap past midnight
//! (start 22, end 7 suppresses 22:00-06:59). Malformed bounds degrade to
//! "not suppressed" with a warning; they never stop the loop.

use slowmovie_common::db::Title;
use tracing::warn;

/// Whether rendering is suppressed at `current_hour` (0-23).
pub fn is_suppressed(
    use_quiet_hours: bool,
    quiet_start_hour: i64,
    quiet_end_hour: i64,
    current_hour: u32,
) -> bool {
    if !use_quiet_hours {
        return false;
    }

    if !(0..=23).contains(&quiet_start_hour) || !(0..=23).contains(&quiet_end_hour) {
        warn!(
            quiet_start_hour,
            quiet_end_hour, "Quiet-hours bounds out of 0-23 range, not suppressing"
        );
        return false;
    }

    let hour = i64::from(current_hour);
    if quiet_start_hour < quiet_end_hour {
        quiet_start_hour <= hour && hour < quiet_end_hour
    } else {
        // Window wraps midnight
        hour >= quiet_start_hour || hour < quiet_end_hour
    }
}

/// Policy applied to a title snapshot.
pub fn title_suppressed(title: &Title, current_hour: u32) -> bool {
    is_suppressed(
        title.use_quiet_hours,
        title.quiet_start_hour,
        title.quiet_end_hour,
        current_hour,
    )
}
