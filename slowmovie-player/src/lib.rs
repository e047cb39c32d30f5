//! # SlowMovie Player
//!
//! Unattended slow-movie playback service: one frame of the active title
//! is extracted, letterboxed for the target display, persisted and shown
//! every `time_per_frame` minutes, so a film plays out over weeks.
//!
//! The scheduler, renderer and policies live here; storage, config and
//! error types come from `slowmovie-common`.

pub mod display;
pub mod quiet_hours;
pub mod render;
pub mod scheduler;
pub mod video;

#[cfg(test)]
pub mod test_utils;
