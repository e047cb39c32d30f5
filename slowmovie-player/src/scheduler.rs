//! Playback scheduler - the poll / gate / render / advance / sleep loop
//!
//! One sequential worker: each tick re-reads the active title and
//! settings fresh from the store (the management surface edits both at
//! any time), decides whether quiet hours suppress rendering, renders,
//! then persists the advanced cursor. Nothing - handles, frames, rows -
//! is held across the sleep between ticks.

use crate::quiet_hours;
use crate::render::FrameRenderer;
use chrono::Timelike;
use slowmovie_common::db::{CatalogStore, NowPlayingTracker};
use slowmovie_common::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Idle polls between "no active title" log lines (5 s backoff x 12 = ~60 s).
const IDLE_LOG_EVERY: u32 = 12;

/// Outcome of one scheduler tick, carrying the wait before the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// No active title; re-poll after the short idle backoff.
    Idle,
    /// Quiet hours suppress rendering; nothing was touched.
    Gated { title_id: i64, wait: Duration },
    /// Frame rendered and cursor persisted.
    Rendered {
        title_id: i64,
        frame: i64,
        next_frame: i64,
        wait: Duration,
    },
    /// Open/decode failed; same cursor, retried at normal cadence.
    RenderFailed {
        title_id: i64,
        frame: i64,
        wait: Duration,
    },
}

pub struct PlaybackScheduler {
    catalog: CatalogStore,
    now_playing: NowPlayingTracker,
    renderer: Arc<FrameRenderer>,
    idle_backoff: Duration,
}

impl PlaybackScheduler {
    pub fn new(
        catalog: CatalogStore,
        now_playing: NowPlayingTracker,
        renderer: Arc<FrameRenderer>,
        idle_backoff: Duration,
    ) -> Self {
        Self {
            catalog,
            now_playing,
            renderer,
            idle_backoff,
        }
    }

    /// Run until the process is stopped. There is no terminal state; a
    /// failed tick is logged and retried, never fatal.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Playback scheduler started (idle backoff {:?})",
            self.idle_backoff
        );

        let mut idle_streak: u32 = 0;

        loop {
            let wait = match self.tick().await {
                Ok(Tick::Idle) => {
                    if idle_streak % IDLE_LOG_EVERY == 0 {
                        info!("No active title; polling every {:?}", self.idle_backoff);
                    }
                    idle_streak += 1;
                    self.idle_backoff
                }
                Ok(Tick::Gated { title_id, wait }) => {
                    idle_streak = 0;
                    info!(
                        title_id,
                        "Quiet hours active; next check in {:?}", wait
                    );
                    wait
                }
                Ok(Tick::Rendered {
                    title_id,
                    frame,
                    next_frame,
                    wait,
                }) => {
                    idle_streak = 0;
                    debug!(title_id, frame, next_frame, "Tick complete; sleeping {:?}", wait);
                    wait
                }
                Ok(Tick::RenderFailed {
                    title_id,
                    frame,
                    wait,
                }) => {
                    idle_streak = 0;
                    warn!(
                        title_id,
                        frame, "Render failed; retrying same frame in {:?}", wait
                    );
                    wait
                }
                Err(e) => {
                    // Store failures land here. The cursor is re-read
                    // next tick, so the worst case is a repeated frame.
                    idle_streak = 0;
                    error!("Scheduler tick failed: {e}");
                    self.idle_backoff
                }
            };

            sleep(wait).await;
        }
    }

    /// One tick against the current wall-clock hour.
    pub async fn tick(&self) -> Result<Tick> {
        self.tick_at_hour(chrono::Local::now().hour()).await
    }

    async fn tick_at_hour(&self, current_hour: u32) -> Result<Tick> {
        // Fresh snapshots every tick; the management surface may have
        // changed either since the last one
        let settings = self.catalog.get_settings().await?;
        let Some(title) = self.catalog.get_active_title().await? else {
            return Ok(Tick::Idle);
        };

        let wait = title.tick_interval();

        if quiet_hours::title_suppressed(&title, current_hour) {
            // No render, no cursor change, no now-playing update
            return Ok(Tick::Gated {
                title_id: title.id,
                wait,
            });
        }

        let renderer = self.renderer.clone();
        let render_title = title.clone();
        let render_settings = settings.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            renderer.render_title(&render_title, &render_settings)
        })
        .await
        .map_err(|e| Error::Internal(format!("render task panicked: {e}")))?;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    title_id = title.id,
                    frame = title.current_frame,
                    "Failed to render frame: {e}"
                );
                return Ok(Tick::RenderFailed {
                    title_id: title.id,
                    frame: title.current_frame,
                    wait,
                });
            }
        };

        // Looping playback: wrap instead of running past the end, even
        // when skip_frames overshoots the boundary
        let mut next_frame = outcome.rendered_frame + title.skip();
        if title.total_frames > 0 && next_frame >= title.total_frames {
            info!(title_id = title.id, "Reached end of title, wrapping to frame 0");
            next_frame = 0;
        }

        self.catalog.advance_cursor(title.id, next_frame).await?;
        self.now_playing.set(title.id).await?;

        Ok(Tick::Rendered {
            title_id: title.id,
            frame: outcome.rendered_frame,
            next_frame,
            wait,
        })
    }
}
