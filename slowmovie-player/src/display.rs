//! Display sink abstraction
//!
//! The physical display (e-ink panel or whatever else) stays outside the
//! core: the sink is constructed once at startup from configuration and
//! passed into the scheduler explicitly. Development and tests use the
//! no-op sink, which performs no hardware I/O but still reports success.

use image::RgbImage;
use slowmovie_common::config::{DisplayConfig, DisplayMode};
use slowmovie_common::{Error, Result};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

/// Paints a rendered frame onto the physical display.
///
/// Implementations receive both the in-memory image and the path of the
/// already-persisted artifact; hardware backends driven by external
/// tooling typically use the path.
pub trait DisplaySink: Send + Sync {
    fn render(&self, image: &RgbImage, artifact: &Path) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Development sink: no hardware I/O, always succeeds.
pub struct NoopDisplay;

impl DisplaySink for NoopDisplay {
    fn render(&self, image: &RgbImage, artifact: &Path) -> Result<()> {
        debug!(
            width = image.width(),
            height = image.height(),
            artifact = %artifact.display(),
            "Noop display: skipping hardware output"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// Hands the persisted artifact to an external command, with the artifact
/// path appended as the final argument.
pub struct CommandDisplay {
    program: String,
    args: Vec<String>,
}

impl CommandDisplay {
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("display.command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl DisplaySink for CommandDisplay {
    fn render(&self, _image: &RgbImage, artifact: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(artifact)
            .status()
            .map_err(|e| Error::Display(format!("failed to run {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(Error::Display(format!(
                "{} exited with {}",
                self.program, status
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "command"
    }
}

/// Construct the sink selected by configuration.
pub fn build_display_sink(config: &DisplayConfig) -> Result<Arc<dyn DisplaySink>> {
    match config.mode {
        DisplayMode::None => Ok(Arc::new(NoopDisplay)),
        DisplayMode::Command => {
            let command = config
                .command
                .as_deref()
                .ok_or_else(|| Error::Config("display.command is required".to_string()))?;
            Ok(Arc::new(CommandDisplay::new(command)?))
        }
    }
}
