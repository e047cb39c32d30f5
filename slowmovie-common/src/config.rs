//! Configuration loading and config file resolution
//!
//! The config file is TOML and is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`~/.config/slowmovie/config.toml`),
//!    then `/etc/slowmovie/config.toml` on Linux
//! 4. Compiled defaults (no file at all)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Policy for reconciling the config file against the persisted
/// `settings` row when the two disagree at startup.
///
/// The service is unattended, so there is no interactive prompt; the
/// operator picks the policy once in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcilePolicy {
    /// Overwrite stored settings with the config file values.
    PreferConfig,
    /// Keep stored settings, ignore config file values.
    PreferStored,
    /// Keep stored settings but log each mismatch.
    #[default]
    WarnOnly,
}

/// Display sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// Development mode: no hardware I/O, render reports success.
    #[default]
    None,
    /// Hand the persisted frame artifact to an external command.
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    #[serde(default)]
    pub mode: DisplayMode,
    /// Command invoked with the artifact path appended as the final
    /// argument. Required when `mode = "command"`.
    #[serde(default)]
    pub command: Option<String>,
}

/// Player configuration loaded from TOML.
///
/// `video_root_path` and `resolution` are optional here: the persisted
/// `settings` row is the source of truth, and these are only consulted
/// by the startup reconciliation step.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerConfig {
    #[serde(default)]
    pub video_root_path: Option<String>,
    /// Target display resolution, serialized as "width,height".
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Directory receiving one `title_<id>.jpg` per title.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub reconcile: ReconcilePolicy,
    /// Backoff between polls while no title is active.
    #[serde(default = "default_idle_backoff_secs")]
    pub idle_backoff_secs: u64,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("slowmovie.sqlite")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("frames")
}

fn default_idle_backoff_secs() -> u64 {
    5
}

impl PlayerConfig {
    /// Load configuration following the priority order documented at the
    /// module level. A path given explicitly (CLI or env) must exist; a
    /// merely discovered path is optional and falls back to defaults.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_arg {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("SLOWMOVIE_CONFIG") {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = discover_config_file() {
            return Self::from_file(&path);
        }

        info!("No config file found, using compiled defaults");
        Ok(Self::default())
    }

    /// Parse a config file, failing loudly on unreadable or invalid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let config: PlayerConfig = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid config file {}: {}", path.display(), e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.display.mode == DisplayMode::Command && self.display.command.is_none() {
            return Err(Error::Config(
                "display.mode = \"command\" requires display.command".to_string(),
            ));
        }
        Ok(())
    }
}

/// Look for a config file in the platform config directory, then the
/// system-wide location on Linux.
fn discover_config_file() -> Option<PathBuf> {
    if let Some(path) = dirs::config_dir().map(|d| d.join("slowmovie").join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/slowmovie/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PlayerConfig::default();
        assert_eq!(config.database_path, PathBuf::from("slowmovie.sqlite"));
        assert_eq!(config.output_dir, PathBuf::from("frames"));
        assert_eq!(config.idle_backoff_secs, 5);
        assert_eq!(config.reconcile, ReconcilePolicy::WarnOnly);
        assert_eq!(config.display.mode, DisplayMode::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
            video_root_path = "/srv/videos"
            resolution = "800,480"
            database_path = "/var/lib/slowmovie/slowmovie.sqlite"
            output_dir = "/var/lib/slowmovie/frames"
            reconcile = "prefer-config"
            idle_backoff_secs = 10

            [display]
            mode = "command"
            command = "/usr/local/bin/eink-show"
        "#;
        let config: PlayerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.video_root_path.as_deref(), Some("/srv/videos"));
        assert_eq!(config.resolution.as_deref(), Some("800,480"));
        assert_eq!(config.reconcile, ReconcilePolicy::PreferConfig);
        assert_eq!(config.idle_backoff_secs, 10);
        assert_eq!(config.display.mode, DisplayMode::Command);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn command_mode_requires_command() {
        let toml_str = r#"
            [display]
            mode = "command"
        "#;
        let config: PlayerConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = PlayerConfig::from_file(Path::new("/nonexistent/slowmovie.toml"));
        assert!(result.is_err());
    }
}
