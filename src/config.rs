//! Configuration loading
//!
//! Resolution follows a CLI-arg > environment > platform config dir >
//! compiled-default priority order. Everything in the file is optional;
//! missing keys take defaults, and a missing file is not an error.

use crate::audio::types::ChannelFormat;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AMBIPLAYER_CONFIG";

/// Player configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output device name (None = default device)
    pub device: Option<String>,

    /// Ambisonic channel convention assumed for loaded files
    pub channel_format: ChannelFormat,

    /// Master volume, 0.0..=1.0
    pub volume: f32,

    /// Event bus channel capacity
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            device: None,
            channel_format: ChannelFormat::Acn,
            volume: 1.0,
            event_capacity: 256,
        }
    }
}

impl PlayerConfig {
    /// Load configuration following the priority order:
    /// 1. Explicit path (CLI argument, highest priority)
    /// 2. `AMBIPLAYER_CONFIG` environment variable
    /// 3. `<platform config dir>/ambiplayer/config.toml`
    /// 4. Compiled defaults (no file anywhere is fine)
    ///
    /// A file that exists but does not parse is an error; silently
    /// falling back would mask typos in a file the user explicitly wrote.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a specific TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: PlayerConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Platform config file location (`~/.config/ambiplayer/config.toml`
    /// on Linux and the equivalents elsewhere).
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ambiplayer").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        assert_eq!(config.device, None);
        assert_eq!(config.channel_format, ChannelFormat::Acn);
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.event_capacity, 256);
    }

    #[test]
    fn test_from_file_full() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "device = \"USB Audio\"\nchannel_format = \"fuma\"\nvolume = 0.5\nevent_capacity = 64"
        )
        .unwrap();

        let config = PlayerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.device.as_deref(), Some("USB Audio"));
        assert_eq!(config.channel_format, ChannelFormat::FuMa);
        assert_eq!(config.volume, 0.5);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_from_file_partial_takes_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "volume = 0.25").unwrap();

        let config = PlayerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.volume, 0.25);
        assert_eq!(config.device, None);
        assert_eq!(config.channel_format, ChannelFormat::Acn);
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "volume = \"loud\"").unwrap();

        match PlayerConfig::from_file(file.path()) {
            Err(Error::Config(_)) => {}
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = PlayerConfig::from_file(Path::new("/nonexistent/ambiplayer.toml"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
