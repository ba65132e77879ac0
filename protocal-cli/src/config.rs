//! Global CLI configuration.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use tracing::debug;

/// Optional settings from `~/.config/protocal/config.toml`. Everything
/// here has a flag or environment override; a missing file just means
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Calendar used when neither --calendar-id nor --calendar-name is
    /// given.
    pub default_calendar_id: Option<String>,
    pub default_calendar_name: Option<String>,
    /// Bridge executable override (the PROTOCAL_BRIDGE variable and
    /// PATH lookup apply when unset).
    pub bridge: Option<PathBuf>,
}

impl Config {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("protocal").join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let Some(path) = Self::path() else {
            return Ok(Config::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        debug!(path = %path.display(), "loading config");
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}
