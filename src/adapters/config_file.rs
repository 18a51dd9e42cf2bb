//! JSON config file adapter.
//!
//! Implements [`ConfigPort`] on top of a single JSON file.  Missing fields
//! take their defaults, so a deployment file only lists what differs from
//! the reference installation.
//!
//! - Validation runs on load and before save; an invalid config is never
//!   accepted or written.
//! - Writes go to a sibling temp file that is then renamed over the target,
//!   so a power cut never leaves a half-written config behind.

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use log::info;

use crate::app::ports::ConfigPort;
use crate::config::SystemConfig;
use crate::error::ConfigError;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            IoErrorKind::NotFound => ConfigError::NotFound(self.path.display().to_string()),
            _ => ConfigError::Io(format!("{}: {e}", self.path.display())),
        })?;
        let config: SystemConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        info!("Config loaded from {}", self.path.display());
        Ok(config)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json + "\n").map_err(|e| ConfigError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| ConfigError::Io(e.to_string()))?;
        info!("Config written to {}", self.path.display());
        Ok(())
    }
}
