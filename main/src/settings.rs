use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// User preferences persisted between runs. They only seed defaults.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Settings {
    pub username: Option<String>,
    pub server_port: Option<u16>,
}

impl Settings {
    /// `<config dir>/facingtime/settings.json`, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("facingtime").join("settings.json"))
    }

    /// Reads the settings, treating a missing file as empty settings.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        log::info!("Saved settings to {}", path.display());
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Error in file system")]
    FileSystem(#[from] std::io::Error),

    #[error("Settings file is not valid JSON")]
    Json(#[from] serde_json::Error),
}
