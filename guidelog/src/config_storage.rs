//! Configuration storage for viewer settings.
//!
//! All config is stored in ~/.guidelog/ by default.

use crate::settings::ViewerSettings;
use std::path::{Path, PathBuf};

/// Configuration storage manager for persisted settings.
#[derive(Debug, Clone)]
pub struct ConfigStorage {
    /// Root directory for all configuration (e.g., ~/.guidelog)
    root_path: PathBuf,
}

impl ConfigStorage {
    /// Create a new config storage with default path (~/.guidelog)
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        let root_path = PathBuf::from(home).join(".guidelog");
        Ok(Self { root_path })
    }

    /// Create a new config storage with custom root path
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Get the root configuration path
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn settings_path(&self) -> PathBuf {
        self.root_path.join("settings.json")
    }

    /// Get the stored viewer settings.
    ///
    /// Returns None if no settings were saved.
    /// Returns Some(Err) if the file exists but cannot be loaded.
    pub fn get_settings(&self) -> Option<Result<ViewerSettings, std::io::Error>> {
        let path = self.settings_path();

        if !path.exists() {
            return None;
        }

        Some(ViewerSettings::load_from_file(&path))
    }

    /// Stored settings, falling back to defaults when absent or unreadable.
    pub fn settings_or_default(&self) -> ViewerSettings {
        match self.get_settings() {
            Some(Ok(settings)) => settings,
            Some(Err(e)) => {
                log::warn!(
                    "ignoring unreadable settings in {}: {}",
                    self.root_path.display(),
                    e
                );
                ViewerSettings::default()
            }
            None => ViewerSettings::default(),
        }
    }

    /// Save the viewer settings.
    ///
    /// Creates the config directory if it doesn't exist.
    /// Returns the path where the settings were saved.
    pub fn save_settings(&self, settings: &ViewerSettings) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root_path)?;

        let path = self.settings_path();
        settings.save_to_file(&path)?;
        Ok(path)
    }

    /// Delete the stored settings.
    ///
    /// Returns Ok(true) if the file was deleted, Ok(false) if it didn't exist.
    pub fn delete_settings(&self) -> std::io::Result<bool> {
        let path = self.settings_path();

        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(path)?;
        Ok(true)
    }
}

impl Default for ConfigStorage {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::with_path(PathBuf::from(".guidelog")))
    }
}
