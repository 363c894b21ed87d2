//! User-adjustable analysis settings.

use serde::{Deserialize, Serialize};

use crate::inclusion::{exclude_settling_by_server, exclude_settling_parametric, reset_inclusion};
use crate::model::GuideSession;

/// How settling periods are removed from statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionSettings {
    /// Exclude spans the guiding application reported as settling
    pub exclude_by_server: bool,
    /// Exclude dither settling detected from frame distances
    pub exclude_parametric: bool,
    /// Distance below which a frame counts as settled, pixels
    pub settle_pixels: f64,
    /// How long frames must stay settled, seconds
    pub settle_seconds: f64,
}

impl Default for ExclusionSettings {
    fn default() -> Self {
        Self {
            exclude_by_server: true,
            exclude_parametric: false,
            settle_pixels: 1.5,
            settle_seconds: 10.0,
        }
    }
}

impl ExclusionSettings {
    /// Recompute every frame's inclusion from scratch.
    ///
    /// Frames whose star was found are re-included, then the enabled
    /// exclusions run, server spans first. Returns the number of frames the
    /// exclusions removed.
    pub fn apply(&self, session: &mut GuideSession) -> usize {
        reset_inclusion(session);

        let mut excluded = 0;
        if self.exclude_by_server {
            excluded += exclude_settling_by_server(session);
        }
        if self.exclude_parametric {
            excluded +=
                exclude_settling_parametric(session, self.settle_pixels, self.settle_seconds);
        }
        excluded
    }
}

/// Persisted viewer settings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub exclusion: ExclusionSettings,
    /// Add RA corrections back before periodic error analysis
    pub undo_ra_corrections: bool,
}

impl ViewerSettings {
    /// Save to JSON file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
