//! Guide log parsing and tracking quality analysis.
//!
//! Reads the text logs written by an autoguiding application, turns them into
//! typed guiding sessions and calibration runs, and derives tracking
//! statistics and periodic error spectra from them.

pub mod analysis;
#[cfg(feature = "config-storage")]
pub mod config_storage;
pub mod inclusion;
pub mod model;
pub mod parser;
pub mod record;
pub mod repair;
pub mod settings;
pub mod stats;

pub use analysis::{
    can_analyze, AnalysisError, AnalysisResult, PeriodicErrorAnalyzer, MIN_ANALYSIS_FRAMES,
};
#[cfg(feature = "config-storage")]
pub use config_storage::ConfigStorage;
pub use inclusion::{
    exclude_settling_by_server, exclude_settling_parametric, include_all, reset_inclusion,
};
pub use model::{
    star_was_found, AxisLimits, CalDirection, Calibration, CalibrationStep, Device, DeviceParams,
    FrameRecord, GuideLog, GuideSession, InfoEntry, Section, SessionStats,
};
pub use parser::{parse, parse_file, parse_str, LogError, LogParser};
pub use record::DecodeError;
pub use repair::repair_timestamps;
pub use settings::{ExclusionSettings, ViewerSettings};
pub use stats::compute_stats;
