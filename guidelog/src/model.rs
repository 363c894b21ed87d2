//! Data model for parsed guide logs.
//!
//! A [`GuideLog`] owns every guiding session and calibration run found in one
//! log file, plus a [`Section`] index that records the order they appeared in.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;

/// Which corrector produced a frame or was calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// The primary mount
    #[default]
    Mount,
    /// The secondary corrector (adaptive optics / step guider)
    Ao,
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Mount => write!(f, "Mount"),
            Device::Ao => write!(f, "AO"),
        }
    }
}

/// Error codes 0 (ok) and 1 (saturated) still locate the guide star.
pub fn star_was_found(err: i32) -> bool {
    err == 0 || err == 1
}

/// One guide camera frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameRecord {
    /// Frame number as written in the log
    pub frame: u32,
    /// Seconds since the session started
    pub time: f64,
    /// Device that was active for this frame
    pub device: Device,
    /// Camera-frame offset in pixels
    pub dx: f64,
    pub dy: f64,
    /// Offset along the mount RA axis in pixels
    pub ra_raw: f64,
    /// Offset along the mount Dec axis in pixels
    pub dec_raw: f64,
    /// RA correction requested by the guide algorithm in pixels
    pub ra_guide: f64,
    /// Dec correction requested by the guide algorithm in pixels
    pub dec_guide: f64,
    /// Signed RA pulse duration in ms (or AO steps), East positive
    pub ra_dur: i32,
    /// Signed Dec pulse duration in ms (or AO steps), North positive
    pub dec_dur: i32,
    /// Star mass
    pub mass: f64,
    /// Signal-to-noise ratio
    pub snr: f64,
    /// Star-finding error code
    pub err: i32,
    /// Free-text annotation from the log row
    pub info: String,
    /// Whether this frame takes part in statistics
    pub included: bool,
    /// Whether closed-loop corrections were being issued for this frame
    pub guiding: bool,
}

impl FrameRecord {
    pub fn star_was_found(&self) -> bool {
        star_was_found(self.err)
    }

    /// Included and the star was actually located.
    pub fn is_eligible(&self) -> bool {
        self.included && self.star_was_found()
    }

    /// Camera-frame distance from the lock position in pixels.
    pub fn distance(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

/// An annotation anchored before the frame at index `idx`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoEntry {
    /// Index of the frame following the event
    pub idx: usize,
    /// How many times the event was seen back to back
    pub repeats: u32,
    pub info: String,
}

/// Direction of a calibration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalDirection {
    West,
    East,
    Backlash,
    North,
    South,
}

impl CalDirection {
    /// Decode a calibration direction word.
    ///
    /// Returns the direction and the device whose vocabulary the word belongs
    /// to: `Left` and `Up` are only written for the secondary corrector.
    pub fn from_word(word: &str) -> Option<(CalDirection, Device)> {
        match word {
            "West" => Some((CalDirection::West, Device::Mount)),
            "East" => Some((CalDirection::East, Device::Mount)),
            "Backlash" => Some((CalDirection::Backlash, Device::Mount)),
            "North" => Some((CalDirection::North, Device::Mount)),
            "South" => Some((CalDirection::South, Device::Mount)),
            "Left" => Some((CalDirection::West, Device::Ao)),
            "Up" => Some((CalDirection::North, Device::Ao)),
            _ => None,
        }
    }
}

/// One calibration step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStep {
    pub direction: CalDirection,
    pub step: u32,
    /// Star displacement from the starting position in pixels
    pub dx: f64,
    pub dy: f64,
}

/// Guide algorithm limits for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisLimits {
    /// Minimum move in pixels
    pub min_move: f64,
    /// Maximum pulse duration in ms
    pub max_duration: f64,
}

/// Calibration and limits of one device as reported in a session header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceParams {
    /// Rates in pixels per second
    pub x_rate: f64,
    pub y_rate: f64,
    /// Axis angles as written in the session header
    pub x_angle: f64,
    pub y_angle: f64,
    pub x_limits: AxisLimits,
    pub y_limits: AxisLimits,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            x_rate: 1.0,
            y_rate: 1.0,
            x_angle: 0.0,
            y_angle: FRAC_PI_2,
            x_limits: AxisLimits::default(),
            y_limits: AxisLimits::default(),
        }
    }
}

/// Derived statistics of a guiding session. Offsets are in pixels, drift
/// rates in pixels per minute and the polar alignment error in arc-minutes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SessionStats {
    pub rms_ra: f64,
    pub rms_dec: f64,
    pub peak_ra: f64,
    pub peak_dec: f64,
    pub avg_ra: f64,
    pub avg_dec: f64,
    /// Angle of the scatter's major axis, radians
    pub theta: f64,
    /// Standard deviations along the rotated axes
    pub lx: f64,
    pub ly: f64,
    /// (major - minor) / (major + minor), 1 when fully degenerate
    pub elongation: f64,
    pub drift_ra: f64,
    pub drift_dec: f64,
    pub pa_error: f64,
    /// Number of frames the statistics were computed from
    pub count: usize,
}

/// One guiding run.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideSession {
    /// Start date text as written after the section marker
    pub date: String,
    pub starts: Option<NaiveDateTime>,
    /// Header lines, verbatim minus trailing whitespace
    pub header: Vec<String>,
    /// Time of the last frame in seconds
    pub duration: f64,
    /// Arc-seconds per pixel
    pub pixel_scale: f64,
    /// Declination in radians
    pub declination: f64,
    pub mount: DeviceParams,
    pub ao: DeviceParams,
    pub entries: Vec<FrameRecord>,
    pub infos: Vec<InfoEntry>,
    pub(crate) stats: Option<SessionStats>,
}

impl GuideSession {
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            starts: parse_start_time(date),
            header: Vec::new(),
            duration: 0.0,
            pixel_scale: 1.0,
            declination: 0.0,
            mount: DeviceParams::default(),
            ao: DeviceParams::default(),
            entries: Vec::new(),
            infos: Vec::new(),
            stats: None,
        }
    }

    /// Statistics from the last [`GuideSession::calc_stats`] call, or `None`
    /// if they were never computed or the inclusion flags changed since.
    pub fn stats(&self) -> Option<&SessionStats> {
        self.stats.as_ref()
    }

    pub(crate) fn invalidate_stats(&mut self) {
        self.stats = None;
    }

    pub fn device(&self, device: Device) -> &DeviceParams {
        match device {
            Device::Mount => &self.mount,
            Device::Ao => &self.ao,
        }
    }

    pub fn device_mut(&mut self, device: Device) -> &mut DeviceParams {
        match device {
            Device::Mount => &mut self.mount,
            Device::Ao => &mut self.ao,
        }
    }

    /// Convert a pixel quantity to arc-seconds.
    pub fn to_arcsec(&self, pixels: f64) -> f64 {
        pixels * self.pixel_scale
    }

    /// Index bounds `[begin, end)` of the unguided run containing `pos`.
    ///
    /// The run extends in both directions until a guided frame or the end of
    /// the session. Returns `None` if `pos` is out of range or guided.
    pub fn unguided_bounds(&self, pos: usize) -> Option<(usize, usize)> {
        let entry = self.entries.get(pos)?;
        if entry.guiding {
            return None;
        }

        let begin = self.entries[..pos]
            .iter()
            .rposition(|e| e.guiding)
            .map_or(0, |p| p + 1);
        let end = self.entries[pos + 1..]
            .iter()
            .position(|e| e.guiding)
            .map_or(self.entries.len(), |p| pos + 1 + p);

        Some((begin, end))
    }
}

/// One calibration run.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub date: String,
    pub starts: Option<NaiveDateTime>,
    pub header: Vec<String>,
    /// Device being calibrated
    pub device: Device,
    pub steps: Vec<CalibrationStep>,
}

impl Calibration {
    pub fn new(date: &str) -> Self {
        Self {
            date: date.to_string(),
            starts: parse_start_time(date),
            header: Vec::new(),
            device: Device::Mount,
            steps: Vec::new(),
        }
    }
}

/// Location of a section inside [`GuideLog`], in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Index into [`GuideLog::sessions`]
    Guiding(usize),
    /// Index into [`GuideLog::calibrations`]
    Calibration(usize),
}

/// Everything parsed from one guide log.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuideLog {
    /// Version of the application that wrote the log, empty if unknown
    pub version: String,
    pub sessions: Vec<GuideSession>,
    pub calibrations: Vec<Calibration>,
    pub sections: Vec<Section>,
}

impl GuideLog {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

fn parse_start_time(date: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    // logs may carry trailing text after the seconds field
    let stamp = date.get(..19).unwrap_or(date);
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S").ok()
}
