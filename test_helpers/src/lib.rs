//! Testing infrastructure for guide log parsing and analysis.
//!
//! Provides a [`SyntheticLog`] builder that writes guide log text in the same
//! layout the guiding application uses, so tests can describe a log by its
//! content instead of pasting large text blocks, plus workspace path helpers
//! for locating checked-in fixture logs.
//!
//! # Usage
//! ```rust
//! use test_helpers::{GuideRow, SyntheticLog};
//!
//! let text = SyntheticLog::new()
//!     .begin_guiding("2024-03-01 21:00:00")
//!     .pixel_scale(1.5)
//!     .guiding_columns()
//!     .rows((0..12).map(|i| GuideRow::new(i + 1, i as f64)))
//!     .end_guiding()
//!     .build();
//! assert!(text.contains("Guiding Begins at 2024-03-01 21:00:00"));
//! ```

use once_cell::sync::Lazy;
use std::env;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Error types for test infrastructure operations.
#[derive(thiserror::Error, Debug)]
pub enum TestHelperError {
    /// Project root directory could not be located or accessed.
    #[error("Failed to find project root: {0}")]
    ProjectRootNotFound(String),
}

/// Locate the workspace root by walking up from the current directory until a
/// Cargo.toml containing a `[workspace]` section is found.
pub fn find_project_root() -> Result<PathBuf, TestHelperError> {
    let mut current_dir = env::current_dir().map_err(|e| {
        TestHelperError::ProjectRootNotFound(format!("Failed to get current directory: {}", e))
    })?;

    // Search for workspace Cargo.toml
    loop {
        let cargo_toml = current_dir.join("Cargo.toml");
        if cargo_toml.exists() {
            let content = std::fs::read_to_string(&cargo_toml).map_err(|e| {
                TestHelperError::ProjectRootNotFound(format!("Failed to read Cargo.toml: {}", e))
            })?;

            if content.contains("[workspace]") {
                return Ok(current_dir);
            }
        }

        if !current_dir.pop() {
            break;
        }
    }

    Err(TestHelperError::ProjectRootNotFound(
        "Workspace root not found".to_string(),
    ))
}

static PROJECT_ROOT: Lazy<PathBuf> =
    Lazy::new(|| find_project_root().expect("Failed to find project root directory"));

/// Path of a checked-in test file, relative to the workspace root.
pub fn fixture_path<P: AsRef<Path>>(path: P) -> PathBuf {
    PROJECT_ROOT.join(path)
}

/// Column heading line that opens the frame rows of a guiding section.
pub const GUIDING_COLUMNS: &str = "Frame,Time,mount,dx,dy,RARawDistance,DECRawDistance,\
RAGuideDistance,DECGuideDistance,RADuration,RADirection,DECDuration,DECDirection,XStep,YStep,\
StarMass,SNR,ErrorCode,ErrorDescription";

/// Column heading line that opens the steps of a calibration section.
pub const CALIBRATION_COLUMNS: &str = "Direction,Step,dx,dy,x,y,Dist";

/// One frame row of a guiding section.
#[derive(Debug, Clone, PartialEq)]
pub struct GuideRow {
    pub frame: u32,
    pub time: f64,
    pub ao: bool,
    pub dx: f64,
    pub dy: f64,
    pub ra_raw: f64,
    pub dec_raw: f64,
    pub ra_guide: f64,
    pub dec_guide: f64,
    /// Signed RA pulse in ms, East positive
    pub ra_dur: i32,
    /// Signed Dec pulse in ms, North positive
    pub dec_dur: i32,
    pub mass: f64,
    pub snr: f64,
    pub err: i32,
    pub info: Option<String>,
}

impl GuideRow {
    /// A well-formed row with the star exactly on the lock position.
    pub fn new(frame: u32, time: f64) -> Self {
        Self {
            frame,
            time,
            ao: false,
            dx: 0.0,
            dy: 0.0,
            ra_raw: 0.0,
            dec_raw: 0.0,
            ra_guide: 0.0,
            dec_guide: 0.0,
            ra_dur: 0,
            dec_dur: 0,
            mass: 12000.0,
            snr: 40.0,
            err: 0,
            info: None,
        }
    }

    /// Set the mount-axis offsets and use them for the camera offsets too.
    pub fn offset(mut self, ra: f64, dec: f64) -> Self {
        self.ra_raw = ra;
        self.dec_raw = dec;
        self.dx = ra;
        self.dy = dec;
        self
    }

    /// Set the camera-frame offsets only.
    pub fn camera(mut self, dx: f64, dy: f64) -> Self {
        self.dx = dx;
        self.dy = dy;
        self
    }

    /// Set the corrections issued for this frame.
    pub fn guide(mut self, ra_guide: f64, dec_guide: f64, ra_dur: i32, dec_dur: i32) -> Self {
        self.ra_guide = ra_guide;
        self.dec_guide = dec_guide;
        self.ra_dur = ra_dur;
        self.dec_dur = dec_dur;
        self
    }

    /// Mark the guide star as not found.
    pub fn lost(mut self, err: i32, info: Option<&str>) -> Self {
        self.err = err;
        self.mass = 0.0;
        self.info = info.map(str::to_string);
        self
    }

    /// The row as the guiding application writes it.
    pub fn to_line(&self) -> String {
        let mount = if self.ao { "\"AO\"" } else { "\"Mount\"" };
        let mut line = format!("{},{},{}", self.frame, self.time, mount);

        if self.err >= 2 {
            // lost frames carry no measurements
            let _ = write!(line, ",,,,,,,,,,,,,{},{},{}", self.mass, self.snr, self.err);
        } else {
            let (ra_dir, dec_dir) = (
                direction(self.ra_dur, "E", "W"),
                direction(self.dec_dur, "N", "S"),
            );
            let _ = write!(
                line,
                ",{},{},{},{},{},{},{},{},{},{},,,{},{},{}",
                self.dx,
                self.dy,
                self.ra_raw,
                self.dec_raw,
                self.ra_guide,
                self.dec_guide,
                self.ra_dur.abs(),
                ra_dir,
                self.dec_dur.abs(),
                dec_dir,
                self.mass,
                self.snr,
                self.err
            );
        }

        if let Some(info) = &self.info {
            let _ = write!(line, ",\"{}\"", info);
        }
        line
    }
}

fn direction(duration: i32, positive: &'static str, negative: &'static str) -> &'static str {
    match duration.signum() {
        1 => positive,
        -1 => negative,
        _ => "",
    }
}

/// Rows sampled every `dt` seconds with a sinusoidal RA offset.
pub fn sinusoid_rows(n: usize, dt: f64, period: f64, amplitude: f64) -> Vec<GuideRow> {
    (0..n)
        .map(|i| {
            let t = i as f64 * dt;
            let ra = amplitude * (2.0 * std::f64::consts::PI * t / period).sin();
            GuideRow::new(i as u32 + 1, t).offset(ra, 0.0)
        })
        .collect()
}

/// Builder for guide log text.
#[derive(Debug, Clone, Default)]
pub struct SyntheticLog {
    text: String,
}

impl SyntheticLog {
    /// A log starting with the application banner.
    pub fn new() -> Self {
        let mut log = Self::default();
        log.line("PHD2 version 2.6.11, Log version 2.5. Log enabled at 2024-03-01 20:55:00");
        log
    }

    /// An empty log without banner.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a raw line.
    pub fn line(&mut self, line: &str) -> &mut Self {
        self.text.push_str(line);
        self.text.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.line("")
    }

    pub fn begin_guiding(&mut self, date: &str) -> &mut Self {
        self.line(&format!("Guiding Begins at {date}"))
    }

    pub fn pixel_scale(&mut self, scale: f64) -> &mut Self {
        self.line(&format!(
            "Pixel scale = {scale:.2} arc-sec/px, Binning = 1, Focal length = 400 mm"
        ))
    }

    /// Mount header line with calibration rates in px/s and angles in radians.
    pub fn mount(&mut self, x_rate: f64, y_rate: f64, x_angle: f64, y_angle: f64) -> &mut Self {
        self.line(&format!(
            "Mount = Simulator, connected, guiding enabled, xAngle = {x_angle:.3}, \
             xRate = {x_rate:.3}, yAngle = {y_angle:.3}, yRate = {y_rate:.3}, parity = +/+"
        ))
    }

    /// Pointing line carrying the declination in degrees.
    pub fn declination(&mut self, degrees: f64) -> &mut Self {
        self.line(&format!(
            "RA = 5.59 hr, Dec = {degrees:.1} deg, Hour angle = 0.50 hr, Pier side = West"
        ))
    }

    pub fn guiding_columns(&mut self) -> &mut Self {
        self.line(GUIDING_COLUMNS)
    }

    pub fn row(&mut self, row: GuideRow) -> &mut Self {
        self.line(&row.to_line())
    }

    pub fn rows<I: IntoIterator<Item = GuideRow>>(&mut self, rows: I) -> &mut Self {
        for row in rows {
            self.row(row);
        }
        self
    }

    /// An `INFO: ` annotation line.
    pub fn info(&mut self, text: &str) -> &mut Self {
        self.line(&format!("INFO: {text}"))
    }

    pub fn end_guiding(&mut self) -> &mut Self {
        self.line("Guiding Ends at 2024-03-01 22:00:00")
    }

    pub fn begin_calibration(&mut self, date: &str) -> &mut Self {
        self.line(&format!("Calibration Begins at {date}"))
    }

    pub fn calibration_columns(&mut self) -> &mut Self {
        self.line(CALIBRATION_COLUMNS)
    }

    pub fn calibration_step(&mut self, direction: &str, step: u32, dx: f64, dy: f64) -> &mut Self {
        let dist = dx.hypot(dy);
        self.line(&format!(
            "{direction},{step},{dx:.3},{dy:.3},{:.3},{:.3},{dist:.3}",
            512.0 + dx,
            384.0 + dy
        ))
    }

    pub fn end_calibration(&mut self) -> &mut Self {
        self.line("Calibration complete, mount = Simulator.")
    }

    /// A complete guiding section containing `rows`.
    pub fn guiding_session<I: IntoIterator<Item = GuideRow>>(
        &mut self,
        date: &str,
        rows: I,
    ) -> &mut Self {
        self.begin_guiding(date)
            .pixel_scale(1.0)
            .guiding_columns()
            .rows(rows)
            .end_guiding()
            .blank()
    }

    pub fn build(&self) -> String {
        self.text.clone()
    }
}
