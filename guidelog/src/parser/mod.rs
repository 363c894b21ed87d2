//! Line-oriented state machine turning guide log text into a [`GuideLog`].
//!
//! The log is a sequence of sections. Each guiding section starts with a
//! `Guiding Begins at <date>` marker, followed by free-form header lines, a
//! column heading, CSV frame rows interleaved with `INFO: ` annotations, and a
//! blank line or `Guiding Ends` marker. Calibration sections follow the same
//! shape with their own markers. Lines that match nothing expected in the
//! current state are kept as header text or skipped; parsing never fails on
//! content, only on I/O.

pub(crate) mod info;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;

use crate::model::{Calibration, Device, DeviceParams, GuideLog, GuideSession, Section};
use crate::record::{decode_calibration, decode_frame};
use crate::repair::repair_timestamps;

const VERSION_PREFIX: &str = "PHD2 version ";
const LOG_VERSION: &str = ", Log version ";
const GUIDING_BEGINS: &str = "Guiding Begins at ";
const GUIDING_HEADING: &str = "Frame,Time,mount";
const MOUNT_KEY: &str = "Mount = ";
const AO_KEY: &str = "AO = ";
const PX_SCALE: &str = "Pixel scale = ";
const XALGO: &str = "X guide algorithm = ";
const YALGO: &str = "Y guide algorithm = ";
const MIN_MOVE: &str = "Minimum move = ";
const MAX_RA_DURATION: &str = "Max RA duration = ";
const MAX_DEC_DURATION: &str = "Max DEC duration = ";
const DECLINATION: &str = "Dec = ";
const GUIDING_DISABLED: &str = "guiding disabled";
const GUIDING_ENDS: &str = "Guiding Ends";
const INFO_KEY: &str = "INFO: ";
const CALIBRATION_BEGINS: &str = "Calibration Begins at ";
const CALIBRATION_HEADING: &str = "Direction,Step,dx,dy,x,y,Dist";
const CALIBRATION_ENDS: &str = "Calibration complete";
const CALIBRATION_WORDS: [&str; 7] = ["West", "East", "Backlash", "North", "South", "Left", "Up"];

const FRAME_DROPPED: &str = "Frame dropped";

/// Number of input lines between progress callbacks.
pub const PROGRESS_INTERVAL: usize = 200;

/// Failure reading the log stream.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("failed to read guide log: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Skip,
    GuidingHeader,
    Guiding,
    CalibrationHeader,
    Calibrating,
}

/// Which device the algorithm/limit header lines currently describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderDevice {
    Global,
    Mount,
    Ao,
}

impl HeaderDevice {
    fn device(self) -> Device {
        match self {
            HeaderDevice::Ao => Device::Ao,
            HeaderDevice::Global | HeaderDevice::Mount => Device::Mount,
        }
    }
}

/// Parses guide logs, optionally reporting progress to the caller.
///
/// ```
/// use guidelog::LogParser;
///
/// let mut lines = 0;
/// let log = LogParser::new()
///     .with_progress(|n| lines = n)
///     .parse_str("PHD2 version 2.6.11, Log version 2.5\n");
/// assert_eq!(log.version, "2.6.11");
/// ```
#[derive(Default)]
pub struct LogParser<'a> {
    progress: Option<Box<dyn FnMut(usize) + 'a>>,
}

impl<'a> LogParser<'a> {
    pub fn new() -> Self {
        Self { progress: None }
    }

    /// Call `callback` with the running line count every
    /// [`PROGRESS_INTERVAL`] lines.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(usize) + 'a,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Parse a whole log from a buffered reader.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; only read errors fail.
    pub fn parse<R: BufRead>(&mut self, mut reader: R) -> Result<GuideLog, LogError> {
        let mut machine = Machine::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(['\n', '\r']);
            self.feed(&mut machine, line);
        }

        Ok(machine.finish())
    }

    /// Parse a log held in memory.
    pub fn parse_str(&mut self, text: &str) -> GuideLog {
        let mut machine = Machine::new();
        for line in text.lines() {
            self.feed(&mut machine, line);
        }
        machine.finish()
    }

    fn feed(&mut self, machine: &mut Machine, line: &str) {
        machine.line_no += 1;
        if machine.line_no % PROGRESS_INTERVAL == 0 {
            if let Some(progress) = self.progress.as_mut() {
                progress(machine.line_no);
            }
        }
        machine.process(line);
    }
}

/// Parse a log from a buffered reader.
pub fn parse<R: BufRead>(reader: R) -> Result<GuideLog, LogError> {
    LogParser::new().parse(reader)
}

/// Parse a log held in memory.
pub fn parse_str(text: &str) -> GuideLog {
    LogParser::new().parse_str(text)
}

/// Open and parse a log file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<GuideLog, LogError> {
    let file = File::open(path.as_ref())?;
    debug!("parsing guide log {}", path.as_ref().display());
    parse(BufReader::new(file))
}

struct Machine {
    log: GuideLog,
    state: State,
    header_device: HeaderDevice,
    /// Guiding flag applied to the next decoded frame
    guiding: bool,
    line_no: usize,
}

impl Machine {
    fn new() -> Self {
        Self {
            log: GuideLog::default(),
            state: State::Skip,
            header_device: HeaderDevice::Global,
            guiding: true,
            line_no: 0,
        }
    }

    fn process(&mut self, line: &str) {
        if self.section_start(line) {
            return;
        }
        match self.state {
            State::Skip => self.skip(line),
            State::GuidingHeader => self.guiding_header(line),
            State::Guiding => self.guiding_row(line),
            State::CalibrationHeader => self.calibration_header(line),
            State::Calibrating => self.calibrating(line),
        }
    }

    fn finish(mut self) -> GuideLog {
        self.close_section();
        info!(
            "parsed guide log: {} guiding sessions, {} calibrations",
            self.log.sessions.len(),
            self.log.calibrations.len()
        );
        self.log
    }

    /// Finalize whichever section is open and return to `Skip`.
    fn close_section(&mut self) {
        if matches!(self.state, State::GuidingHeader | State::Guiding) {
            let index = self.log.sessions.len().saturating_sub(1);
            if let Some(session) = self.log.sessions.last_mut() {
                finalize_session(session, index);
            }
        }
        self.state = State::Skip;
    }

    /// Open a new section if `line` is a section marker.
    ///
    /// A marker seen inside another section closes that section first. The
    /// marker line itself becomes the first header line of the new section.
    fn section_start(&mut self, line: &str) -> bool {
        if let Some(date) = line.strip_prefix(GUIDING_BEGINS) {
            self.close_section();
            let mut session = GuideSession::new(date);
            session.header.push(line.trim_end().to_string());
            self.log.sessions.push(session);
            self.log
                .sections
                .push(Section::Guiding(self.log.sessions.len() - 1));
            self.state = State::GuidingHeader;
            self.header_device = HeaderDevice::Global;
            self.guiding = true;
            return true;
        }

        if let Some(date) = line.strip_prefix(CALIBRATION_BEGINS) {
            self.close_section();
            let mut cal = Calibration::new(date);
            cal.header.push(line.trim_end().to_string());
            self.log.calibrations.push(cal);
            self.log
                .sections
                .push(Section::Calibration(self.log.calibrations.len() - 1));
            self.state = State::CalibrationHeader;
            return true;
        }

        false
    }

    fn skip(&mut self, line: &str) {
        if let Some(rest) = line.strip_prefix(VERSION_PREFIX) {
            let end = rest
                .find(LOG_VERSION)
                .or_else(|| rest.find(char::is_whitespace))
                .unwrap_or(rest.len());
            self.log.version = rest[..end].to_string();
        }
    }

    fn guiding_header(&mut self, line: &str) {
        if line.starts_with(GUIDING_HEADING) {
            self.state = State::Guiding;
            return;
        }
        let Some(session) = self.log.sessions.last_mut() else {
            self.state = State::Skip;
            return;
        };

        if line.starts_with(MOUNT_KEY) {
            parse_device(line, &mut session.mount);
            self.header_device = HeaderDevice::Mount;
            if line.contains(GUIDING_DISABLED) {
                self.guiding = false;
            }
        } else if line.starts_with(AO_KEY) {
            parse_device(line, &mut session.ao);
            self.header_device = HeaderDevice::Ao;
        } else if line.starts_with(PX_SCALE) {
            session.pixel_scale = value_after(line, PX_SCALE).unwrap_or(1.0);
        } else if line.starts_with(XALGO) {
            let params = session.device_mut(self.header_device.device());
            params.x_limits.min_move = value_after(line, MIN_MOVE).unwrap_or(0.0);
        } else if line.starts_with(YALGO) {
            let params = session.device_mut(self.header_device.device());
            params.y_limits.min_move = value_after(line, MIN_MOVE).unwrap_or(0.0);
        } else if line.contains(MAX_RA_DURATION) {
            let params = session.device_mut(self.header_device.device());
            params.x_limits.max_duration = value_after(line, MAX_RA_DURATION).unwrap_or(0.0);
            params.y_limits.max_duration = value_after(line, MAX_DEC_DURATION).unwrap_or(0.0);
        } else if line.contains(DECLINATION) {
            if let Some(dec) = value_after(line, DECLINATION) {
                session.declination = dec.to_radians();
            }
        }

        session.header.push(line.trim_end().to_string());
    }

    fn guiding_row(&mut self, line: &str) {
        if is_blank(line) || line.starts_with(GUIDING_ENDS) {
            self.close_section();
            return;
        }

        let line_no = self.line_no;
        let Some(session) = self.log.sessions.last_mut() else {
            self.state = State::Skip;
            return;
        };

        if line.as_bytes().first().map_or(false, u8::is_ascii_digit) {
            let mut entry = match decode_frame(line) {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("line {}: skipping guide row: {}", line_no, err);
                    return;
                }
            };
            entry.guiding = self.guiding;
            if !entry.star_was_found() {
                entry.included = false;
                if entry.info.is_empty() {
                    entry.info = FRAME_DROPPED.to_string();
                }
                info::add_info(session, &entry.info);
            }
            session.entries.push(entry);
        } else if let Some(text) = line.strip_prefix(INFO_KEY) {
            if let Some(guiding) = info::guiding_toggle(text) {
                self.guiding = guiding;
            }
            info::add_info(session, text);
        } else {
            debug!("line {}: ignoring unrecognised guiding line", line_no);
        }
    }

    fn calibration_header(&mut self, line: &str) {
        if line.starts_with(CALIBRATION_HEADING) {
            self.state = State::Calibrating;
            return;
        }
        if let Some(cal) = self.log.calibrations.last_mut() {
            cal.header.push(line.trim_end().to_string());
        }
    }

    fn calibrating(&mut self, line: &str) {
        if is_blank(line) || line.starts_with(CALIBRATION_ENDS) {
            self.close_section();
            return;
        }

        let line_no = self.line_no;
        let Some(cal) = self.log.calibrations.last_mut() else {
            self.state = State::Skip;
            return;
        };

        let word = line.split(',').next().unwrap_or_default();
        if line.contains(',') && CALIBRATION_WORDS.contains(&word) {
            match decode_calibration(line) {
                Ok((step, device)) => {
                    if device == Device::Ao {
                        cal.device = Device::Ao;
                    }
                    cal.steps.push(step);
                }
                Err(err) => debug!("line {}: skipping calibration row: {}", line_no, err),
            }
        } else {
            cal.header.push(line.trim_end().to_string());
        }
    }
}

/// Repair timestamps and record the duration of a completed session.
fn finalize_session(session: &mut GuideSession, index: usize) {
    let repairs = repair_timestamps(session);
    if repairs > 0 {
        warn!(
            "session {}: repaired {} backwards timestamp jumps",
            index, repairs
        );
    }
    if let Some(last) = session.entries.last() {
        session.duration = last.time;
    }
}

/// Rate and angle keys of a `Mount = ` or `AO = ` header line.
fn parse_device(line: &str, params: &mut DeviceParams) {
    params.x_angle = value_after(line, ", xAngle = ").unwrap_or(0.0);
    params.x_rate = value_after(line, ", xRate = ").unwrap_or(1.0);
    params.y_angle = value_after(line, ", yAngle = ").unwrap_or(std::f64::consts::FRAC_PI_2);
    params.y_rate = value_after(line, ", yRate = ").unwrap_or(1.0);

    // older logs wrote rates in px/ms
    if params.x_rate < 0.05 {
        params.x_rate *= 1000.0;
    }
    if params.y_rate < 0.05 {
        params.y_rate *= 1000.0;
    }
}

/// Number immediately following `key` in `line`.
fn value_after(line: &str, key: &str) -> Option<f64> {
    let pos = line.find(key)?;
    leading_number(&line[pos + key.len()..])
}

/// Longest prefix of `text` that parses as a number, ignoring trailing units.
fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let candidate_len = text
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(text.len());

    (1..=candidate_len)
        .rev()
        .find_map(|end| text[..end].parse::<f64>().ok())
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("3.21 arc-sec/px, Binning = 1"), Some(3.21));
        assert_eq!(leading_number("-12.5 deg"), Some(-12.5));
        assert_eq!(leading_number("1e-3, more"), Some(1e-3));
        assert_eq!(leading_number("2000 ms, rest"), Some(2000.0));
        assert_eq!(leading_number("n/a"), None);
        assert_eq!(leading_number(""), None);
    }

    #[test]
    fn test_value_after() {
        let line = "Max RA duration = 2500, Max DEC duration = 1800, RA Guide mode = Auto";
        assert_eq!(value_after(line, MAX_RA_DURATION), Some(2500.0));
        assert_eq!(value_after(line, MAX_DEC_DURATION), Some(1800.0));
        assert_eq!(value_after(line, "Pixel scale = "), None);
    }

    #[test]
    fn test_parse_device_legacy_rates() {
        let mut params = DeviceParams::default();
        parse_device(
            "Mount = Simulator, connected, guiding enabled, xAngle = 0.5, xRate = 0.004, yAngle = 2.1, yRate = 7.5",
            &mut params,
        );
        assert_relative_eq!(params.x_angle, 0.5);
        assert_relative_eq!(params.x_rate, 4.0);
        assert_relative_eq!(params.y_angle, 2.1);
        assert_relative_eq!(params.y_rate, 7.5);
    }

    #[test]
    fn test_parse_device_defaults() {
        let mut params = DeviceParams::default();
        params.x_rate = 9.0;
        parse_device("Mount = Simulator, connected", &mut params);
        assert_relative_eq!(params.x_rate, 1.0);
        assert_relative_eq!(params.y_angle, std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_version_banner() {
        let log = parse_str("PHD2 version 2.6.11, Log version 2.5. Log enabled at 2024-03-01 20:00:00\n");
        assert_eq!(log.version, "2.6.11");

        let log = parse_str("PHD2 version 2.5.0 started\n");
        assert_eq!(log.version, "2.5.0");
    }

    #[test]
    fn test_empty_input() {
        let log = parse_str("");
        assert!(log.is_empty());
        assert!(log.sessions.is_empty());
        assert!(log.calibrations.is_empty());
    }

    #[test]
    fn test_header_keys() {
        let text = "\
Guiding Begins at 2024-03-01 21:00:00
Pixel scale = 2.50 arc-sec/px, Binning = 1, Focal length = 400 mm
Mount = Simulator, connected, guiding enabled, xAngle = 0.1, xRate = 5.0, yAngle = 1.7, yRate = 4.0
X guide algorithm = Hysteresis, Hysteresis = 0.100, Aggression = 0.700, Minimum move = 0.200
Y guide algorithm = Resist Switch, Minimum move = 0.250 Aggression = 100% FastSwitch = enabled
Max RA duration = 2500, Max DEC duration = 1800, RA Guide mode = Auto, Dec Guide mode = Auto
AO = None
RA = 5.59 hr, Dec = 30.0 deg, Hour angle = N/A hr, Pier side = West
Frame,Time,mount,dx,dy,RARawDistance,DECRawDistance,RAGuideDistance,DECGuideDistance,RADuration,RADirection,DECDuration,DECDirection,XStep,YStep,StarMass,SNR,ErrorCode,ErrorDescription
1,1.000,\"Mount\",0.1,0.1,0.1,0.1,0,0,0,,0,,,,100,20,0
";
        let log = parse_str(text);
        let session = &log.sessions[0];

        assert_relative_eq!(session.pixel_scale, 2.5);
        assert_relative_eq!(session.mount.x_rate, 5.0);
        assert_relative_eq!(session.mount.y_angle, 1.7);
        assert_relative_eq!(session.mount.x_limits.min_move, 0.2);
        assert_relative_eq!(session.mount.y_limits.min_move, 0.25);
        assert_relative_eq!(session.mount.x_limits.max_duration, 2500.0);
        assert_relative_eq!(session.mount.y_limits.max_duration, 1800.0);
        assert_relative_eq!(session.declination, 30f64.to_radians());
        assert_eq!(session.header[0], "Guiding Begins at 2024-03-01 21:00:00");
        assert_eq!(session.header.len(), 8);
        assert_eq!(session.entries.len(), 1);
        assert_relative_eq!(session.duration, 1.0);
    }

    #[test]
    fn test_progress_callback_interval() {
        let text = "noise\n".repeat(450);
        let mut seen = Vec::new();
        let log = LogParser::new()
            .with_progress(|n| seen.push(n))
            .parse(text.as_bytes())
            .unwrap();

        assert!(log.is_empty());
        assert_eq!(seen, vec![200, 400]);
    }

    #[test]
    fn test_crlf_and_invalid_utf8() {
        let mut bytes = b"PHD2 version 2.6.9\r\n".to_vec();
        bytes.extend_from_slice(b"\xff\xfe garbage\r\n");
        let log = parse(&bytes[..]).unwrap();
        assert_eq!(log.version, "2.6.9");
    }
}
