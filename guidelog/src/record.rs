//! Decoding of single data rows.
//!
//! Guiding rows are comma separated with a fixed column order:
//!
//! ```text
//! Frame,Time,mount,dx,dy,RARawDistance,DECRawDistance,RAGuideDistance,DECGuideDistance,
//!   RADuration,RADirection,DECDuration,DECDirection,XStep,YStep,StarMass,SNR,ErrorCode,ErrorDescription
//! ```
//!
//! Frame and Time are required. Every later column may be empty or missing and
//! then defaults to zero. The final description column is quoted free text and
//! may itself contain commas.

use thiserror::Error;

use crate::model::{CalDirection, CalibrationStep, Device, FrameRecord};

/// Number of columns before the free-text description.
pub const GUIDING_COLUMNS: usize = 18;

/// Why a data row could not be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("field {field} is not a number: {value:?}")]
    BadNumber { field: &'static str, value: String },
    #[error("field {field} has an unknown direction: {value:?}")]
    BadDirection { field: &'static str, value: String },
    #[error("unknown calibration direction {0:?}")]
    UnknownCalDirection(String),
}

/// Trimmed column text, `None` when absent or empty.
fn present(col: Option<&str>) -> Option<&str> {
    col.map(str::trim).filter(|s| !s.is_empty())
}

fn number<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, DecodeError> {
    value.parse().map_err(|_| DecodeError::BadNumber {
        field,
        value: value.to_string(),
    })
}

fn required<T: std::str::FromStr>(
    col: Option<&str>,
    field: &'static str,
) -> Result<T, DecodeError> {
    let value = present(col).ok_or(DecodeError::MissingField(field))?;
    number(value, field)
}

fn optional<T: std::str::FromStr>(
    col: Option<&str>,
    field: &'static str,
) -> Result<Option<T>, DecodeError> {
    present(col).map(|v| number(v, field)).transpose()
}

/// Apply a direction column to a pulse duration.
///
/// `positive` and `negative` are the leading letters that keep or flip the
/// sign. An empty column leaves the duration unchanged.
fn apply_direction(
    duration: i32,
    col: Option<&str>,
    positive: char,
    negative: char,
    field: &'static str,
) -> Result<i32, DecodeError> {
    match present(col) {
        None => Ok(duration),
        Some(dir) if dir.starts_with(positive) => Ok(duration),
        Some(dir) if dir.starts_with(negative) => Ok(-duration),
        Some(dir) => Err(DecodeError::BadDirection {
            field,
            value: dir.to_string(),
        }),
    }
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text)
}

/// Decode one guiding data row.
///
/// The returned frame has `included` and `guiding` set to `true`; the parser
/// adjusts them from context.
pub fn decode_frame(line: &str) -> Result<FrameRecord, DecodeError> {
    let mut cols = line.splitn(GUIDING_COLUMNS + 1, ',');

    let frame = required(cols.next(), "Frame")?;
    let time = required(cols.next(), "Time")?;

    // older logs put the mount name here, treat anything unknown as the mount
    let device = match cols.next().map(str::trim) {
        Some("\"AO\"") => Device::Ao,
        _ => Device::Mount,
    };

    let dx = optional(cols.next(), "dx")?.unwrap_or(0.0);
    let dy = optional(cols.next(), "dy")?.unwrap_or(0.0);
    let ra_raw = optional(cols.next(), "RARawDistance")?.unwrap_or(0.0);
    let dec_raw = optional(cols.next(), "DECRawDistance")?.unwrap_or(0.0);
    let ra_guide = optional(cols.next(), "RAGuideDistance")?.unwrap_or(0.0);
    let dec_guide = optional(cols.next(), "DECGuideDistance")?.unwrap_or(0.0);

    let ra_dur = optional(cols.next(), "RADuration")?.unwrap_or(0);
    let mut ra_dur = apply_direction(ra_dur, cols.next(), 'E', 'W', "RADirection")?;
    let dec_dur = optional(cols.next(), "DECDuration")?.unwrap_or(0);
    let mut dec_dur = apply_direction(dec_dur, cols.next(), 'N', 'S', "DECDirection")?;

    // AO rows report steps instead of pulse durations
    if let Some(x_step) = optional(cols.next(), "XStep")? {
        ra_dur = x_step;
    }
    if let Some(y_step) = optional(cols.next(), "YStep")? {
        dec_dur = y_step;
    }

    let mass = optional(cols.next(), "StarMass")?.unwrap_or(0.0);
    let snr = optional(cols.next(), "SNR")?.unwrap_or(0.0);
    let err = optional(cols.next(), "ErrorCode")?.unwrap_or(0);
    let info = present(cols.next())
        .map(|s| unquote(s).to_string())
        .unwrap_or_default();

    Ok(FrameRecord {
        frame,
        time,
        device,
        dx,
        dy,
        ra_raw,
        dec_raw,
        ra_guide,
        dec_guide,
        ra_dur,
        dec_dur,
        mass,
        snr,
        err,
        info,
        included: true,
        guiding: true,
    })
}

/// Decode one calibration row: `Direction,Step,dx,dy,...`.
///
/// Also returns the device whose direction vocabulary the row used.
pub fn decode_calibration(line: &str) -> Result<(CalibrationStep, Device), DecodeError> {
    let mut cols = line.split(',');

    let word = cols.next().map(str::trim).unwrap_or_default();
    let (direction, device) = CalDirection::from_word(word)
        .ok_or_else(|| DecodeError::UnknownCalDirection(word.to_string()))?;

    let step = required(cols.next(), "Step")?;
    let dx = required(cols.next(), "dx")?;
    let dy = required(cols.next(), "dy")?;

    Ok((
        CalibrationStep {
            direction,
            step,
            dx,
            dy,
        },
        device,
    ))
}
