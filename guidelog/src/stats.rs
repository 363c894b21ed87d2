//! Session statistics: scatter, elongation, drift and polar alignment error.

use guide_math::LinearFit;

use crate::model::{FrameRecord, GuideSession, SessionStats};

/// Barrett's small-angle constant relating Dec drift in arc-seconds per
/// minute to polar alignment error in arc-minutes.
const POLAR_ALIGN_FACTOR: f64 = 3.8197;

/// Below this the scatter ellipse is treated as a point.
const ELONGATION_EPSILON: f64 = 1e-6;

impl GuideSession {
    /// Compute and store statistics from the currently eligible frames.
    pub fn calc_stats(&mut self) -> &SessionStats {
        let stats = compute_stats(self);
        self.stats.insert(stats)
    }
}

/// Statistics of `session` over frames that are included and located.
pub fn compute_stats(session: &GuideSession) -> SessionStats {
    let eligible = || session.entries.iter().filter(|e| e.is_eligible());

    let mut fit = LinearFit::new();
    let mut peak_ra: f64 = 0.0;
    let mut peak_dec: f64 = 0.0;
    for e in eligible() {
        fit.add(e.ra_raw, e.dec_raw);
        if e.ra_raw.abs() > peak_ra.abs() {
            peak_ra = e.ra_raw;
        }
        if e.dec_raw.abs() > peak_dec.abs() {
            peak_dec = e.dec_raw;
        }
    }

    let avg_ra = fit.mean_x();
    let avg_dec = fit.mean_y();
    let theta = fit.theta();

    // spread along the major and minor axes of the scatter
    let (sin_t, cos_t) = theta.sin_cos();
    let mut rotated = LinearFit::new();
    for e in eligible() {
        let dr = e.ra_raw - avg_ra;
        let dd = e.dec_raw - avg_dec;
        rotated.add(dr * cos_t + dd * sin_t, dd * cos_t - dr * sin_t);
    }
    let lx = rotated.var_x().sqrt();
    let ly = rotated.var_y().sqrt();

    let (major, minor) = if lx >= ly { (lx, ly) } else { (ly, lx) };
    let elongation = if major + minor > ELONGATION_EPSILON {
        (major - minor) / (major + minor)
    } else {
        1.0
    };

    let drift_ra = ra_drift(&session.entries) * 60.0;
    let drift_dec = dec_drift(&session.entries) * 60.0;

    SessionStats {
        rms_ra: fit.var_x().sqrt(),
        rms_dec: fit.var_y().sqrt(),
        peak_ra,
        peak_dec,
        avg_ra,
        avg_dec,
        theta,
        lx,
        ly,
        elongation,
        drift_ra,
        drift_dec,
        pa_error: polar_alignment_error(drift_dec, session.pixel_scale, session.declination),
        count: fit.count(),
    }
}

/// RA drift in pixels per second.
///
/// Net RA offset between the first and last eligible frames, with every RA
/// correction issued in between added back, over the elapsed time. Corrections
/// are taken from all included frames, dropped or not.
pub fn ra_drift(entries: &[FrameRecord]) -> f64 {
    let Some(first) = entries.iter().position(FrameRecord::is_eligible) else {
        return 0.0;
    };
    let Some(last) = entries.iter().rposition(FrameRecord::is_eligible) else {
        return 0.0;
    };

    let corrections: f64 = entries[first..]
        .iter()
        .filter(|e| e.included && e.ra_dur != 0)
        .map(|e| e.ra_guide)
        .sum();

    let (e0, e1) = (&entries[first], &entries[last]);
    if e1.time > e0.time {
        (e1.ra_raw - e0.ra_raw - corrections) / (e1.time - e0.time)
    } else {
        0.0
    }
}

/// Dec drift in pixels per second.
///
/// Accumulates Dec motion only across steps where no Dec correction was
/// issued on the earlier frame, then fits a line to the accumulated position.
/// Unlike [`ra_drift`] the corrections themselves never enter the estimate.
pub fn dec_drift(entries: &[FrameRecord]) -> f64 {
    let mut eligible = entries.iter().filter(|e| e.is_eligible());
    let Some(first) = eligible.next() else {
        return 0.0;
    };

    let mut fit = LinearFit::new();
    let mut accum = 0.0;
    let mut prev_y = first.dec_raw;
    let mut prev_guided = first.dec_dur != 0;
    fit.add(first.time, accum);

    for e in eligible {
        if !prev_guided {
            accum += e.dec_raw - prev_y;
            fit.add(e.time, accum);
        }
        prev_y = e.dec_raw;
        prev_guided = e.dec_dur != 0;
    }

    fit.b()
}

/// Polar alignment error in arc-minutes from Dec drift in pixels per minute.
pub fn polar_alignment_error(drift_dec: f64, pixel_scale: f64, declination: f64) -> f64 {
    POLAR_ALIGN_FACTOR * drift_dec.abs() * pixel_scale / declination.cos()
}
