//! Periodic error analysis over a range of guide frames.
//!
//! The RA offset of the selected frames is integrated into an "as if unguided"
//! position, linear drift is removed from both axes, the RA residual is
//! resampled onto a uniform grid, Hamming windowed and transformed. The result
//! is an amplitude spectrum indexed by period in seconds.

use chrono::NaiveDateTime;
use guide_math::{
    hamming_window, Akima, AkimaSpline, InterpError, Interpolant, Line, LinearFit, RustFft,
    SmoothInterpolate, SpectralTransform,
};
use log::info;
use num_complex::Complex64;
use thiserror::Error;

use crate::model::GuideSession;

/// Fewest eligible frames worth analysing; leaves at least five spectral bins
/// once the zero-frequency bin is dropped.
pub const MIN_ANALYSIS_FRAMES: usize = 12;

/// Why a range could not be analysed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("range {begin}..{end} is outside the session's {len} frames")]
    RangeOutOfBounds { begin: usize, end: usize, len: usize },
    #[error("need at least {needed} eligible frames, found {available}")]
    InsufficientFrames { needed: usize, available: usize },
    #[error("frame {0} is not part of an unguided run")]
    NotUnguided(usize),
    #[error("interpolation failed: {0}")]
    Interp(#[from] InterpError),
}

fn check_range(session: &GuideSession, begin: usize, end: usize) -> Result<(), AnalysisError> {
    let len = session.entries.len();
    if begin > end || end > len {
        return Err(AnalysisError::RangeOutOfBounds { begin, end, len });
    }
    Ok(())
}

fn eligible_count(session: &GuideSession, begin: usize, end: usize) -> usize {
    session.entries[begin..end]
        .iter()
        .filter(|e| e.is_eligible())
        .count()
}

/// Whether `[begin, end)` holds enough eligible frames for analysis.
///
/// Ranges reaching past the end of the session are never analysable.
pub fn can_analyze(session: &GuideSession, begin: usize, end: usize) -> bool {
    check_range(session, begin, end).is_ok()
        && eligible_count(session, begin, end) >= MIN_ANALYSIS_FRAMES
}

impl GuideSession {
    /// Whether the whole session can be analysed.
    pub fn can_analyze_all(&self) -> bool {
        can_analyze(self, 0, self.entries.len())
    }

    /// Whether the unguided run around `pos` can be analysed.
    pub fn can_analyze_unguided(&self, pos: usize) -> bool {
        self.unguided_bounds(pos)
            .map_or(false, |(begin, end)| can_analyze(self, begin, end))
    }
}

/// Drift-corrected series and periodic error spectrum of one frame range.
#[derive(Debug, Clone)]
pub struct AnalysisResult<C = AkimaSpline> {
    /// Session start time
    pub starts: Option<NaiveDateTime>,
    /// Arc-seconds per pixel
    pub pixel_scale: f64,
    pub begin: usize,
    pub end: usize,
    pub undo_ra_corrections: bool,
    /// Sample times in seconds
    pub t: Vec<f64>,
    /// RA position minus its drift line, pixels
    pub ra_corrected: Vec<f64>,
    /// Dec offset minus its drift line, pixels
    pub dec_corrected: Vec<f64>,
    /// Fitted RA drift, pixels against seconds
    pub ra_drift: Line,
    /// Fitted Dec drift, pixels against seconds
    pub dec_drift: Line,
    /// Spectrum periods in seconds, ascending
    pub periods: Vec<f64>,
    /// Peak amplitude in pixels at each period
    pub amplitudes: Vec<f64>,
    pub amplitude_max: f64,
    /// Smooth curve through `(periods, amplitudes)`
    pub spectrum: C,
}

impl<C: Interpolant> AnalysisResult<C> {
    /// Number of frames analysed.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Interpolated amplitude at `period`, clamped to the spectrum's range.
    pub fn amplitude_at(&self, period: f64) -> f64 {
        self.spectrum.eval(period)
    }

    /// Period and amplitude of the strongest bin.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.periods
            .iter()
            .copied()
            .zip(self.amplitudes.iter().copied())
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Up to `count` local maxima of the spectrum, strongest first.
    pub fn peaks(&self, count: usize) -> Vec<(f64, f64)> {
        let amps = &self.amplitudes;
        let mut peaks: Vec<(f64, f64)> = (0..amps.len())
            .filter(|&i| {
                let left = i == 0 || amps[i] > amps[i - 1];
                let right = i + 1 == amps.len() || amps[i] >= amps[i + 1];
                left && right
            })
            .map(|i| (self.periods[i], amps[i]))
            .collect();
        peaks.sort_by(|a, b| b.1.total_cmp(&a.1));
        peaks.truncate(count);
        peaks
    }
}

/// Periodic error analysis with pluggable transform and interpolation.
#[derive(Debug, Clone, Default)]
pub struct PeriodicErrorAnalyzer<T = RustFft, S = Akima> {
    transform: T,
    interpolator: S,
}

impl PeriodicErrorAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: SpectralTransform, S: SmoothInterpolate> PeriodicErrorAnalyzer<T, S> {
    pub fn with_backends(transform: T, interpolator: S) -> Self {
        Self {
            transform,
            interpolator,
        }
    }

    /// Analyse the whole session.
    pub fn analyze_all(
        &self,
        session: &GuideSession,
        undo_ra_corrections: bool,
    ) -> Result<AnalysisResult<S::Curve>, AnalysisError> {
        self.analyze(session, 0, session.entries.len(), undo_ra_corrections)
    }

    /// Analyse the unguided run containing frame `pos`.
    pub fn analyze_unguided(
        &self,
        session: &GuideSession,
        pos: usize,
        undo_ra_corrections: bool,
    ) -> Result<AnalysisResult<S::Curve>, AnalysisError> {
        let (begin, end) = session
            .unguided_bounds(pos)
            .ok_or(AnalysisError::NotUnguided(pos))?;
        self.analyze(session, begin, end, undo_ra_corrections)
    }

    /// Analyse eligible frames in `[begin, end)`.
    ///
    /// With `undo_ra_corrections` each frame's RA guide distance is added back
    /// to the next frame's motion, reconstructing the path the star would have
    /// taken without RA corrections.
    pub fn analyze(
        &self,
        session: &GuideSession,
        begin: usize,
        end: usize,
        undo_ra_corrections: bool,
    ) -> Result<AnalysisResult<S::Curve>, AnalysisError> {
        check_range(session, begin, end)?;
        let available = eligible_count(session, begin, end);
        if available < MIN_ANALYSIS_FRAMES {
            return Err(AnalysisError::InsufficientFrames {
                needed: MIN_ANALYSIS_FRAMES,
                available,
            });
        }

        let n = available;
        let mut t = Vec::with_capacity(n);
        let mut ra = Vec::with_capacity(n);
        let mut dec = Vec::with_capacity(n);
        let mut fit_ra = LinearFit::new();
        let mut fit_dec = LinearFit::new();

        let mut ra_pos = 0.0;
        let mut prev_ra_raw = 0.0;
        let mut prev_ra_guide = 0.0;
        for e in session.entries[begin..end].iter().filter(|e| e.is_eligible()) {
            ra_pos += e.ra_raw - prev_ra_raw - prev_ra_guide;
            prev_ra_raw = e.ra_raw;
            prev_ra_guide = if undo_ra_corrections { e.ra_guide } else { 0.0 };

            t.push(e.time);
            ra.push(ra_pos);
            dec.push(e.dec_raw);
            fit_ra.add(e.time, ra_pos);
            fit_dec.add(e.time, e.dec_raw);
        }

        let ra_drift = fit_ra.line();
        let dec_drift = fit_dec.line();
        let ra_corrected: Vec<f64> = t
            .iter()
            .zip(&ra)
            .map(|(&x, &y)| y - ra_drift.eval(x))
            .collect();
        let dec_corrected: Vec<f64> = t
            .iter()
            .zip(&dec)
            .map(|(&x, &y)| y - dec_drift.eval(x))
            .collect();

        // uniform resampling of the RA residual
        let ra_curve = self.interpolator.fit(&t, &ra_corrected)?;
        let (t0, t1) = (t[0], t[n - 1]);
        let dt = (t1 - t0) / (n - 1) as f64;
        let window = hamming_window(n);
        let samples: Vec<Complex64> = window
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let x = (t0 + i as f64 * dt).min(t1);
                Complex64::new(w * ra_curve.eval(x), 0.0)
            })
            .collect();

        let coeffs = self.transform.forward(&samples);

        // drop the zero-frequency bin; the transform yields descending periods
        let bins = n / 2 - 1;
        let scale = 4.0 / n as f64;
        let (periods, amplitudes): (Vec<f64>, Vec<f64>) = (1..=bins)
            .rev()
            .map(|k| {
                let freq = k as f64 / (n as f64 * dt);
                (1.0 / freq, coeffs[k].norm() * scale)
            })
            .unzip();
        let amplitude_max = amplitudes.iter().copied().fold(0.0, f64::max);
        let spectrum = self.interpolator.fit(&periods, &amplitudes)?;

        info!(
            "periodic error analysis: {} samples over {:.1} s, {} spectral bins",
            n,
            t1 - t0,
            bins
        );

        Ok(AnalysisResult {
            starts: session.starts,
            pixel_scale: session.pixel_scale,
            begin,
            end,
            undo_ra_corrections,
            t,
            ra_corrected,
            dec_corrected,
            ra_drift,
            dec_drift,
            periods,
            amplitudes,
            amplitude_max,
            spectrum,
        })
    }
}
