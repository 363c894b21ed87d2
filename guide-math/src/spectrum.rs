//! Discrete Fourier transforms and window functions.

use std::f64::consts::PI;

use num_complex::Complex64;
use rustfft::FftPlanner;

/// A forward complex discrete Fourier transform.
///
/// Output bin `k` holds `sum_j x[j] * exp(-2πi jk / n)` (no normalization),
/// so bin 0 is the zero-frequency term.
pub trait SpectralTransform {
    fn forward(&self, samples: &[Complex64]) -> Vec<Complex64>;
}

/// [`SpectralTransform`] backed by `rustfft`, valid for any length.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustFft;

impl SpectralTransform for RustFft {
    fn forward(&self, samples: &[Complex64]) -> Vec<Complex64> {
        let mut buffer = samples.to_vec();
        if buffer.is_empty() {
            return buffer;
        }
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(buffer.len());
        fft.process(&mut buffer);
        buffer
    }
}

/// Symmetric Hamming window `0.54 - 0.46 cos(2πi / (n - 1))` of length `n`.
pub fn hamming_window(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let k = 2.0 * PI / (n - 1) as f64;
            (0..n).map(|i| 0.54 - 0.46 * (i as f64 * k).cos()).collect()
        }
    }
}
