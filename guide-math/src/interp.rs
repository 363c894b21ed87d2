//! Smooth 1D interpolation.
//!
//! The analysis code only needs "fit a smooth curve through these points, then
//! evaluate it anywhere in between". That contract is captured by
//! [`SmoothInterpolate`] and [`Interpolant`] so the curve family can be swapped
//! without touching callers. [`Akima`] is the default implementation: a
//! piecewise cubic whose node slopes are chosen from neighbouring secants, which
//! avoids the overshoot of natural cubic splines around outliers.

use thiserror::Error;

/// Errors that can occur while fitting or evaluating an interpolant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in strictly ascending order")]
    UnsortedData,
}

/// A fitted curve that can be evaluated at any point of its domain.
pub trait Interpolant {
    /// Evaluate the curve at `x`. Arguments outside [`Interpolant::domain`] are
    /// clamped to the nearest end point.
    fn eval(&self, x: f64) -> f64;

    /// Closed range of x values the curve was fitted over.
    fn domain(&self) -> (f64, f64);

    /// Evaluate the curve at `x`, rejecting arguments outside the domain.
    fn try_eval(&self, x: f64) -> Result<f64, InterpError> {
        let (lo, hi) = self.domain();
        if x < lo || x > hi {
            return Err(InterpError::OutOfBounds(x, lo, hi));
        }
        Ok(self.eval(x))
    }
}

/// A method for fitting a smooth curve through sample points.
pub trait SmoothInterpolate {
    type Curve: Interpolant;

    /// Fit a curve through `(xs[i], ys[i])`.
    ///
    /// # Errors
    /// * `InterpError::MismatchedLengths` - xs and ys have different lengths
    /// * `InterpError::InsufficientData` - fewer than 2 points
    /// * `InterpError::UnsortedData` - xs is not strictly ascending
    fn fit(&self, xs: &[f64], ys: &[f64]) -> Result<Self::Curve, InterpError>;
}

fn validate(xs: &[f64], ys: &[f64]) -> Result<(), InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    if xs.windows(2).any(|w| w[1] <= w[0]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Akima spline fitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Akima;

impl SmoothInterpolate for Akima {
    type Curve = AkimaSpline;

    fn fit(&self, xs: &[f64], ys: &[f64]) -> Result<AkimaSpline, InterpError> {
        AkimaSpline::new(xs, ys)
    }
}

/// Cubic segment `y0 + dx * (b + dx * (c + dx * d))` starting at a node.
#[derive(Debug, Clone, Copy)]
struct Segment {
    b: f64,
    c: f64,
    d: f64,
}

/// A fitted Akima spline.
#[derive(Debug, Clone)]
pub struct AkimaSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    segments: Vec<Segment>,
}

impl AkimaSpline {
    /// Fit an Akima spline through the given points.
    ///
    /// With exactly two points the spline degenerates to the straight line
    /// between them.
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self, InterpError> {
        validate(xs, ys)?;

        let n = xs.len();
        let secants: Vec<f64> = (0..n - 1)
            .map(|i| (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]))
            .collect();

        let slopes = if n == 2 {
            vec![secants[0]; 2]
        } else {
            node_slopes(&secants)
        };

        let segments = (0..n - 1)
            .map(|i| {
                let h = xs[i + 1] - xs[i];
                let m = secants[i];
                let t0 = slopes[i];
                let t1 = slopes[i + 1];
                Segment {
                    b: t0,
                    c: (3.0 * m - 2.0 * t0 - t1) / h,
                    d: (t0 + t1 - 2.0 * m) / (h * h),
                }
            })
            .collect();

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            segments,
        })
    }

    /// Number of nodes the spline passes through.
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// Akima node slopes from the n-1 secants of n >= 3 points.
///
/// The secant sequence is extended by two values on each side by linear
/// extrapolation so that end nodes get slopes from the same formula.
fn node_slopes(secants: &[f64]) -> Vec<f64> {
    let k = secants.len();
    let mut m = Vec::with_capacity(k + 4);
    let m_minus1 = 2.0 * secants[0] - secants[1];
    let m_minus2 = 2.0 * m_minus1 - secants[0];
    m.push(m_minus2);
    m.push(m_minus1);
    m.extend_from_slice(secants);
    let m_plus1 = 2.0 * secants[k - 1] - secants[k - 2];
    let m_plus2 = 2.0 * m_plus1 - secants[k - 1];
    m.push(m_plus1);
    m.push(m_plus2);

    // node i sees secants m[i-2], m[i-1], m[i], m[i+1], stored at offset +2
    (0..=k)
        .map(|i| {
            let (m0, m1, m2, m3) = (m[i], m[i + 1], m[i + 2], m[i + 3]);
            let w1 = (m3 - m2).abs();
            let w2 = (m1 - m0).abs();
            if w1 + w2 == 0.0 {
                0.5 * (m1 + m2)
            } else {
                (w1 * m1 + w2 * m2) / (w1 + w2)
            }
        })
        .collect()
}

impl Interpolant for AkimaSpline {
    fn eval(&self, x: f64) -> f64 {
        let (lo, hi) = self.domain();
        let x = x.clamp(lo, hi);

        // index of the segment whose left node is the last node <= x
        let idx = self
            .xs
            .partition_point(|&node| node <= x)
            .saturating_sub(1)
            .min(self.segments.len() - 1);

        let seg = &self.segments[idx];
        let dx = x - self.xs[idx];
        self.ys[idx] + dx * (seg.b + dx * (seg.c + dx * seg.d))
    }

    fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_passes_through_nodes() {
        let xs = [0.0, 1.0, 2.5, 3.0, 4.0, 6.0];
        let ys = [1.0, -2.0, 0.5, 3.0, 2.0, -1.0];
        let spline = Akima.fit(&xs, &ys).unwrap();

        for (&x, &y) in xs.iter().zip(ys.iter()) {
            assert_relative_eq!(spline.eval(x), y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_reproduces_straight_line() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 * 0.7).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 1.5 - 2.0 * x).collect();
        let spline = AkimaSpline::new(&xs, &ys).unwrap();

        for i in 0..60 {
            let x = i as f64 * 0.1;
            assert_relative_eq!(spline.eval(x), 1.5 - 2.0 * x, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_two_points_is_linear() {
        let spline = AkimaSpline::new(&[1.0, 3.0], &[10.0, 20.0]).unwrap();
        assert_relative_eq!(spline.eval(2.0), 15.0, epsilon = 1e-12);
        assert_eq!(spline.len(), 2);
    }

    #[test]
    fn test_smooth_curve_accuracy() {
        let xs: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x.sin()).collect();
        let spline = AkimaSpline::new(&xs, &ys).unwrap();

        for i in 0..90 {
            let x = 0.05 + i as f64 * 0.1;
            assert!((spline.eval(x) - x.sin()).abs() < 2e-2);
        }
    }

    #[test]
    fn test_eval_clamps_and_try_eval_rejects() {
        let spline = AkimaSpline::new(&[0.0, 1.0, 2.0], &[0.0, 1.0, 4.0]).unwrap();
        assert_relative_eq!(spline.eval(-5.0), 0.0, epsilon = 1e-12);
        assert_relative_eq!(spline.eval(9.0), 4.0, epsilon = 1e-12);
        assert!(matches!(
            spline.try_eval(2.5),
            Err(InterpError::OutOfBounds(_, _, _))
        ));
        assert!(spline.try_eval(1.5).is_ok());
    }

    #[test]
    fn test_invalid_input() {
        assert_eq!(
            AkimaSpline::new(&[1.0], &[1.0]).unwrap_err(),
            InterpError::InsufficientData
        );
        assert_eq!(
            AkimaSpline::new(&[1.0, 2.0], &[1.0]).unwrap_err(),
            InterpError::MismatchedLengths
        );
        assert_eq!(
            AkimaSpline::new(&[2.0, 1.0, 3.0], &[1.0, 2.0, 3.0]).unwrap_err(),
            InterpError::UnsortedData
        );
        assert_eq!(
            AkimaSpline::new(&[1.0, 1.0, 3.0], &[1.0, 2.0, 3.0]).unwrap_err(),
            InterpError::UnsortedData
        );
    }
}
