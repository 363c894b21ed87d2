//! Online bivariate statistics with a least-squares line fit.
//!
//! `LinearFit` keeps running means, variances and the covariance of a stream of
//! (x, y) pairs. Each sample is folded in with an O(1) update that never revisits
//! earlier samples, so the same accumulator serves as a 2-D scatter statistic,
//! as a regressor of y on x, and as a principal-axis estimator.

/// Running mean/variance/covariance of (x, y) samples.
///
/// Variances and covariance are population statistics (divided by n).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearFit {
    avx: f64,
    avy: f64,
    varx: f64,
    vary: f64,
    covxy: f64,
    n: f64,
}

impl LinearFit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one sample into the running statistics.
    pub fn add(&mut self, x: f64, y: f64) {
        let k = self.n;
        self.n += 1.0;
        let k = k / self.n;
        let dx = x - self.avx;
        let dy = y - self.avy;
        self.varx += (k * dx * dx - self.varx) / self.n;
        self.covxy += (k * dx * dy - self.covxy) / self.n;
        self.vary += (k * dy * dy - self.vary) / self.n;
        self.avx += dx / self.n;
        self.avy += dy / self.n;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of samples seen so far.
    pub fn count(&self) -> usize {
        self.n as usize
    }

    pub fn mean_x(&self) -> f64 {
        self.avx
    }

    pub fn mean_y(&self) -> f64 {
        self.avy
    }

    pub fn var_x(&self) -> f64 {
        self.varx
    }

    pub fn var_y(&self) -> f64 {
        self.vary
    }

    pub fn cov_xy(&self) -> f64 {
        self.covxy
    }

    /// Whether the samples span more than one x value.
    fn is_regressable(&self) -> bool {
        self.n >= 2.0 && self.varx > 0.0
    }

    /// Slope `b` of `y = a + b x`; zero with fewer than two samples or when
    /// every sample shares the same x.
    pub fn b(&self) -> f64 {
        if self.is_regressable() {
            self.covxy / self.varx
        } else {
            0.0
        }
    }

    /// Intercept `a` of `y = a + b x`; zero whenever [`LinearFit::b`] is.
    pub fn a(&self) -> f64 {
        if self.is_regressable() {
            self.avy - self.b() * self.avx
        } else {
            0.0
        }
    }

    /// Angle of the principal axis of the scatter, `atan2(cov, var_x)`.
    ///
    /// Zero with fewer than two samples.
    pub fn theta(&self) -> f64 {
        if self.n >= 2.0 {
            self.covxy.atan2(self.varx)
        } else {
            0.0
        }
    }

    /// The fitted line as a callable value.
    pub fn line(&self) -> Line {
        Line {
            a: self.a(),
            b: self.b(),
        }
    }
}

/// A straight line `y = a + b x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub a: f64,
    pub b: f64,
}

impl Line {
    pub fn eval(&self, x: f64) -> f64 {
        self.a + self.b * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_perfect_line() {
        let mut fit = LinearFit::new();
        for i in 0..20 {
            let x = i as f64 * 0.5;
            fit.add(x, 2.0 + 3.0 * x);
        }

        assert_relative_eq!(fit.b(), 3.0, epsilon = 1e-10);
        assert_relative_eq!(fit.a(), 2.0, epsilon = 1e-10);
        assert_eq!(fit.count(), 20);
    }

    #[test]
    fn test_fewer_than_two_samples() {
        let mut fit = LinearFit::new();
        assert_eq!(fit.a(), 0.0);
        assert_eq!(fit.b(), 0.0);
        assert_eq!(fit.theta(), 0.0);

        fit.add(4.0, 7.0);
        assert_eq!(fit.a(), 0.0);
        assert_eq!(fit.b(), 0.0);
        assert_eq!(fit.theta(), 0.0);
        assert_eq!(fit.mean_x(), 4.0);
        assert_eq!(fit.mean_y(), 7.0);
    }

    #[test]
    fn test_identical_x_has_no_slope() {
        let mut fit = LinearFit::new();
        for y in [1.0, 2.5, -0.5, 4.0] {
            fit.add(3.0, y);
        }

        assert_eq!(fit.var_x(), 0.0);
        assert_eq!(fit.b(), 0.0);
        assert_eq!(fit.a(), 0.0);
        assert_eq!(fit.line().eval(3.0), 0.0);
        assert_eq!(fit.count(), 4);
    }

    #[test]
    fn test_population_variance() {
        // Mean = 5, population variance = 4
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut fit = LinearFit::new();
        for &v in &data {
            fit.add(v, -v);
        }

        assert_relative_eq!(fit.mean_x(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(fit.var_x(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(fit.var_y(), 4.0, epsilon = 1e-12);
        assert_relative_eq!(fit.cov_xy(), -4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_theta_of_diagonal_scatter() {
        let mut fit = LinearFit::new();
        for i in -10..=10 {
            let v = i as f64;
            fit.add(v, v);
        }
        assert_relative_eq!(fit.theta(), std::f64::consts::FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn test_reset_and_line() {
        let mut fit = LinearFit::new();
        fit.add(0.0, 1.0);
        fit.add(1.0, 3.0);
        let line = fit.line();
        assert_relative_eq!(line.eval(2.0), 5.0, epsilon = 1e-12);

        fit.reset();
        assert_eq!(fit.count(), 0);
        assert_eq!(fit, LinearFit::default());
    }
}
