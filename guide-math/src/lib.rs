//! Numerical building blocks for guide log analysis.
//!
//! Contains the pieces of the analysis pipeline that know nothing about guide
//! logs: an online bivariate fit, smooth interpolation, and spectral transforms.

pub mod interp;
pub mod linear_fit;
pub mod spectrum;

pub use interp::{Akima, AkimaSpline, InterpError, Interpolant, SmoothInterpolate};
pub use linear_fit::{Line, LinearFit};
pub use spectrum::{hamming_window, RustFft, SpectralTransform};
