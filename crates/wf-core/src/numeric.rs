//! Float comparison and hydraulic tolerance constants shared by the solver,
//! status checks and controls.

/// Flow magnitude (m³/s) below which a link flow is treated as zero.
pub const FLOW_TOLERANCE: f64 = 1.0e-6;
/// Head difference (m) below which two heads are considered equal.
pub const HEAD_TOLERANCE: f64 = 1.0e-4;

/// Absolute/relative tolerance pair for float comparisons.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Tolerances {
    pub const fn absolute(abs: f64) -> Self {
        Self { abs, rel: 0.0 }
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-9,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: f64, b: f64, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    diff <= tol.abs || diff <= tol.rel * a.abs().max(b.abs())
}

/// Position of the first non-finite entry, if any.
pub fn first_non_finite(values: &[f64]) -> Option<usize> {
    values.iter().position(|v| !v.is_finite())
}

/// Largest absolute entry; 0 for an empty slice.
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

/// `sign(x) * |x|^p`, the odd extension of a power law.
#[inline]
pub fn signed_pow(x: f64, p: f64) -> f64 {
    x.signum() * x.abs().powf(p)
}
