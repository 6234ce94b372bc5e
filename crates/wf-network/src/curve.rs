//! Data curves and pump head-curve fitting.

use wf_core::CurveId;

use crate::error::{NetworkError, NetworkResult};

/// A named list of (x, y) points.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub id: CurveId,
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

/// Coefficients of the pump head curve `h = a - b * q^c` at nominal speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadCurveCoeffs {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl HeadCurveCoeffs {
    /// Fit coefficients from a 1-point (design point) or 3-point curve.
    ///
    /// A single point `(q1, h1)` gives shutoff head `4/3 h1` and
    /// maximum flow `2 q1`. Three points must start at zero flow and have
    /// strictly decreasing head with increasing flow.
    pub fn fit(curve: &Curve) -> NetworkResult<Self> {
        let bad = |reason: &str| NetworkError::InvalidCurve {
            curve: curve.name.clone(),
            reason: reason.to_string(),
        };
        match curve.points.as_slice() {
            [(q1, h1)] => {
                if *q1 <= 0.0 || *h1 <= 0.0 {
                    return Err(bad("design point must have positive flow and head"));
                }
                Ok(Self {
                    a: 4.0 / 3.0 * h1,
                    b: h1 / (3.0 * q1 * q1),
                    c: 2.0,
                })
            }
            [(q0, h0), (q1, h1), (q2, h2)] => {
                if q0.abs() > 0.0 {
                    return Err(bad("first point of a 3-point curve must be at zero flow"));
                }
                if !(q1 > q0 && q2 > q1) || !(h0 > h1 && h1 > h2) {
                    return Err(bad("head must decrease as flow increases"));
                }
                let c = ((h0 - h2) / (h0 - h1)).ln() / (q2 / q1).ln();
                let b = (h0 - h1) / q1.powf(c);
                if !c.is_finite() || !b.is_finite() || c <= 0.0 {
                    return Err(bad("points do not define a decreasing power curve"));
                }
                Ok(Self { a: *h0, b, c })
            }
            _ => Err(bad("pump head curves need 1 or 3 points")),
        }
    }

    /// Head gain at flow `q` (m³/s) and relative speed `speed`.
    pub fn head(&self, q: f64, speed: f64) -> f64 {
        speed * speed * self.a - self.b * speed.powf(2.0 - self.c) * q.abs().powf(self.c)
    }

    /// Flow at which the head gain drops to zero.
    pub fn max_flow(&self, speed: f64) -> f64 {
        (speed * speed * self.a / (self.b * speed.powf(2.0 - self.c))).powf(1.0 / self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(points: Vec<(f64, f64)>) -> Curve {
        Curve {
            id: CurveId::from_index(0),
            name: "pump_curve".into(),
            points,
        }
    }

    #[test]
    fn single_point_fit_passes_through_design_point() {
        let coeffs = HeadCurveCoeffs::fit(&curve(vec![(0.05, 30.0)])).unwrap();
        assert!((coeffs.head(0.05, 1.0) - 30.0).abs() < 1e-9);
        assert!((coeffs.head(0.0, 1.0) - 40.0).abs() < 1e-9);
        assert!((coeffs.max_flow(1.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn three_point_fit_passes_through_all_points() {
        let pts = vec![(0.0, 50.0), (0.02, 45.0), (0.04, 30.0)];
        let coeffs = HeadCurveCoeffs::fit(&curve(pts.clone())).unwrap();
        for (q, h) in pts {
            assert!((coeffs.head(q, 1.0) - h).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_rising_curve() {
        let err = HeadCurveCoeffs::fit(&curve(vec![(0.0, 10.0), (0.1, 20.0), (0.2, 5.0)]));
        assert!(matches!(err, Err(NetworkError::InvalidCurve { .. })));
    }

    #[test]
    fn speed_scales_shutoff_head_quadratically() {
        let coeffs = HeadCurveCoeffs::fit(&curve(vec![(0.05, 30.0)])).unwrap();
        assert!((coeffs.head(0.0, 0.5) - 10.0).abs() < 1e-9);
    }
}
