//! Smoothed piecewise relations used by demand and leak constraints.
//!
//! Each relation joins its pieces with cubic Hermite segments so residuals
//! and derivatives stay continuous through the breakpoints.

use wf_aml::Expr;
use wf_core::units::constants::G;

/// Width (m) of the smoothing segments at each end of the pressure band.
pub const PDD_SMOOTHING: f64 = 0.2;

/// Pressure (m) below which the leak orifice law is smoothed to zero.
pub const LEAK_SMOOTHING: f64 = 0.1;

/// Cubic Hermite segment on `[x0, x1]` evaluated at `x`.
fn hermite_expr(x: Expr, x0: f64, x1: f64, y0: f64, m0: f64, y1: f64, m1: f64) -> Expr {
    let h = x1 - x0;
    let t = (x - x0) / h;
    let t2 = t.clone().powf(2.0);
    let t3 = t.clone().powf(3.0);
    // h00 = 2t³ - 3t² + 1, h10 = t³ - 2t² + t, h01 = -2t³ + 3t², h11 = t³ - t²
    let h00 = t3.clone() * 2.0 - t2.clone() * 3.0 + 1.0;
    let h10 = t3.clone() - t2.clone() * 2.0 + t;
    let h01 = t2.clone() * 3.0 - t3.clone() * 2.0;
    let h11 = t3 - t2;
    h00 * y0 + h10 * (h * m0) + h01 * y1 + h11 * (h * m1)
}

fn hermite(x: f64, x0: f64, x1: f64, y0: f64, m0: f64, y1: f64, m1: f64) -> f64 {
    let h = x1 - x0;
    let t = (x - x0) / h;
    let (t2, t3) = (t * t, t * t * t);
    (2.0 * t3 - 3.0 * t2 + 1.0) * y0
        + (t3 - 2.0 * t2 + t) * h * m0
        + (-2.0 * t3 + 3.0 * t2) * y1
        + (t3 - t2) * h * m1
}

/// Wagner pressure-demand curve with smoothed breakpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureDemand {
    pub minimum: f64,
    pub required: f64,
    pub exponent: f64,
}

impl PressureDemand {
    fn delta(&self) -> f64 {
        PDD_SMOOTHING.min(0.25 * (self.required - self.minimum))
    }

    fn raw(&self, p: f64) -> f64 {
        ((p - self.minimum) / (self.required - self.minimum)).powf(self.exponent)
    }

    fn raw_slope(&self, p: f64) -> f64 {
        let range = self.required - self.minimum;
        self.exponent / range * ((p - self.minimum) / range).powf(self.exponent - 1.0)
    }

    /// Fraction of the requested demand delivered at pressure `p`.
    pub fn fraction(&self, p: f64) -> f64 {
        let d = self.delta();
        let lo = self.minimum + d;
        let hi = self.required - d;
        if p <= self.minimum {
            0.0
        } else if p < lo {
            hermite(p, self.minimum, lo, 0.0, 0.0, self.raw(lo), self.raw_slope(lo))
        } else if p < hi {
            self.raw(p)
        } else if p < self.required {
            hermite(p, hi, self.required, self.raw(hi), self.raw_slope(hi), 1.0, 0.0)
        } else {
            1.0
        }
    }

    /// Expression form of [`PressureDemand::fraction`].
    pub fn fraction_expr(&self, p: Expr) -> Expr {
        let d = self.delta();
        let lo = self.minimum + d;
        let hi = self.required - d;
        let range = self.required - self.minimum;
        let power = ((p.clone() - self.minimum) / range).powf(self.exponent);
        let upper = Expr::if_negative(
            p.clone() - self.required,
            hermite_expr(
                p.clone(),
                hi,
                self.required,
                self.raw(hi),
                self.raw_slope(hi),
                1.0,
                0.0,
            ),
            Expr::constant(1.0),
        );
        let middle = Expr::if_negative(p.clone() - hi, power, upper);
        let lower = Expr::if_negative(
            p.clone() - lo,
            hermite_expr(
                p.clone(),
                self.minimum,
                lo,
                0.0,
                0.0,
                self.raw(lo),
                self.raw_slope(lo),
            ),
            middle,
        );
        Expr::if_negative(p - self.minimum, Expr::zero(), lower)
    }
}

/// Leak outflow `cd * area * sqrt(2 g p)`, zero for non-positive pressure.
pub fn leak_flow(p: f64, area: f64, discharge_coeff: f64) -> f64 {
    let k = discharge_coeff * area * (2.0 * G).sqrt();
    if p <= 0.0 {
        0.0
    } else if p < LEAK_SMOOTHING {
        let y1 = k * LEAK_SMOOTHING.sqrt();
        let m1 = 0.5 * k / LEAK_SMOOTHING.sqrt();
        hermite(p, 0.0, LEAK_SMOOTHING, 0.0, 0.0, y1, m1)
    } else {
        k * p.sqrt()
    }
}

/// Expression form of [`leak_flow`].
pub fn leak_flow_expr(p: Expr, area: f64, discharge_coeff: f64) -> Expr {
    let k = discharge_coeff * area * (2.0 * G).sqrt();
    let y1 = k * LEAK_SMOOTHING.sqrt();
    let m1 = 0.5 * k / LEAK_SMOOTHING.sqrt();
    Expr::if_negative(
        p.clone(),
        Expr::zero(),
        Expr::if_negative(
            p.clone() - LEAK_SMOOTHING,
            hermite_expr(p.clone(), 0.0, LEAK_SMOOTHING, 0.0, 0.0, y1, m1),
            p.sqrt() * k,
        ),
    )
}
