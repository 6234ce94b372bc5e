//! Headloss laws for pipes, valves and pumps.
//!
//! Flows are in m³/s, lengths in metres and heads in metres of water.

use std::f64::consts::PI;

use wf_aml::Expr;
use wf_core::signed_pow;
use wf_core::units::constants::G;

/// Hazen-Williams flow exponent.
pub const HW_EXPONENT: f64 = 1.852;

/// Below this flow magnitude, power-law headloss is replaced by a cubic
/// that matches value and slope at the boundary.
pub const REGULARIZATION_FLOW: f64 = 2.0e-4;

/// Smallest loss coefficient installed for an open valve.
pub const MIN_VALVE_LOSS: f64 = 0.01;

/// Hazen-Williams resistance: `h = r * q^1.852`.
pub fn hazen_williams_resistance(length: f64, diameter: f64, c_factor: f64) -> f64 {
    10.667 * length / (c_factor.powf(HW_EXPONENT) * diameter.powf(4.871))
}

/// Darcy-Weisbach resistance for a given friction factor: `h = r * q^2`.
pub fn darcy_resistance(length: f64, diameter: f64, friction: f64) -> f64 {
    8.0 * friction * length / (G * PI * PI * diameter.powi(5))
}

/// Minor loss coefficient K converted to `h = m * q^2`.
pub fn minor_loss_coefficient(k: f64, diameter: f64) -> f64 {
    8.0 * k / (G * PI * PI * diameter.powi(4))
}

/// Darcy friction factor: laminar below Re 2000, Swamee-Jain above.
pub fn friction_factor(flow: f64, diameter: f64, roughness: f64, viscosity: f64) -> f64 {
    let area = PI * diameter * diameter / 4.0;
    let re = (flow.abs() / area * diameter / viscosity).max(1.0);
    if re < 2000.0 {
        return 64.0 / re;
    }
    let a = roughness / (3.7 * diameter);
    let b = 5.74 / re.powf(0.9);
    (0.25 / (a + b).log10().powi(2)).max(1.0e-4)
}

fn cubic_coeffs(n: f64, q_l: f64) -> (f64, f64) {
    let a = 0.5 * (3.0 - n) * q_l.powf(n - 1.0);
    let b = 0.5 * (n - 1.0) * q_l.powf(n - 3.0);
    (a, b)
}

/// `sign(q)|q|^n` with a C1 cubic `a q + b q³` for `|q| < q_l`.
pub fn regularized_power(q: f64, n: f64, q_l: f64) -> f64 {
    if q.abs() < q_l {
        let (a, b) = cubic_coeffs(n, q_l);
        a * q + b * q * q * q
    } else {
        signed_pow(q, n)
    }
}

/// Expression form of [`regularized_power`].
pub fn regularized_power_expr(q: Expr, n: f64, q_l: f64) -> Expr {
    let (a, b) = cubic_coeffs(n, q_l);
    Expr::if_negative(
        q.clone().abs() - q_l,
        q.clone() * a + q.clone().powf(3.0) * b,
        q.signed_pow(n),
    )
}

/// Pipe headloss expression `r * f_n(q) + m * f_2(q)` from start to end.
pub fn pipe_headloss_expr(q: Expr, resistance: Expr, exponent: f64, minor: f64) -> Expr {
    let friction = resistance * regularized_power_expr(q.clone(), exponent, REGULARIZATION_FLOW);
    if minor > 0.0 {
        friction + regularized_power_expr(q, 2.0, REGULARIZATION_FLOW) * minor
    } else {
        friction
    }
}

/// Numeric pipe headloss, matching [`pipe_headloss_expr`].
pub fn pipe_headloss(q: f64, resistance: f64, exponent: f64, minor: f64) -> f64 {
    resistance * regularized_power(q, exponent, REGULARIZATION_FLOW)
        + minor * regularized_power(q, 2.0, REGULARIZATION_FLOW)
}
