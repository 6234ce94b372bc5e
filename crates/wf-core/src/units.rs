// wf-core/src/units.rs

use uom::si::f64::{
    Area as UomArea, Length as UomLength, Power as UomPower, Pressure as UomPressure,
    Time as UomTime, Velocity as UomVelocity, VolumeRate as UomVolumeRate,
};

// Public canonical unit types (SI, f64)
pub type Area = UomArea;
pub type Length = UomLength;
pub type Power = UomPower;
pub type Pressure = UomPressure;
pub type Time = UomTime;
pub type Velocity = UomVelocity;
pub type VolumeRate = UomVolumeRate;

#[inline]
pub fn m(v: f64) -> Length {
    use uom::si::length::meter;
    Length::new::<meter>(v)
}

#[inline]
pub fn mm(v: f64) -> Length {
    use uom::si::length::millimeter;
    Length::new::<millimeter>(v)
}

/// Cubic meters per second.
#[inline]
pub fn cms(v: f64) -> VolumeRate {
    use uom::si::volume_rate::cubic_meter_per_second;
    VolumeRate::new::<cubic_meter_per_second>(v)
}

#[inline]
pub fn lps(v: f64) -> VolumeRate {
    use uom::si::volume_rate::liter_per_second;
    VolumeRate::new::<liter_per_second>(v)
}

#[inline]
pub fn s(v: f64) -> Time {
    use uom::si::time::second;
    Time::new::<second>(v)
}

#[inline]
pub fn hours(v: f64) -> Time {
    use uom::si::time::hour;
    Time::new::<hour>(v)
}

#[inline]
pub fn kw(v: f64) -> Power {
    use uom::si::power::kilowatt;
    Power::new::<kilowatt>(v)
}

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

pub mod constants {
    /// Gravitational acceleration used by the hydraulic laws (m/s²).
    pub const G: f64 = 9.81;
    /// Water density (kg/m³).
    pub const WATER_DENSITY: f64 = 1000.0;
    pub const SECONDS_PER_DAY: f64 = 86_400.0;
}

/// Convert a pressure head (m of water) to a pressure.
pub fn head_to_pressure(head_m: f64) -> Pressure {
    pa(head_m * constants::WATER_DENSITY * constants::G)
}

/// Convert a pressure to a pressure head (m of water).
pub fn pressure_to_head(p: Pressure) -> f64 {
    p.value / (constants::WATER_DENSITY * constants::G)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_use_si_base_values() {
        assert_eq!(m(2.0).value, 2.0);
        assert!((mm(300.0).value - 0.3).abs() < 1e-12);
        assert!((lps(10.0).value - 0.01).abs() < 1e-12);
        assert_eq!(hours(1.0).value, 3600.0);
        assert_eq!(kw(2.0).value, 2000.0);
    }

    #[test]
    fn head_pressure_round_trip() {
        let p = head_to_pressure(10.0);
        assert!((p.value - 98_100.0).abs() < 1e-6);
        assert!((pressure_to_head(p) - 10.0).abs() < 1e-12);
    }
}
