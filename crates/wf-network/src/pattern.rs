//! Cyclic multiplier patterns.

use wf_core::PatternId;

/// A named list of multipliers, each held for one pattern timestep and
/// repeated cyclically.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub id: PatternId,
    pub name: String,
    pub multipliers: Vec<f64>,
}

impl Pattern {
    /// Multiplier in effect at `time_s`.
    ///
    /// An empty pattern behaves as a constant 1.0.
    pub fn multiplier_at(&self, time_s: f64, pattern_timestep_s: f64) -> f64 {
        if self.multipliers.is_empty() || pattern_timestep_s <= 0.0 {
            return 1.0;
        }
        let period = (time_s.max(0.0) / pattern_timestep_s).floor() as usize;
        self.multipliers[period % self.multipliers.len()]
    }

    /// Seconds from `time_s` until the multiplier next changes.
    pub fn time_to_next_step(&self, time_s: f64, pattern_timestep_s: f64) -> Option<f64> {
        if self.multipliers.len() < 2 || pattern_timestep_s <= 0.0 {
            return None;
        }
        let next = ((time_s / pattern_timestep_s).floor() + 1.0) * pattern_timestep_s;
        Some(next - time_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(multipliers: Vec<f64>) -> Pattern {
        Pattern {
            id: PatternId::from_index(0),
            name: "pat".into(),
            multipliers,
        }
    }

    #[test]
    fn multiplier_wraps_around() {
        let p = pattern(vec![0.5, 1.0, 1.5]);
        assert_eq!(p.multiplier_at(0.0, 3600.0), 0.5);
        assert_eq!(p.multiplier_at(3599.0, 3600.0), 0.5);
        assert_eq!(p.multiplier_at(7200.0, 3600.0), 1.5);
        assert_eq!(p.multiplier_at(3.0 * 3600.0, 3600.0), 0.5);
    }

    #[test]
    fn empty_pattern_is_unity() {
        assert_eq!(pattern(vec![]).multiplier_at(1234.0, 3600.0), 1.0);
    }

    #[test]
    fn next_step_boundary() {
        let p = pattern(vec![1.0, 2.0]);
        assert_eq!(p.time_to_next_step(1800.0, 3600.0), Some(1800.0));
        assert_eq!(pattern(vec![1.0]).time_to_next_step(0.0, 3600.0), None);
    }
}
