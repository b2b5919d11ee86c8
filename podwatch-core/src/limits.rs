//! Safety-limit evaluation.

use podwatch_types::{BreachLevel, Measurement};

/// Decide whether `value` breaches the measurement's limits.
///
/// The critical range always wins. Bounds are inclusive: a value equal to a
/// bound is within it.
pub fn evaluate(measurement: &Measurement, value: f64) -> BreachLevel {
    let limits = &measurement.limits;
    if value < limits.critical.low || value > limits.critical.high {
        return BreachLevel::Critical;
    }
    match limits.warning {
        Some(warning) if value < warning.low || value > warning.high => BreachLevel::Warning,
        _ => BreachLevel::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podwatch_types::{Limits, Range};

    fn velocity() -> Measurement {
        Measurement::builder("velocity")
            .limits(Limits::new(Range::new(0.0, 100.0)).with_warning(Range::new(10.0, 90.0)))
            .build()
    }

    #[test]
    fn levels_across_the_range() {
        let m = velocity();
        assert_eq!(evaluate(&m, 50.0), BreachLevel::None);
        assert_eq!(evaluate(&m, 95.0), BreachLevel::Warning);
        assert_eq!(evaluate(&m, 5.0), BreachLevel::Warning);
        assert_eq!(evaluate(&m, 150.0), BreachLevel::Critical);
        assert_eq!(evaluate(&m, -1.0), BreachLevel::Critical);
    }

    #[test]
    fn bounds_are_inclusive() {
        let m = velocity();
        assert_eq!(evaluate(&m, 0.0), BreachLevel::Warning);
        assert_eq!(evaluate(&m, 100.0), BreachLevel::Warning);
        assert_eq!(evaluate(&m, 10.0), BreachLevel::None);
        assert_eq!(evaluate(&m, 90.0), BreachLevel::None);
    }

    #[test]
    fn no_warning_range() {
        let m = Measurement::builder("temperature")
            .limits(Limits::new(Range::new(-20.0, 80.0)))
            .build();
        assert_eq!(evaluate(&m, 79.9), BreachLevel::None);
        assert_eq!(evaluate(&m, 80.1), BreachLevel::Critical);
    }

    #[test]
    fn critical_wins_over_wider_warning() {
        let m = Measurement::builder("velocity")
            .limits(Limits::new(Range::new(0.0, 100.0)).with_warning(Range::new(-50.0, 150.0)))
            .build();
        assert_eq!(evaluate(&m, 120.0), BreachLevel::Critical);
        assert_eq!(evaluate(&m, -10.0), BreachLevel::Critical);
        assert_eq!(evaluate(&m, 50.0), BreachLevel::None);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let m = velocity();
        for value in [-1e9, -1.0, 0.0, 9.99, 50.0, 90.01, 100.0, 1e9] {
            assert_eq!(evaluate(&m, value), evaluate(&m, value));
        }
    }
}
