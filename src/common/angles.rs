//! This module contains common constructs for working with angles and periodic values

use std::f64::consts::PI;

/// Re-expresses an angle, specified in radians, in the range [0, 2pi).  If the angle was already
/// in the range [0, 2pi), it is returned unchanged. The excess full turns are removed rather than
/// the angle being reset, so a continuously advancing angle stays continuous across the wrap.
///
/// # Arguments
///
/// * `angle`: The angle to re-express, in radians
///
/// returns: f64
///
/// # Examples
///
/// ```
/// use lidarsim::common::angle_to_2pi;
/// use std::f64::consts::PI;
/// use approx::assert_relative_eq;
/// let new_angle = angle_to_2pi(-PI);
/// assert_relative_eq!(new_angle, PI, epsilon = 1.0e-10);
/// ```
pub fn angle_to_2pi(angle: f64) -> f64 {
    let mut angle = angle % (2.0 * PI);
    if angle < 0.0 {
        angle += 2.0 * PI;
    }
    // The sum can round exactly onto 2pi when the remainder is a hair below zero
    if angle >= 2.0 * PI { 0.0 } else { angle }
}

/// Wraps a value into the range [0, 1), removing whole periods. Used for phase accumulators that
/// advance by a fraction of a period each tick.
///
/// # Arguments
///
/// * `value`: the value to wrap
///
/// returns: f64
pub fn wrap_unit(value: f64) -> f64 {
    let v = value % 1.0;
    let v = if v < 0.0 { v + 1.0 } else { v };
    if v >= 1.0 { 0.0 } else { v }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;
    use test_case::test_case;

    #[test_case(0.0, 0.0)]
    #[test_case(2.0 * PI, 0.0)]
    #[test_case(3.0 * PI, PI)]
    #[test_case(-PI / 2.0, 3.0 * PI / 2.0)]
    #[test_case(7.0 * PI, PI)]
    fn test_angle_to_2pi(angle: f64, expected: f64) {
        assert_relative_eq!(angle_to_2pi(angle), expected, epsilon = 1.0e-10);
    }

    #[test]
    fn wrap_stays_in_range() {
        let mut rng = rand::rng();
        for _ in 0..1000 {
            let a = rng.random_range(-100.0..100.0);
            let w = angle_to_2pi(a);
            assert!((0.0..2.0 * PI).contains(&w), "angle {} wrapped to {}", a, w);

            let p = wrap_unit(a);
            assert!((0.0..1.0).contains(&p), "phase {} wrapped to {}", a, p);
        }
    }

    #[test_case(0.25, 0.25)]
    #[test_case(1.25, 0.25)]
    #[test_case(-0.25, 0.75)]
    #[test_case(3.0, 0.0)]
    fn test_wrap_unit(value: f64, expected: f64) {
        assert_relative_eq!(wrap_unit(value), expected, epsilon = 1.0e-10);
    }
}
