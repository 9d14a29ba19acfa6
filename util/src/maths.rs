//! Utility maths functions
//!
//! Mostly small generic numeric helpers, plus the angle arithmetic used by
//! the heading control loops. All angles are in radians.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Clamp a value between a minimum and a maximum.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Get the sign of a value as `1`, `-1`, or `0` for exact zero.
///
/// Differs from `Float::signum` in the zero case, which matters when a
/// feedforward term is scaled by the sign of an error that may be exactly
/// zero after a reset.
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value == T::zero() {
        return T::zero();
    }

    value.signum()
}

/// Check two values for equality within a given tolerance.
pub fn roughly_equals<T>(a: T, b: T, tolerance: T) -> bool
where
    T: Float
{
    (a - b).abs() < tolerance
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() { r + rhs.abs() } else { r }
}

/// Normalise an angle into the range [0, 2pi).
pub fn norm_angle_2pi<T>(angle: T) -> T
where
    T: Float
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    rem_euclid(angle, tau_t)
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_angle<T>(angle: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let a = rem_euclid(angle, tau_t);

    if a > pi_t {
        a - tau_t
    }
    else {
        a
    }
}

/// Get the unsigned smallest difference between two angles.
///
/// The result is in the range [0, pi] and accounts for wrapping, so the
/// difference between 0.1 and 2pi - 0.1 is 0.2.
pub fn smallest_angle_difference<T>(a: T, b: T) -> T
where
    T: Float
{
    let c = norm_angle_2pi(a - b);
    let d = norm_angle_2pi(b - a);

    if c < d {
        c
    }
    else {
        d
    }
}

/// Get the direction of the shortest turn from one heading to another.
///
/// Returns `1` for a counter-clockwise turn and `-1` for a clockwise turn.
pub fn turn_direction<T>(from: T, to: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();

    if norm_angle_2pi(to - from) <= pi_t {
        T::one()
    }
    else {
        -T::one()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;
    const TAU: f64 = std::f64::consts::TAU;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(0f64)).abs() < 1e-12);
        assert!((wrap_angle(PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(TAU + 1f64) - 1f64).abs() < 1e-12);
        assert!((wrap_angle(-0.5f64) + 0.5f64).abs() < 1e-12);
        assert!((wrap_angle(3f64 * PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_smallest_angle_difference() {
        assert!((smallest_angle_difference(1f64, 2f64) - 1f64).abs() < 1e-12);
        assert!((smallest_angle_difference(2f64, 1f64) - 1f64).abs() < 1e-12);
        assert!((smallest_angle_difference(0f64, TAU)).abs() < 1e-12);
        assert!(
            (smallest_angle_difference(0.1f64, TAU - 0.1f64) - 0.2f64).abs()
            < 1e-12
        );
        assert!((smallest_angle_difference(-PI, PI)).abs() < 1e-12);
    }

    #[test]
    fn test_turn_direction() {
        assert_eq!(turn_direction(0f64, 1f64), 1f64);
        assert_eq!(turn_direction(1f64, 0f64), -1f64);
        // Wrapping: from just below +pi to just above -pi the shortest turn
        // is counter-clockwise.
        assert_eq!(turn_direction(PI - 0.1, -PI + 0.1), 1f64);
        assert_eq!(turn_direction(-PI + 0.1, PI - 0.1), -1f64);
    }

    #[test]
    fn test_lin_map() {
        // Unit interval onto an arbitrary range, including extrapolation
        // beyond the source endpoints.
        assert_eq!(lin_map((0f64, 1f64), (0f64, 10f64), 0.5f64), 5f64);
        assert_eq!(lin_map((0f64, 1f64), (-1f64, 1f64), 0f64), -1f64);
        assert_eq!(lin_map((0f64, 1f64), (-1f64, 1f64), 1f64), 1f64);
        assert_eq!(lin_map((0f64, 1f64), (0f64, 10f64), 1.5f64), 15f64);
        // Inverted target range
        assert_eq!(lin_map((0f64, 2f64), (1f64, 0f64), 0.5f64), 0.75f64);
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(2.5f64), 1f64);
        assert_eq!(sign(-0.1f64), -1f64);
        assert_eq!(sign(0f64), 0f64);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2f64, -1f64, 1f64), 1f64);
        assert_eq!(clamp(-2f64, -1f64, 1f64), -1f64);
        assert_eq!(clamp(0.5f64, -1f64, 1f64), 0.5f64);
    }
}
