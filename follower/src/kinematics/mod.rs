//! # Kinematics module
//!
//! Maps the follower's field-frame demand vectors onto the four mecanum wheel
//! powers. The three demands are prioritised: corrective power is granted in
//! full first, heading power is scaled to fit the remaining headroom, and
//! pathing (drive) power takes whatever is left.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use crate::geom::Vector;
use util::maths::clamp;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of drive wheels. Wheel indices throughout the crate are ordered
/// left-front, left-rear, right-front, right-rear.
pub const NUM_WHEELS: usize = 4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Combines corrective, heading and pathing demands into wheel powers.
///
/// The scaler is configured with the direction of the force vector produced
/// by the left-front wheel at full power; the other three wheel vectors
/// follow from mecanum symmetry (the rear-left and front-right rollers are
/// mirrored).
#[derive(Debug, Clone)]
pub struct DriveVectorScaler {
    /// Unit force vectors for each wheel, in the robot frame
    wheel_vectors: [Vector; NUM_WHEELS],

    /// Ceiling on any single demand vector and on the final wheel powers, in
    /// `[0, 1]`
    max_power_scaling: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveVectorScaler {
    /// Create a new scaler from the left-front wheel's force vector. The
    /// vector is normalised, only its direction matters.
    pub fn new(left_front_vector: Vector) -> Self {
        let lf = left_front_vector.normalised();
        let mirrored = Vector::new(lf.magnitude(), -lf.theta());

        Self {
            wheel_vectors: [lf, mirrored, mirrored, lf],
            max_power_scaling: 1f64,
        }
    }

    pub fn max_power_scaling(&self) -> f64 {
        self.max_power_scaling
    }

    /// Set the power ceiling, clamped into `[0, 1]`.
    pub fn set_max_power_scaling(&mut self, max_power_scaling: f64) {
        self.max_power_scaling = clamp(max_power_scaling, 0f64, 1f64);
    }

    /// Compute the four wheel powers for the given demand vectors.
    ///
    /// All demand vectors are in the field frame; `robot_heading` is used to
    /// rotate the wheel force vectors to match. Priority runs corrective,
    /// then heading, then pathing: each lower-priority demand is shrunk just
    /// enough that the per-side demand sums stay within the power ceiling.
    /// The returned powers are normalised so that no wheel exceeds the
    /// ceiling.
    pub fn get_drive_powers(
        &self,
        corrective_power: Vector,
        heading_power: Vector,
        pathing_power: Vector,
        robot_heading: f64,
    ) -> [f64; NUM_WHEELS] {
        let max = self.max_power_scaling;

        let corrective = Self::cap(corrective_power, max);
        let heading = Self::cap(heading_power, max);
        let pathing = Self::cap(pathing_power, max);

        // Demand sums for the left and right sides of the drivetrain. The
        // heading demand is applied with opposite sign on the two sides to
        // produce a turning moment.
        let (left_side, right_side) = if corrective.magnitude() == max {
            // Corrective power saturates the ceiling outright, nothing else
            // fits
            (corrective, corrective)
        } else {
            let left = corrective - heading;
            let right = corrective + heading;

            if left.magnitude() > max || right.magnitude() > max {
                // Shrink the heading demand until both sides fit
                let scaling = self
                    .find_normalizing_scaling(corrective, heading)
                    .min(self.find_normalizing_scaling(corrective, -heading));
                (corrective - heading * scaling, corrective + heading * scaling)
            } else {
                let left_with_pathing = left + pathing;
                let right_with_pathing = right + pathing;

                if left_with_pathing.magnitude() > max || right_with_pathing.magnitude() > max {
                    // Shrink the pathing demand until both sides fit
                    let scaling = self
                        .find_normalizing_scaling(left, pathing)
                        .min(self.find_normalizing_scaling(right, pathing));
                    (left + pathing * scaling, right + pathing * scaling)
                } else {
                    (left_with_pathing, right_with_pathing)
                }
            }
        };

        // Each side's demand is split between two wheels, so double it before
        // decomposing
        let left_target = left_side * 2f64;
        let right_target = right_side * 2f64;

        // Rotate the wheel force vectors into the field frame
        let w: Vec<Vector> = self
            .wheel_vectors
            .iter()
            .map(|v| v.rotated(robot_heading))
            .collect();

        let mut powers = [
            Self::solve(&w[1], &w[0], &left_target),
            Self::solve(&w[0], &w[1], &left_target),
            Self::solve(&w[3], &w[2], &right_target),
            Self::solve(&w[2], &w[3], &right_target),
        ];

        // Normalise so no wheel exceeds the ceiling
        let wheel_max = powers.iter().fold(0f64, |acc, p| acc.max(p.abs()));
        if wheel_max > max {
            for p in powers.iter_mut() {
                *p *= max / wheel_max;
            }
        }

        powers
    }

    /// Largest scale factor `s` such that `|static_vector + s *
    /// variable_vector|` equals the power ceiling.
    ///
    /// Assumes the static vector is already within the ceiling; the result is
    /// the positive root of the corresponding quadratic. Degenerate inputs (a
    /// zero variable vector) produce a non-finite result which callers must
    /// not feed back into a demand vector.
    pub fn find_normalizing_scaling(&self, static_vector: Vector, variable_vector: Vector) -> f64 {
        let a = variable_vector.x().powi(2) + variable_vector.y().powi(2);
        let b = static_vector.x() * variable_vector.x() + static_vector.y() * variable_vector.y();
        let c = static_vector.x().powi(2) + static_vector.y().powi(2)
            - self.max_power_scaling.powi(2);

        (-b + (b.powi(2) - a * c).sqrt()) / a
    }

    /// Clamp a demand vector's magnitude to `max`.
    fn cap(v: Vector, max: f64) -> Vector {
        if v.magnitude() > max {
            v.with_magnitude(max)
        } else {
            v
        }
    }

    /// Coefficient of `basis` in the decomposition of `target` onto the
    /// non-orthogonal basis `{basis, other}`, by Cramer's rule.
    fn solve(other: &Vector, basis: &Vector, target: &Vector) -> f64 {
        (other.x() * target.y() - target.x() * other.y())
            / (other.x() * basis.y() - basis.x() * other.y())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn scaler() -> DriveVectorScaler {
        // Direction from typical forward/lateral top speeds
        DriveVectorScaler::new(Vector::from_components(81.34056, -65.43028))
    }

    #[test]
    fn test_pure_forward_drives_all_wheels_equally() {
        let s = scaler();
        let powers = s.get_drive_powers(
            Vector::zero(),
            Vector::zero(),
            Vector::new(0.5, 0f64),
            0f64,
        );

        for p in powers.iter() {
            assert!(*p > 0f64);
            assert!((p - powers[0]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pure_rotation_splits_sides() {
        let s = scaler();
        let powers = s.get_drive_powers(
            Vector::zero(),
            Vector::new(0.5, 0f64),
            Vector::zero(),
            0f64,
        );

        // Left side reversed, right side forward
        assert!(powers[0] < 0f64 && powers[1] < 0f64);
        assert!(powers[2] > 0f64 && powers[3] > 0f64);
    }

    #[test]
    fn test_powers_never_exceed_ceiling() {
        let s = scaler();
        let angles = [0f64, 0.7, 1.9, -2.4, PI];
        for &ca in angles.iter() {
            for &ha in angles.iter() {
                for &pa in angles.iter() {
                    let powers = s.get_drive_powers(
                        Vector::new(0.9, ca),
                        Vector::new(0.8, ha),
                        Vector::new(1.5, pa),
                        0.3,
                    );
                    for p in powers.iter() {
                        assert!(p.abs() <= 1f64 + 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn test_reduced_ceiling_respected() {
        let mut s = scaler();
        s.set_max_power_scaling(0.4);
        let powers = s.get_drive_powers(
            Vector::new(1f64, 1f64),
            Vector::new(1f64, 0f64),
            Vector::new(1f64, -1f64),
            0f64,
        );
        for p in powers.iter() {
            assert!(p.abs() <= 0.4 + 1e-9);
        }
    }

    #[test]
    fn test_max_power_scaling_clamped() {
        let mut s = scaler();
        s.set_max_power_scaling(3f64);
        assert_eq!(s.max_power_scaling(), 1f64);
        s.set_max_power_scaling(-1f64);
        assert_eq!(s.max_power_scaling(), 0f64);
    }

    #[test]
    fn test_normalizing_scaling_lands_on_ceiling() {
        let s = scaler();
        let fixed = Vector::new(0.5, 0.3);
        let variable = Vector::new(1f64, 2f64);
        let scale = s.find_normalizing_scaling(fixed, variable);
        let combined = fixed + variable * scale;
        assert!((combined.magnitude() - 1f64).abs() < 1e-9);
    }
}
