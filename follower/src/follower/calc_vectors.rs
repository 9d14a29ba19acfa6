//! # Demand vector calculations
//!
//! [`FollowerLoops`] bundles the follower's feedback controllers and turns
//! the localisation state and path geometry into the three demand vectors
//! consumed by [`crate::kinematics::DriveVectorScaler`]: corrective
//! (centripetal plus translational), heading and drive.
//!
//! [`PathSample`] is a plain-data capture of everything a cycle needs from
//! the active path, taken once at the top of the update so the calculations
//! here never touch the path object itself.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use std::f64::consts::FRAC_PI_2;

// Internal
use crate::ctrl::{
    DualFilteredPidf, DualLoop, DualPidf, ErrorController, FilteredPidfController, KalmanFilter,
    PidfController,
};
use crate::geom::{Pose, Vector};
use crate::kinematics::DriveVectorScaler;
use crate::path::{ClosestPoint, Path};
use util::maths::{clamp, sign, smallest_angle_difference, turn_direction};

use super::params::FollowerParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything one update cycle needs to know about the active path.
#[derive(Debug, Clone, Copy)]
pub(super) struct PathSample {
    /// Closest-point query result for the current pose
    pub closest: ClosestPoint,

    /// Whether the closest point is still within the parametric start window
    pub at_start: bool,

    /// Whether the closest point is within the parametric end window
    pub at_end: bool,

    /// Total arc length of the path
    pub length: f64,

    /// Braking-distance multiplier for the drive loop
    pub zero_power_acceleration_multiplier: f64,

    /// Tangent at the end of the path
    pub end_tangent: Vector,

    /// Target position at `t = 1`
    pub last_control_point: Vector2<f64>,

    /// Heading goal at `t = 1`
    pub end_heading_goal: f64,

    /// End-of-path settle constraints
    pub end_velocity_constraint: f64,
    pub end_translational_constraint: f64,
    pub end_heading_constraint: f64,
    pub end_timeout_ms: f64,
}

/// The follower's feedback controllers and the vectors they most recently
/// produced.
///
/// The produced-vector fields are kept for telemetry; they are overwritten on
/// every cycle that runs the corresponding calculation.
pub(super) struct FollowerLoops {
    /// Translational dual loop
    translational: DualPidf,

    /// Translational integral controllers, run alongside the main loop and
    /// accumulated as vectors so the integral tracks direction changes
    translational_integral: PidfController,
    secondary_translational_integral: PidfController,
    translational_integral_vector: Vector,
    secondary_translational_integral_vector: Vector,
    previous_translational_integral: f64,
    previous_secondary_translational_integral: f64,

    /// Heading dual loop
    heading: DualPidf,

    /// Drive dual loop
    drive: DualFilteredPidf,

    /// Smoother for the raw drive velocity error
    drive_kalman: KalmanFilter,

    /// The two most recent filtered drive errors, oldest first, used to build
    /// the filter's process model projection
    drive_errors: [f64; 2],

    // Loop errors, for telemetry and completion checks
    pub translational_error: f64,
    pub heading_error: f64,
    pub drive_error: f64,

    // Most recently produced demand vectors
    pub translational_vector: Vector,
    pub heading_vector: Vector,
    pub drive_vector: Vector,
    pub centripetal_vector: Vector,
    pub corrective_vector: Vector,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathSample {
    /// Capture a sample of the given path at the given pose.
    pub fn sample(path: &dyn Path, pose: &Pose, search_steps: u32) -> Self {
        let closest = path.closest_point(pose, search_steps);

        Self {
            at_start: path.is_at_parametric_start(closest.t_value),
            at_end: path.is_at_parametric_end(closest.t_value),
            length: path.length(),
            zero_power_acceleration_multiplier: path.zero_power_acceleration_multiplier(),
            end_tangent: path.end_tangent(),
            last_control_point: path.last_control_point(),
            end_heading_goal: path.heading_goal(1f64),
            end_velocity_constraint: path.end_velocity_constraint(),
            end_translational_constraint: path.end_translational_constraint(),
            end_heading_constraint: path.end_heading_constraint(),
            end_timeout_ms: path.end_timeout_ms(),
            closest,
        }
    }
}

impl FollowerLoops {
    pub fn new(params: &FollowerParams) -> Self {
        Self {
            translational: DualLoop::new(
                PidfController::new(params.translational_pidf),
                PidfController::new(params.secondary_translational_pidf),
                params.translational_switch,
                params.use_secondary_translational,
                params.translational_feedforward,
                params.secondary_translational_feedforward,
            ),
            translational_integral: PidfController::new(params.translational_integral),
            secondary_translational_integral: PidfController::new(
                params.secondary_translational_integral,
            ),
            translational_integral_vector: Vector::zero(),
            secondary_translational_integral_vector: Vector::zero(),
            previous_translational_integral: 0f64,
            previous_secondary_translational_integral: 0f64,
            heading: DualLoop::new(
                PidfController::new(params.heading_pidf),
                PidfController::new(params.secondary_heading_pidf),
                params.heading_switch,
                params.use_secondary_heading,
                params.heading_feedforward,
                params.secondary_heading_feedforward,
            ),
            drive: DualLoop::new(
                FilteredPidfController::new(params.drive_pidf),
                FilteredPidfController::new(params.secondary_drive_pidf),
                params.drive_switch,
                params.use_secondary_drive,
                params.drive_feedforward,
                params.secondary_drive_feedforward,
            ),
            drive_kalman: KalmanFilter::new(params.drive_kalman),
            drive_errors: [0f64; 2],
            translational_error: 0f64,
            heading_error: 0f64,
            drive_error: 0f64,
            translational_vector: Vector::zero(),
            heading_vector: Vector::zero(),
            drive_vector: Vector::zero(),
            centripetal_vector: Vector::zero(),
            corrective_vector: Vector::zero(),
        }
    }

    /// Zero every controller and accumulator, ready for a fresh path.
    pub fn reset(&mut self) {
        self.translational.reset();
        self.translational_integral.reset();
        self.secondary_translational_integral.reset();
        self.translational_integral_vector = Vector::zero();
        self.secondary_translational_integral_vector = Vector::zero();
        self.previous_translational_integral = 0f64;
        self.previous_secondary_translational_integral = 0f64;
        self.heading.reset();
        self.drive.reset();
        self.drive_kalman.reset();
        self.drive_errors = [0f64; 2];
        self.translational_error = 0f64;
        self.heading_error = 0f64;
        self.drive_error = 0f64;
        self.translational_vector = Vector::zero();
        self.heading_vector = Vector::zero();
        self.drive_vector = Vector::zero();
        self.centripetal_vector = Vector::zero();
        self.corrective_vector = Vector::zero();
    }

    // -----------------------------------------------------------------------
    // LIVE TUNING
    // -----------------------------------------------------------------------

    pub fn set_translational_coefficients(&mut self, c: crate::ctrl::PidfCoefficients) {
        self.translational.primary_mut().set_coefficients(c);
    }

    pub fn set_secondary_translational_coefficients(&mut self, c: crate::ctrl::PidfCoefficients) {
        self.translational.secondary_mut().set_coefficients(c);
    }

    pub fn set_heading_coefficients(&mut self, c: crate::ctrl::PidfCoefficients) {
        self.heading.primary_mut().set_coefficients(c);
    }

    pub fn set_secondary_heading_coefficients(&mut self, c: crate::ctrl::PidfCoefficients) {
        self.heading.secondary_mut().set_coefficients(c);
    }

    pub fn set_drive_coefficients(&mut self, c: crate::ctrl::FilteredPidfCoefficients) {
        self.drive.primary_mut().set_coefficients(c);
    }

    pub fn set_secondary_drive_coefficients(&mut self, c: crate::ctrl::FilteredPidfCoefficients) {
        self.drive.secondary_mut().set_coefficients(c);
    }

    // -----------------------------------------------------------------------
    // DEMAND VECTOR CALCULATIONS
    // -----------------------------------------------------------------------

    /// Translational correction towards the closest point.
    ///
    /// In the middle of the path the component along the tangent is projected
    /// out (of both the error and the integral accumulators) so that
    /// progress along the path is left entirely to the drive loop; near the
    /// ends the full error is used so the robot actually settles onto the
    /// target point.
    pub fn translational_correction(
        &mut self,
        sample: &PathSample,
        pose: &Pose,
        max_power: f64,
        params: &FollowerParams,
    ) -> Vector {
        if !params.use_translational {
            self.translational_vector = Vector::zero();
            return self.translational_vector;
        }

        let mut translational = Vector::from_components(
            sample.closest.pose.x() - pose.x(),
            sample.closest.pose.y() - pose.y(),
        );

        if !(sample.at_end || sample.at_start) {
            let tangent_unit = sample.closest.tangent.normalised();
            let tangent_theta = sample.closest.tangent.theta();

            translational = translational
                - Vector::new(translational.dot(&tangent_unit), tangent_theta);
            self.translational_integral_vector = self.translational_integral_vector
                - Vector::new(
                    self.translational_integral_vector.dot(&tangent_unit),
                    tangent_theta,
                );
            self.secondary_translational_integral_vector = self
                .secondary_translational_integral_vector
                - Vector::new(
                    self.secondary_translational_integral_vector.dot(&tangent_unit),
                    tangent_theta,
                );
        }

        let error = translational.magnitude();
        let theta = translational.theta();
        self.translational_error = error;

        // Run whichever integral accumulator belongs to the loop the error
        // selects, folding its increment into the matching vector
        if self.translational.secondary_active(error) {
            self.secondary_translational_integral.update_error(error);
            let integral_out = self.secondary_translational_integral.run();
            self.secondary_translational_integral_vector = self
                .secondary_translational_integral_vector
                + Vector::new(
                    integral_out - self.previous_secondary_translational_integral,
                    theta,
                );
            self.previous_secondary_translational_integral = integral_out;
        } else {
            self.translational_integral.update_error(error);
            let integral_out = self.translational_integral.run();
            self.translational_integral_vector = self.translational_integral_vector
                + Vector::new(integral_out - self.previous_translational_integral, theta);
            self.previous_translational_integral = integral_out;
        }

        let secondary = self.translational.secondary_active(error);
        let out = self.translational.run(error) + self.translational.feedforward(error);
        translational = translational.with_magnitude(out);
        translational = translational
            + if secondary {
                self.secondary_translational_integral_vector
            } else {
                self.translational_integral_vector
            };

        translational =
            translational.with_magnitude(clamp(translational.magnitude(), 0f64, max_power));

        self.translational_vector = translational;
        translational
    }

    /// Heading correction towards the closest point's heading goal, applied
    /// along the robot's current heading so the scaler turns it into a
    /// moment.
    pub fn heading_correction(
        &mut self,
        sample: &PathSample,
        pose: &Pose,
        max_power: f64,
        params: &FollowerParams,
    ) -> Vector {
        if !params.use_heading {
            self.heading_vector = Vector::zero();
            return self.heading_vector;
        }

        let goal = sample.closest.pose.heading;
        let turn_dir: f64 = turn_direction(pose.heading, goal);

        self.heading_error = turn_dir * smallest_angle_difference(goal, pose.heading);

        let out = self.heading.run(self.heading_error)
            + turn_dir * self.heading.feedforward(self.heading_error);

        self.heading_vector = Vector::new(clamp(out, -max_power, max_power), pose.heading);
        self.heading_vector
    }

    /// Drive correction along the path tangent, regulating the robot's speed
    /// towards a braking profile that reaches zero at the end of the path.
    pub fn drive_correction(
        &mut self,
        sample: &PathSample,
        pose: &Pose,
        velocity: &Vector,
        max_power: f64,
        params: &FollowerParams,
    ) -> Vector {
        if !params.use_drive {
            self.drive_vector = Vector::zero();
            return self.drive_vector;
        }

        self.drive_error = self.drive_velocity_error(sample, pose, velocity, params);

        let out = clamp(
            self.drive.run(self.drive_error)
                + sign(self.drive_error) * self.drive.feedforward(self.drive_error),
            -max_power,
            max_power,
        );

        self.drive_vector = Vector::new(out, sample.closest.tangent.theta());
        self.drive_vector
    }

    /// Signed drive velocity error: target speed from the braking profile,
    /// minus predicted coasting decay, minus actual speed, resolved along the
    /// robot's forward and lateral axes and recombined along the tangent.
    /// The result is smoothed by the Kalman filter against a linear
    /// projection of its own last two outputs.
    fn drive_velocity_error(
        &mut self,
        sample: &PathSample,
        pose: &Pose,
        velocity: &Vector,
        params: &FollowerParams,
    ) -> f64 {
        // Remaining distance along the path; once past the parametric end,
        // the signed overshoot past the last control point
        let distance_to_goal = if !sample.at_end {
            sample.length * (1f64 - sample.closest.t_value)
        } else {
            let offset = Vector::from_components(
                pose.x() - sample.last_control_point[0],
                pose.y() - sample.last_control_point[1],
            );
            sample.end_tangent.dot(&offset)
        };

        let tangent_unit = sample.closest.tangent.normalised();
        let distance_vector = Vector::new(distance_to_goal, tangent_unit.theta());
        let velocity_along_path = Vector::new(velocity.dot(&tangent_unit), tangent_unit.theta());

        let forward_unit = Vector::new(1f64, pose.heading);
        let lateral_unit = Vector::new(1f64, pose.heading - FRAC_PI_2);

        let forward_error = Self::axis_velocity_error(
            &forward_unit,
            &distance_vector,
            &velocity_along_path,
            params.forward_zero_power_acceleration,
            sample.zero_power_acceleration_multiplier,
        );
        let lateral_error = Self::axis_velocity_error(
            &lateral_unit,
            &distance_vector,
            &velocity_along_path,
            params.lateral_zero_power_acceleration,
            sample.zero_power_acceleration_multiplier,
        );

        let error_vector = Vector::new(forward_error, forward_unit.theta())
            + Vector::new(lateral_error, lateral_unit.theta());

        let raw_error =
            error_vector.magnitude() * sign(error_vector.dot(&sample.closest.tangent));

        let projection = 2f64 * self.drive_errors[1] - self.drive_errors[0];
        self.drive_kalman.update(raw_error, projection);

        self.drive_errors[0] = self.drive_errors[1];
        self.drive_errors[1] = self.drive_kalman.state();

        self.drive_kalman.state()
    }

    /// Velocity error along one robot axis.
    fn axis_velocity_error(
        axis: &Vector,
        distance_vector: &Vector,
        velocity: &Vector,
        zero_power_acceleration: f64,
        multiplier: f64,
    ) -> f64 {
        let v = axis.dot(velocity);
        let d = axis.dot(distance_vector);

        // Speed the braking profile wants at this distance from the goal
        let velocity_goal =
            sign(d) * (-2f64 * multiplier * zero_power_acceleration * d).abs().sqrt();

        // Speed change the robot would see just by coasting. The distance
        // enters unsigned so the profile is symmetric about the tangent.
        let zero_power_decay =
            v - sign(d) * (v.powi(2) + 2f64 * zero_power_acceleration * d.abs()).abs().sqrt();

        velocity_goal - zero_power_decay - v
    }

    /// Centripetal correction for a known signed curvature and tangent.
    fn centripetal_from(
        &mut self,
        curvature: f64,
        tangent: &Vector,
        velocity: &Vector,
        max_power: f64,
        params: &FollowerParams,
    ) -> Vector {
        if !params.use_centripetal || !curvature.is_finite() {
            self.centripetal_vector = Vector::zero();
            return self.centripetal_vector;
        }

        let tangential_speed = velocity.dot(&tangent.normalised());
        let magnitude = clamp(
            params.centripetal_scaling * params.mass * tangential_speed.powi(2) * curvature,
            -max_power,
            max_power,
        );

        // Signed magnitude: a negative curvature flips the vector to the
        // other side of the tangent
        self.centripetal_vector = Vector::new(magnitude, tangent.theta() + FRAC_PI_2);
        self.centripetal_vector
    }

    /// Centripetal correction from the path's reported curvature.
    pub fn centripetal_correction(
        &mut self,
        sample: &PathSample,
        velocity: &Vector,
        max_power: f64,
        params: &FollowerParams,
    ) -> Vector {
        let tangent = sample.closest.tangent;
        self.centripetal_from(sample.closest.curvature, &tangent, velocity, max_power, params)
    }

    /// Centripetal correction in teleop, with the curvature estimated
    /// numerically from the averaged velocity and acceleration.
    pub fn teleop_centripetal_correction(
        &mut self,
        average_velocity: &Vector,
        average_acceleration: &Vector,
        velocity: &Vector,
        max_power: f64,
        params: &FollowerParams,
    ) -> Vector {
        let y_prime = average_velocity.y() / average_velocity.x();
        let y_double_prime = average_acceleration.y() / average_velocity.x();
        let curvature = y_double_prime / (1f64 + y_prime.powi(2)).powf(1.5);

        let tangent = *average_velocity;
        self.centripetal_from(curvature, &tangent, velocity, max_power, params)
    }

    /// Combined corrective demand: centripetal plus translational, with the
    /// translational part shrunk if the sum would exceed the power ceiling.
    pub fn corrective(
        &mut self,
        scaler: &DriveVectorScaler,
        sample: &PathSample,
        pose: &Pose,
        velocity: &Vector,
        max_power: f64,
        params: &FollowerParams,
    ) -> Vector {
        let centripetal = self.centripetal_correction(sample, velocity, max_power, params);
        let translational = self.translational_correction(sample, pose, max_power, params);

        let mut corrective = centripetal + translational;

        if corrective.magnitude() > max_power {
            corrective = centripetal
                + translational * scaler.find_normalizing_scaling(centripetal, translational);
        }

        self.corrective_vector = corrective;
        corrective
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
