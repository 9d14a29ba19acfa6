//! # Update cycle
//!
//! One call to [`Follower::update`] runs one control cycle: pull new
//! localisation data, compute the demand vectors for the current mode, map
//! them to wheel powers, run end-of-path bookkeeping, and record a telemetry
//! snapshot. The caller is expected to run this at its control rate; nothing
//! here blocks or sleeps.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::time::Instant;

// Internal
use crate::geom::{Pose, Vector};
use crate::kinematics::NUM_WHEELS;
use util::maths::{clamp, smallest_angle_difference};

use super::calc_vectors::PathSample;
use super::{Follower, FollowerError, FollowerMode};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Follower {
    /// Run one control cycle.
    pub fn update(&mut self) -> Result<(), FollowerError> {
        self.estimator.update();

        if self.estimator.is_degenerate() {
            warn!("Pose estimate is degenerate");
        }

        let pose = self.estimator.pose();
        let velocity = self.estimator.velocity();

        match self.mode {
            FollowerMode::Idle => (),
            FollowerMode::HoldingPoint => self.update_holding(&pose)?,
            FollowerMode::FollowingPath | FollowerMode::FollowingChain => {
                self.update_following(&pose, &velocity)?
            }
            FollowerMode::TeleopDrive => self.update_teleop(&pose, &velocity),
        }

        self.record_snapshot(&pose, &velocity);
        Ok(())
    }

    /// Cycle body for [`FollowerMode::HoldingPoint`].
    fn update_holding(&mut self, pose: &Pose) -> Result<(), FollowerError> {
        let sample = match self.current_path.as_deref() {
            Some(path) => PathSample::sample(path, pose, self.params.search_steps),
            None => return Err(FollowerError::NoActivePath(self.mode)),
        };
        self.closest = Some(sample.closest);

        let max_power = self.scaler.max_power_scaling();

        // Hold corrections are damped so the robot settles rather than
        // oscillating around the held pose
        let translational = self
            .loops
            .translational_correction(&sample, pose, max_power, &self.params)
            * self.params.hold_point_translational_scaling;
        let heading = self
            .loops
            .heading_correction(&sample, pose, max_power, &self.params)
            * self.params.hold_point_heading_scaling;

        let powers =
            self.scaler
                .get_drive_powers(translational, heading, Vector::zero(), pose.heading);
        self.apply_drive_powers(powers, self.params.use_voltage_compensation);

        if self.turning
            && self.loops.heading_error.abs() < self.params.turn_heading_error_threshold
        {
            self.turning = false;
            info!("Turn complete");
        }

        Ok(())
    }

    /// Cycle body for the two path-following modes.
    fn update_following(&mut self, pose: &Pose, velocity: &Vector) -> Result<(), FollowerError> {
        let sample = match self.mode {
            FollowerMode::FollowingChain => {
                let chain = self
                    .current_chain
                    .as_ref()
                    .ok_or(FollowerError::NoActivePath(self.mode))?;
                PathSample::sample(chain.path(self.chain_index), pose, self.params.search_steps)
            }
            _ => {
                let path = self
                    .current_path
                    .as_deref()
                    .ok_or(FollowerError::NoActivePath(self.mode))?;
                PathSample::sample(path, pose, self.params.search_steps)
            }
        };
        self.closest = Some(sample.closest);

        let chain_size = self.current_chain.as_ref().map(|c| c.size()).unwrap_or(0);
        let on_final_segment =
            self.mode != FollowerMode::FollowingChain || self.chain_index + 1 >= chain_size;

        if self.mode == FollowerMode::FollowingChain {
            if let Some(chain) = self.current_chain.as_mut() {
                chain.process_callbacks(
                    self.chain_index,
                    sample.closest.t_value,
                    &self.segment_start_times,
                );
            }
        }

        let max_power = self.scaler.max_power_scaling();

        // On non-final chain segments there is no point decelerating, so the
        // drive demand is simply full power along the tangent
        let drive = if !self.params.use_drive {
            self.loops.drive_vector = Vector::zero();
            Vector::zero()
        } else if on_final_segment {
            self.loops
                .drive_correction(&sample, pose, velocity, max_power, &self.params)
        } else {
            let v = Vector::new(max_power, sample.closest.tangent.theta());
            self.loops.drive_vector = v;
            v
        };

        let heading = self
            .loops
            .heading_correction(&sample, pose, max_power, &self.params);
        let corrective =
            self.loops
                .corrective(&self.scaler, &sample, pose, velocity, max_power, &self.params);

        let powers = self
            .scaler
            .get_drive_powers(corrective, heading, drive, pose.heading);
        self.apply_drive_powers(powers, self.params.use_voltage_compensation);

        // Stall detection: once past most of the path, a robot that has
        // stopped moving starts a one-shot timer which eventually forces the
        // path to complete
        if self.stall_start_time.is_none()
            && velocity.magnitude() < self.params.stall_velocity_threshold
            && sample.closest.t_value > self.params.stall_t_value_threshold
        {
            self.stall_start_time = Some(Instant::now());
            debug!(
                "Velocity stalled at t = {:.3}, starting stall timer",
                sample.closest.t_value
            );
        }

        let stall_expired = self
            .stall_start_time
            .map(|t| t.elapsed().as_secs_f64() * 1e3 > self.params.stall_timeout_ms)
            .unwrap_or(false);

        if sample.at_end || stall_expired {
            if on_final_segment {
                if self.reached_end_time.is_none() {
                    self.reached_end_time = Some(Instant::now());
                    debug!("Parametric end of path reached, settling");
                }

                let timed_out = self
                    .reached_end_time
                    .map(|t| t.elapsed().as_secs_f64() * 1e3 > sample.end_timeout_ms)
                    .unwrap_or(false);

                // The heading tolerance is checked against the closest
                // point's heading goal, not the end heading, so a stall
                // forcing completion mid-path settles against the goal the
                // heading loop was actually chasing
                let settled = velocity.magnitude() < sample.end_velocity_constraint
                    && pose.distance_to(&sample.closest.pose)
                        < sample.end_translational_constraint
                    && smallest_angle_difference(pose.heading, sample.closest.pose.heading)
                        < sample.end_heading_constraint;

                if settled || timed_out {
                    self.finish_following(&sample);
                }
            } else {
                self.advance_segment();
            }
        }

        Ok(())
    }

    /// Cycle body for [`FollowerMode::TeleopDrive`].
    fn update_teleop(&mut self, pose: &Pose, velocity: &Vector) {
        // Advance the velocity window and derive acceleration from the
        // difference between its newer and older halves
        self.velocities.push_back(*velocity);
        while self.velocities.len() > self.params.velocity_sample_count.max(1) {
            self.velocities.pop_front();
        }

        let (average_velocity, average_previous_velocity) = window_halves(&self.velocities);
        let acceleration = average_velocity - average_previous_velocity;

        self.accelerations.push_back(acceleration);
        while self.accelerations.len() > self.params.velocity_sample_count.max(1) {
            self.accelerations.pop_front();
        }
        let average_acceleration = window_mean(&self.accelerations);

        let max_power = self.scaler.max_power_scaling();
        let centripetal = self.loops.teleop_centripetal_correction(
            &average_velocity,
            &average_acceleration,
            velocity,
            max_power,
            &self.params,
        );

        let powers = self.scaler.get_drive_powers(
            centripetal,
            self.teleop_heading_vector,
            self.teleop_drive_vector,
            pose.heading,
        );
        self.apply_drive_powers(powers, self.params.use_voltage_compensation_in_teleop);
    }

    /// Move on to the next chain segment.
    fn advance_segment(&mut self) {
        self.chain_index += 1;

        if let Some(start) = self.segment_start_times.get_mut(self.chain_index) {
            *start = Some(Instant::now());
        }

        self.loops.reset();
        self.closest = None;
        self.reached_end_time = None;
        self.stall_start_time = None;

        debug!("Advanced to chain segment {}", self.chain_index);
    }

    /// Final path has completed: either hold its end pose or stop entirely.
    fn finish_following(&mut self, sample: &PathSample) {
        if self.hold_end {
            let end_pose = Pose::new(
                sample.last_control_point[0],
                sample.last_control_point[1],
                sample.end_heading_goal,
            );
            info!("Path complete, holding end pose");
            self.hold_point(end_pose);
        } else {
            info!("Path complete");
            self.break_following();
        }
    }

    /// Write a consistent set of wheel powers, optionally voltage
    /// compensated.
    ///
    /// The write is skipped entirely when every wheel is within the caching
    /// threshold of its last commanded power; otherwise all four wheels are
    /// written together so a cycle never leaves the drivetrain split between
    /// two power sets.
    fn apply_drive_powers(&mut self, powers: [f64; NUM_WHEELS], compensate: bool) {
        let scale = if compensate {
            self.voltage_normalised()
        } else {
            1f64
        };

        let commanded: Vec<f64> = powers
            .iter()
            .map(|p| clamp(p * scale, -1f64, 1f64))
            .collect();

        let needs_write = self
            .motors
            .iter()
            .zip(commanded.iter())
            .any(|(motor, p)| (motor.power() - p).abs() > self.params.motor_caching_threshold);

        if needs_write {
            for (motor, p) in self.motors.iter_mut().zip(commanded.iter()) {
                motor.set_power(*p);
            }
        }

        self.drive_powers = powers;
    }

    /// Record the telemetry snapshot for this cycle.
    fn record_snapshot(&mut self, pose: &Pose, velocity: &Vector) {
        self.snapshot = crate::telem::TelemetrySnapshot {
            time_s: util::session::get_elapsed_seconds(),
            mode: self.mode.as_str(),
            busy: self.is_busy(),
            x: pose.x(),
            y: pose.y(),
            heading: pose.heading,
            velocity_magnitude: velocity.magnitude(),
            t_value: self.t_value(),
            chain_index: self.chain_index,
            translational_error: self.loops.translational_error,
            heading_error: self.loops.heading_error,
            drive_error: self.loops.drive_error,
            translational_vector_magnitude: self.loops.translational_vector.magnitude(),
            translational_vector_theta: self.loops.translational_vector.theta(),
            heading_vector_magnitude: self.loops.heading_vector.magnitude(),
            centripetal_vector_magnitude: self.loops.centripetal_vector.magnitude(),
            corrective_vector_magnitude: self.loops.corrective_vector.magnitude(),
            corrective_vector_theta: self.loops.corrective_vector.theta(),
            drive_vector_magnitude: self.loops.drive_vector.magnitude(),
            drive_vector_theta: self.loops.drive_vector.theta(),
            power_left_front: self.drive_powers[0],
            power_left_rear: self.drive_powers[1],
            power_right_front: self.drive_powers[2],
            power_right_rear: self.drive_powers[3],
        };
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Averages of the newer and older halves of a sample window.
fn window_halves(window: &VecDeque<Vector>) -> (Vector, Vector) {
    let n = window.len();
    if n < 2 {
        let only = window.front().copied().unwrap_or_else(Vector::zero);
        return (only, only);
    }

    let half = n / 2;
    let older = mean(window.iter().take(half));
    let newer = mean(window.iter().skip(n - half));
    (newer, older)
}

/// Mean of a whole sample window.
fn window_mean(window: &VecDeque<Vector>) -> Vector {
    mean(window.iter())
}

fn mean<'a, I: Iterator<Item = &'a Vector>>(iter: I) -> Vector {
    let mut x = 0f64;
    let mut y = 0f64;
    let mut count = 0usize;

    for v in iter {
        x += v.x();
        y += v.y();
        count += 1;
    }

    if count == 0 {
        Vector::zero()
    } else {
        Vector::from_components(x / count as f64, y / count as f64)
    }
}
