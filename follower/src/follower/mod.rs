//! # Follower module
//!
//! The top level of the crate: [`Follower`] owns the hardware abstractions,
//! the feedback loops and the drive vector scaler, and exposes the public
//! operations (follow a path or chain, hold a point, turn, teleop drive).
//! All of the actual control work happens in [`Follower::update`], which the
//! caller runs once per control cycle; everything else just transitions
//! state.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_vectors;
mod cycle;
mod params;
mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::FollowerParams;
pub use state::{FollowerError, FollowerMode};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use nalgebra::Vector2;
use std::collections::VecDeque;
use std::time::Instant;

// Internal
use crate::ctrl::{FilteredPidfCoefficients, PidfCoefficients};
use crate::geom::{Pose, Vector};
use crate::hw::{DriveMotor, PoseEstimator, VoltageSensor, ZeroPowerMode};
use crate::kinematics::{DriveVectorScaler, NUM_WHEELS};
use crate::path::{ClosestPoint, HeldPoint, Path, PathChain};
use crate::telem::TelemetrySnapshot;
use util::archive::{Archived, Archiver};
use util::maths::{clamp, smallest_angle_difference};
use util::params::LoadError;
use util::session::Session;

use calc_vectors::FollowerLoops;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Holonomic drivetrain follower.
pub struct Follower {
    /// Tuning parameters
    params: FollowerParams,

    /// Demand-to-wheel-power mapper
    scaler: DriveVectorScaler,

    /// Localisation source
    estimator: Box<dyn PoseEstimator>,

    /// Drive motors, ordered left-front, left-rear, right-front, right-rear
    motors: [Box<dyn DriveMotor>; NUM_WHEELS],

    /// Battery voltage sensor
    voltage_sensor: Box<dyn VoltageSensor>,

    /// Current operating mode
    mode: FollowerMode,

    /// True while a path or chain is actively being followed
    busy: bool,

    /// True while an in-place turn is in progress
    turning: bool,

    /// Whether to hold the end pose once the current path completes
    hold_end: bool,

    /// Active path in the single-path and hold modes
    current_path: Option<Box<dyn Path + Send>>,

    /// Active chain in chain mode
    current_chain: Option<PathChain>,

    /// Index of the chain segment being followed
    chain_index: usize,

    /// Instant each chain segment started, `None` for segments not yet
    /// reached
    segment_start_times: Vec<Option<Instant>>,

    /// Feedback controllers and their latest outputs
    loops: FollowerLoops,

    /// Most recent closest-point query result
    closest: Option<ClosestPoint>,

    /// Instant the parametric end of the final path was first reached
    reached_end_time: Option<Instant>,

    /// Instant the stall timer started, if running
    stall_start_time: Option<Instant>,

    /// Sliding window of velocity samples for teleop estimation
    velocities: VecDeque<Vector>,

    /// Sliding window of acceleration samples for teleop estimation
    accelerations: VecDeque<Vector>,

    /// Current teleop translation demand
    teleop_drive_vector: Vector,

    /// Current teleop turn demand
    teleop_heading_vector: Vector,

    /// Cached battery voltage and when it was read
    cached_voltage: f64,
    voltage_read_time: Option<Instant>,

    /// Wheel powers computed by the most recent cycle, before voltage
    /// scaling
    drive_powers: [f64; NUM_WHEELS],

    /// Telemetry snapshot of the most recent cycle
    snapshot: TelemetrySnapshot,

    /// Telemetry archiver
    arch_telem: Archiver,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Follower {
    /// Create a new follower from already-loaded parameters.
    pub fn new(
        params: FollowerParams,
        estimator: Box<dyn PoseEstimator>,
        mut motors: [Box<dyn DriveMotor>; NUM_WHEELS],
        voltage_sensor: Box<dyn VoltageSensor>,
    ) -> Self {
        for motor in motors.iter_mut() {
            motor.set_zero_power_mode(ZeroPowerMode::Float);
        }

        let mut scaler = DriveVectorScaler::new(params.left_front_wheel_vector());
        scaler.set_max_power_scaling(params.max_power);

        let loops = FollowerLoops::new(&params);
        let velocity_sample_count = params.velocity_sample_count.max(1);

        info!("Follower initialised");

        Self {
            scaler,
            estimator,
            motors,
            voltage_sensor,
            mode: FollowerMode::Idle,
            busy: false,
            turning: false,
            hold_end: false,
            current_path: None,
            current_chain: None,
            chain_index: 0,
            segment_start_times: Vec::new(),
            loops,
            closest: None,
            reached_end_time: None,
            stall_start_time: None,
            velocities: vec![Vector::zero(); velocity_sample_count].into(),
            accelerations: vec![Vector::zero(); velocity_sample_count].into(),
            teleop_drive_vector: Vector::zero(),
            teleop_heading_vector: Vector::zero(),
            cached_voltage: params.nominal_voltage,
            voltage_read_time: None,
            drive_powers: [0f64; NUM_WHEELS],
            snapshot: TelemetrySnapshot::default(),
            arch_telem: Archiver::default(),
            params,
        }
    }

    /// Create a new follower, loading the parameters from the given file.
    pub fn init(
        params_path: &str,
        estimator: Box<dyn PoseEstimator>,
        motors: [Box<dyn DriveMotor>; NUM_WHEELS],
        voltage_sensor: Box<dyn VoltageSensor>,
    ) -> Result<Self, LoadError> {
        let params: FollowerParams = util::params::load(params_path)?;
        Ok(Self::new(params, estimator, motors, voltage_sensor))
    }

    /// Attach a session so telemetry snapshots can be archived with
    /// [`Archived::write`].
    pub fn attach_session(&mut self, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_telem = Archiver::from_path(session, "follower.csv")?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // ENTRY POINTS
    // -----------------------------------------------------------------------

    /// Stop whatever the follower is doing: zero the motors, reset every
    /// controller and timer, and drop the active path. Always safe to call.
    pub fn break_following(&mut self) {
        self.mode = FollowerMode::Idle;
        self.busy = false;
        self.turning = false;
        self.hold_end = false;
        self.current_path = None;
        self.current_chain = None;
        self.chain_index = 0;
        self.segment_start_times.clear();
        self.closest = None;
        self.reached_end_time = None;
        self.stall_start_time = None;
        self.loops.reset();

        self.teleop_drive_vector = Vector::zero();
        self.teleop_heading_vector = Vector::zero();
        for v in self.velocities.iter_mut() {
            *v = Vector::zero();
        }
        for a in self.accelerations.iter_mut() {
            *a = Vector::zero();
        }

        self.drive_powers = [0f64; NUM_WHEELS];
        for motor in self.motors.iter_mut() {
            motor.set_power(0f64);
            motor.set_zero_power_mode(ZeroPowerMode::Float);
        }

        debug!("Following broken, motors zeroed");
    }

    /// Actively hold the given pose until told otherwise.
    pub fn hold_point(&mut self, pose: Pose) {
        self.break_following();
        self.mode = FollowerMode::HoldingPoint;
        self.current_path = Some(Box::new(HeldPoint::new(pose)));
        debug!(
            "Holding point ({:.3}, {:.3}) at heading {:.3} rad",
            pose.x(),
            pose.y(),
            pose.heading
        );
    }

    /// Follow a single path, holding its end pose afterwards if `hold_end`.
    pub fn follow_path(&mut self, path: Box<dyn Path + Send>, hold_end: bool) {
        self.break_following();
        self.mode = FollowerMode::FollowingPath;
        self.busy = true;
        self.hold_end = hold_end;
        self.current_path = Some(path);
        info!("Following path (hold_end: {})", hold_end);
    }

    /// Follow a single path, holding the end pose or not according to the
    /// `automatic_hold_end` parameter.
    pub fn follow(&mut self, path: Box<dyn Path + Send>) {
        let hold_end = self.params.automatic_hold_end;
        self.follow_path(path, hold_end);
    }

    /// Follow a chain of paths with the current power ceiling.
    pub fn follow_chain(&mut self, chain: PathChain, hold_end: bool) -> Result<(), FollowerError> {
        let max_power = self.scaler.max_power_scaling();
        self.follow_chain_with_power(chain, max_power, hold_end)
    }

    /// Follow a chain of paths with a specific power ceiling.
    pub fn follow_chain_with_power(
        &mut self,
        mut chain: PathChain,
        max_power: f64,
        hold_end: bool,
    ) -> Result<(), FollowerError> {
        if chain.size() == 0 {
            return Err(FollowerError::EmptyChain);
        }

        self.break_following();
        self.scaler.set_max_power_scaling(max_power);
        chain.reset_callbacks();

        self.mode = FollowerMode::FollowingChain;
        self.busy = true;
        self.hold_end = hold_end;
        self.chain_index = 0;
        self.segment_start_times = vec![None; chain.size()];
        self.segment_start_times[0] = Some(Instant::now());
        self.current_chain = Some(chain);

        info!("Following path chain (hold_end: {})", hold_end);
        Ok(())
    }

    /// Restart progress timing on the current chain, for example after an
    /// external pause. Errors unless a chain is being followed.
    pub fn resume_following(&mut self) -> Result<(), FollowerError> {
        if self.mode != FollowerMode::FollowingChain {
            return Err(FollowerError::NotFollowingChain);
        }

        let size = self
            .current_chain
            .as_ref()
            .map(|c| c.size())
            .ok_or(FollowerError::NoActivePath(self.mode))?;

        self.segment_start_times = vec![None; size];
        self.segment_start_times[self.chain_index] = Some(Instant::now());
        self.busy = true;
        self.reached_end_time = None;
        self.stall_start_time = None;

        info!("Resumed following at chain segment {}", self.chain_index);
        Ok(())
    }

    /// Turn in place by the given angle.
    pub fn turn(&mut self, radians: f64, is_left: bool) {
        let heading = self.estimator.pose().heading;
        let direction = if is_left { 1f64 } else { -1f64 };
        self.turn_to(heading + direction * radians);
    }

    /// Turn in place to the given heading.
    pub fn turn_to(&mut self, heading: f64) {
        let pose = self.estimator.pose();
        self.hold_point(Pose::new(pose.x(), pose.y(), heading));
        self.turning = true;
        info!("Turning to heading {:.3} rad", heading);
    }

    /// Hand control to the teleop demand vectors set by
    /// [`Follower::set_teleop_movement`].
    pub fn start_teleop_drive(&mut self) {
        self.break_following();
        self.mode = FollowerMode::TeleopDrive;

        if self.params.use_brake_mode_in_teleop {
            for motor in self.motors.iter_mut() {
                motor.set_zero_power_mode(ZeroPowerMode::Brake);
            }
        }

        info!("Teleop drive started");
    }

    /// Set the teleop demands. Inputs are clamped into `[-1, 1]`; the
    /// translation demand is field-centric unless `robot_centric`.
    pub fn set_teleop_movement(
        &mut self,
        forward: f64,
        lateral: f64,
        turn: f64,
        robot_centric: bool,
    ) {
        let forward = clamp(forward, -1f64, 1f64);
        let lateral = clamp(lateral, -1f64, 1f64);
        let turn = clamp(turn, -1f64, 1f64);

        let mut drive = Vector::from_components(forward, lateral);
        drive = drive.with_magnitude(clamp(drive.magnitude(), 0f64, 1f64));

        let heading = self.estimator.pose().heading;
        if robot_centric {
            drive = drive.rotated(heading);
        }

        self.teleop_drive_vector = drive;
        self.teleop_heading_vector = Vector::new(turn, heading);
    }

    // -----------------------------------------------------------------------
    // LOCALISATION PASSTHROUGHS
    // -----------------------------------------------------------------------

    pub fn pose(&self) -> Pose {
        self.estimator.pose()
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.estimator.set_pose(pose);
    }

    pub fn set_starting_pose(&mut self, pose: Pose) {
        self.estimator.set_starting_pose(pose);
    }

    pub fn set_pose_with_offset(&mut self, pose: Pose) {
        self.estimator.set_pose_with_offset(pose);
    }

    pub fn velocity(&self) -> Vector {
        self.estimator.velocity()
    }

    pub fn acceleration(&self) -> Vector {
        self.estimator.acceleration()
    }

    pub fn velocity_magnitude(&self) -> f64 {
        self.estimator.velocity().magnitude()
    }

    pub fn total_heading_turned(&self) -> f64 {
        self.estimator.total_heading_turned()
    }

    pub fn is_localisation_degenerate(&self) -> bool {
        self.estimator.is_degenerate()
    }

    pub fn x_offset(&self) -> f64 {
        self.estimator.x_offset()
    }

    pub fn y_offset(&self) -> f64 {
        self.estimator.y_offset()
    }

    pub fn heading_offset(&self) -> f64 {
        self.estimator.heading_offset()
    }

    pub fn set_x_offset(&mut self, offset: f64) {
        self.estimator.set_x_offset(offset);
    }

    pub fn set_y_offset(&mut self, offset: f64) {
        self.estimator.set_y_offset(offset);
    }

    pub fn set_heading_offset(&mut self, offset: f64) {
        self.estimator.set_heading_offset(offset);
    }

    pub fn reset_offset(&mut self) {
        self.estimator.reset_offset();
    }

    // -----------------------------------------------------------------------
    // STATUS
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> FollowerMode {
        self.mode
    }

    /// True while following a path or turning.
    pub fn is_busy(&self) -> bool {
        self.busy || self.turning
    }

    pub fn is_turning(&self) -> bool {
        self.turning
    }

    /// True while the stall timer is running.
    pub fn is_stalled(&self) -> bool {
        self.stall_start_time.is_some()
    }

    /// Parametric progress along the active path, 1.0 when not following.
    pub fn t_value(&self) -> f64 {
        if self.busy {
            self.closest.map(|c| c.t_value).unwrap_or(0f64)
        } else {
            1f64
        }
    }

    /// Index of the chain segment being followed.
    pub fn chain_index(&self) -> usize {
        self.chain_index
    }

    /// Pose of the most recent closest-point query.
    pub fn closest_pose(&self) -> Option<Pose> {
        self.closest.map(|c| c.pose)
    }

    /// Telemetry snapshot of the most recent cycle.
    pub fn telemetry(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    /// True if the robot is within a box around the given point.
    pub fn at_point(&self, point: Vector2<f64>, x_tolerance: f64, y_tolerance: f64) -> bool {
        let pose = self.estimator.pose();
        (pose.x() - point[0]).abs() < x_tolerance && (pose.y() - point[1]).abs() < y_tolerance
    }

    /// True if the robot is within a box around the given pose, heading
    /// included.
    pub fn at_pose(
        &self,
        pose: Pose,
        x_tolerance: f64,
        y_tolerance: f64,
        heading_tolerance: f64,
    ) -> bool {
        self.at_point(pose.position, x_tolerance, y_tolerance)
            && smallest_angle_difference(self.estimator.pose().heading, pose.heading)
                < heading_tolerance
    }

    // -----------------------------------------------------------------------
    // LIVE TUNING
    // -----------------------------------------------------------------------

    /// Set the power ceiling for all modes, clamped into `[0, 1]`.
    pub fn set_max_power(&mut self, max_power: f64) {
        self.scaler.set_max_power_scaling(max_power);
    }

    pub fn max_power(&self) -> f64 {
        self.scaler.max_power_scaling()
    }

    pub fn set_centripetal_scaling(&mut self, scaling: f64) {
        self.params.centripetal_scaling = scaling;
    }

    pub fn set_translational_pidf(&mut self, c: PidfCoefficients) {
        self.params.translational_pidf = c;
        self.loops.set_translational_coefficients(c);
    }

    pub fn set_secondary_translational_pidf(&mut self, c: PidfCoefficients) {
        self.params.secondary_translational_pidf = c;
        self.loops.set_secondary_translational_coefficients(c);
    }

    pub fn set_heading_pidf(&mut self, c: PidfCoefficients) {
        self.params.heading_pidf = c;
        self.loops.set_heading_coefficients(c);
    }

    pub fn set_secondary_heading_pidf(&mut self, c: PidfCoefficients) {
        self.params.secondary_heading_pidf = c;
        self.loops.set_secondary_heading_coefficients(c);
    }

    pub fn set_drive_pidf(&mut self, c: FilteredPidfCoefficients) {
        self.params.drive_pidf = c;
        self.loops.set_drive_coefficients(c);
    }

    pub fn set_secondary_drive_pidf(&mut self, c: FilteredPidfCoefficients) {
        self.params.secondary_drive_pidf = c;
        self.loops.set_secondary_drive_coefficients(c);
    }

    // -----------------------------------------------------------------------
    // VOLTAGE
    // -----------------------------------------------------------------------

    /// Battery voltage, cached for `cache_invalidate_seconds` between sensor
    /// reads.
    pub fn voltage(&mut self) -> f64 {
        let stale = match self.voltage_read_time {
            None => true,
            Some(t) => t.elapsed().as_secs_f64() > self.params.cache_invalidate_seconds,
        };

        if stale {
            self.cached_voltage = self.voltage_sensor.voltage();
            self.voltage_read_time = Some(Instant::now());
        }

        self.cached_voltage
    }

    /// Compensation factor for the current battery voltage: above one when
    /// the battery sags below nominal. Final wheel powers are clamped into
    /// `[-1, 1]` after scaling.
    pub fn voltage_normalised(&mut self) -> f64 {
        self.params.nominal_voltage / self.voltage()
    }
}

impl Archived for Follower {
    fn write(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.arch_telem.serialise(self.snapshot)
    }
}
