//! Shared test rig: in-memory hardware stubs and a straight-line path.

#![allow(dead_code)]

use follower::follower::{Follower, FollowerParams};
use follower::geom::{Pose, Vector};
use follower::hw::{DriveMotor, PoseEstimator, VoltageSensor, ZeroPowerMode};
use follower::path::{ClosestPoint, Path};
use nalgebra::Vector2;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use util::maths::{clamp, lin_map};

// ---------------------------------------------------------------------------
// POSE ESTIMATOR STUB
// ---------------------------------------------------------------------------

/// Scriptable localisation state, shared between the test body and the
/// estimator stub handed to the follower.
#[derive(Default)]
pub struct SimState {
    pub pose: Pose,
    pub velocity: Vector,
    pub acceleration: Vector,
    pub x_offset: f64,
    pub y_offset: f64,
    pub heading_offset: f64,
    pub total_heading: f64,
    pub degenerate: bool,
}

pub struct SimEstimator {
    pub state: Rc<RefCell<SimState>>,
}

impl PoseEstimator for SimEstimator {
    fn update(&mut self) {}

    fn pose(&self) -> Pose {
        let s = self.state.borrow();
        Pose::new(
            s.pose.x() + s.x_offset,
            s.pose.y() + s.y_offset,
            s.pose.heading + s.heading_offset,
        )
    }

    fn velocity(&self) -> Vector {
        self.state.borrow().velocity
    }

    fn acceleration(&self) -> Vector {
        self.state.borrow().acceleration
    }

    fn set_pose(&mut self, pose: Pose) {
        let mut s = self.state.borrow_mut();
        s.pose = pose;
        s.x_offset = 0f64;
        s.y_offset = 0f64;
        s.heading_offset = 0f64;
    }

    fn set_starting_pose(&mut self, pose: Pose) {
        self.state.borrow_mut().pose = pose;
    }

    fn set_pose_with_offset(&mut self, pose: Pose) {
        let mut s = self.state.borrow_mut();
        s.x_offset = pose.x() - s.pose.x();
        s.y_offset = pose.y() - s.pose.y();
        s.heading_offset = pose.heading - s.pose.heading;
    }

    fn x_offset(&self) -> f64 {
        self.state.borrow().x_offset
    }

    fn y_offset(&self) -> f64 {
        self.state.borrow().y_offset
    }

    fn heading_offset(&self) -> f64 {
        self.state.borrow().heading_offset
    }

    fn set_x_offset(&mut self, offset: f64) {
        self.state.borrow_mut().x_offset = offset;
    }

    fn set_y_offset(&mut self, offset: f64) {
        self.state.borrow_mut().y_offset = offset;
    }

    fn set_heading_offset(&mut self, offset: f64) {
        self.state.borrow_mut().heading_offset = offset;
    }

    fn reset_offset(&mut self) {
        let mut s = self.state.borrow_mut();
        s.x_offset = 0f64;
        s.y_offset = 0f64;
        s.heading_offset = 0f64;
    }

    fn total_heading_turned(&self) -> f64 {
        self.state.borrow().total_heading
    }

    fn is_degenerate(&self) -> bool {
        self.state.borrow().degenerate
    }
}

// ---------------------------------------------------------------------------
// MOTOR AND VOLTAGE STUBS
// ---------------------------------------------------------------------------

pub struct SimMotor {
    pub power: Rc<Cell<f64>>,
    pub mode: Rc<Cell<ZeroPowerMode>>,
    pub writes: Rc<Cell<u32>>,
}

impl DriveMotor for SimMotor {
    fn set_power(&mut self, power: f64) {
        self.power.set(power);
        self.writes.set(self.writes.get() + 1);
    }

    fn power(&self) -> f64 {
        self.power.get()
    }

    fn set_zero_power_mode(&mut self, mode: ZeroPowerMode) {
        self.mode.set(mode);
    }
}

pub struct SimVoltageSensor {
    pub volts: Rc<Cell<f64>>,
}

impl VoltageSensor for SimVoltageSensor {
    fn voltage(&self) -> f64 {
        self.volts.get()
    }
}

// ---------------------------------------------------------------------------
// LINE PATH
// ---------------------------------------------------------------------------

/// A straight segment with a constant heading goal. Enough geometry to
/// exercise the whole follower without any curve machinery.
pub struct LinePath {
    start: Vector2<f64>,
    end: Vector2<f64>,
    heading: f64,
    end_heading: Option<f64>,
    end_timeout_ms: f64,
}

impl LinePath {
    pub fn new(start: (f64, f64), end: (f64, f64), heading: f64) -> Self {
        Self {
            start: Vector2::new(start.0, start.1),
            end: Vector2::new(end.0, end.1),
            heading,
            end_heading: None,
            end_timeout_ms: follower::path::DEFAULT_END_TIMEOUT_MS,
        }
    }

    pub fn with_end_timeout_ms(mut self, timeout_ms: f64) -> Self {
        self.end_timeout_ms = timeout_ms;
        self
    }

    /// Interpolate the heading goal linearly from `heading` at the start to
    /// the given heading at the end, instead of holding it constant.
    pub fn with_heading_sweep(mut self, end_heading: f64) -> Self {
        self.end_heading = Some(end_heading);
        self
    }
}

impl Path for LinePath {
    fn closest_point(&self, pose: &Pose, _search_steps: u32) -> ClosestPoint {
        let delta = self.end - self.start;
        let length_sq = delta.norm_squared();

        let t = if length_sq == 0f64 {
            1f64
        } else {
            clamp((pose.position - self.start).dot(&delta) / length_sq, 0f64, 1f64)
        };

        let point = self.start + delta * t;
        let tangent = Vector::from_components(delta[0], delta[1]);

        ClosestPoint {
            pose: Pose::new(point[0], point[1], self.heading_goal(t)),
            t_value: t,
            tangent,
            normal: tangent.rotated(std::f64::consts::FRAC_PI_2),
            curvature: 0f64,
        }
    }

    fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    fn last_control_point(&self) -> Vector2<f64> {
        self.end
    }

    fn end_tangent(&self) -> Vector {
        let delta = self.end - self.start;
        Vector::from_components(delta[0], delta[1]).normalised()
    }

    fn heading_goal(&self, t_value: f64) -> f64 {
        match self.end_heading {
            Some(end) => lin_map((0f64, 1f64), (self.heading, end), t_value),
            None => self.heading,
        }
    }

    fn end_timeout_ms(&self) -> f64 {
        self.end_timeout_ms
    }
}

// ---------------------------------------------------------------------------
// RIG
// ---------------------------------------------------------------------------

/// A follower wired to scriptable stubs, plus the handles to script them.
pub struct Rig {
    pub follower: Follower,
    pub state: Rc<RefCell<SimState>>,
    pub powers: [Rc<Cell<f64>>; 4],
    pub modes: [Rc<Cell<ZeroPowerMode>>; 4],
    pub writes: [Rc<Cell<u32>>; 4],
    pub volts: Rc<Cell<f64>>,
}

impl Rig {
    pub fn with_params(params: FollowerParams) -> Self {
        let state = Rc::new(RefCell::new(SimState::default()));
        let volts = Rc::new(Cell::new(12f64));

        let powers = [
            Rc::new(Cell::new(0f64)),
            Rc::new(Cell::new(0f64)),
            Rc::new(Cell::new(0f64)),
            Rc::new(Cell::new(0f64)),
        ];
        let modes = [
            Rc::new(Cell::new(ZeroPowerMode::Float)),
            Rc::new(Cell::new(ZeroPowerMode::Float)),
            Rc::new(Cell::new(ZeroPowerMode::Float)),
            Rc::new(Cell::new(ZeroPowerMode::Float)),
        ];
        let writes = [
            Rc::new(Cell::new(0u32)),
            Rc::new(Cell::new(0u32)),
            Rc::new(Cell::new(0u32)),
            Rc::new(Cell::new(0u32)),
        ];

        let motors: [Box<dyn DriveMotor>; 4] = [
            Box::new(SimMotor {
                power: powers[0].clone(),
                mode: modes[0].clone(),
                writes: writes[0].clone(),
            }),
            Box::new(SimMotor {
                power: powers[1].clone(),
                mode: modes[1].clone(),
                writes: writes[1].clone(),
            }),
            Box::new(SimMotor {
                power: powers[2].clone(),
                mode: modes[2].clone(),
                writes: writes[2].clone(),
            }),
            Box::new(SimMotor {
                power: powers[3].clone(),
                mode: modes[3].clone(),
                writes: writes[3].clone(),
            }),
        ];

        let follower = Follower::new(
            params,
            Box::new(SimEstimator {
                state: state.clone(),
            }),
            motors,
            Box::new(SimVoltageSensor {
                volts: volts.clone(),
            }),
        );

        Self {
            follower,
            state,
            powers,
            modes,
            writes,
            volts,
        }
    }

    pub fn new() -> Self {
        Self::with_params(FollowerParams::default())
    }

    /// Teleport the robot, zeroing velocity.
    pub fn place(&self, x: f64, y: f64, heading: f64) {
        let mut s = self.state.borrow_mut();
        s.pose = Pose::new(x, y, heading);
        s.velocity = Vector::zero();
    }

    pub fn set_velocity(&self, x: f64, y: f64) {
        self.state.borrow_mut().velocity = Vector::from_components(x, y);
    }

    pub fn total_writes(&self) -> u32 {
        self.writes.iter().map(|w| w.get()).sum()
    }
}
