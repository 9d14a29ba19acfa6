//! Teleop drive: demand mapping, brake mode, voltage compensation.

mod common;

use common::Rig;
use follower::follower::{FollowerMode, FollowerParams};
use follower::hw::ZeroPowerMode;
use std::f64::consts::FRAC_PI_2;

#[test]
fn full_forward_drives_all_wheels_forward() {
    let mut rig = Rig::new();
    rig.place(0f64, 0f64, 0f64);

    rig.follower.start_teleop_drive();
    assert_eq!(rig.follower.mode(), FollowerMode::TeleopDrive);

    rig.follower.set_teleop_movement(1f64, 0f64, 0f64, false);
    rig.follower.update().unwrap();

    for p in rig.powers.iter() {
        assert!((p.get() - 1f64).abs() < 1e-9);
    }
}

#[test]
fn turn_input_splits_sides() {
    let mut rig = Rig::new();
    rig.place(0f64, 0f64, 0f64);

    rig.follower.start_teleop_drive();
    rig.follower.set_teleop_movement(0f64, 0f64, 0.5, false);
    rig.follower.update().unwrap();

    assert!(rig.powers[0].get() < 0f64);
    assert!(rig.powers[1].get() < 0f64);
    assert!(rig.powers[2].get() > 0f64);
    assert!(rig.powers[3].get() > 0f64);
}

#[test]
fn inputs_are_clamped() {
    let mut rig = Rig::new();
    rig.place(0f64, 0f64, 0f64);

    rig.follower.start_teleop_drive();
    rig.follower.set_teleop_movement(5f64, -7f64, 0f64, false);
    rig.follower.update().unwrap();

    for p in rig.powers.iter() {
        assert!(p.get().abs() <= 1f64 + 1e-9);
    }
}

#[test]
fn brake_mode_set_and_cleared() {
    let mut params = FollowerParams::default();
    params.use_brake_mode_in_teleop = true;
    let mut rig = Rig::with_params(params);

    rig.follower.start_teleop_drive();
    for m in rig.modes.iter() {
        assert_eq!(m.get(), ZeroPowerMode::Brake);
    }

    // Leaving teleop always returns the motors to float
    rig.follower.break_following();
    for m in rig.modes.iter() {
        assert_eq!(m.get(), ZeroPowerMode::Float);
    }
}

#[test]
fn robot_centric_rotates_with_heading() {
    let mut rig = Rig::new();
    rig.place(0f64, 0f64, FRAC_PI_2);

    rig.follower.start_teleop_drive();
    // Robot facing +y, commanded straight ahead in the robot frame
    rig.follower.set_teleop_movement(1f64, 0f64, 0f64, true);
    rig.follower.update().unwrap();

    // The field-frame demand points along +y; with the wheel vectors rotated
    // to match, all wheels drive forward
    for p in rig.powers.iter() {
        assert!(p.get() > 0f64);
    }
}

#[test]
fn teleop_voltage_compensation_uses_own_flag() {
    let mut params = FollowerParams::default();
    params.use_voltage_compensation = true;
    params.use_voltage_compensation_in_teleop = false;
    let mut rig = Rig::with_params(params);
    rig.volts.set(10f64);
    rig.place(0f64, 0f64, 0f64);

    rig.follower.start_teleop_drive();
    rig.follower.set_teleop_movement(0f64, 0f64, 0.1, false);
    rig.follower.update().unwrap();

    // 0.1 turn demand on each side, doubled and decomposed; no 1.2 scaling
    // since the teleop flag is off
    let p = rig.powers[2].get();

    let mut compensated_params = FollowerParams::default();
    compensated_params.use_voltage_compensation_in_teleop = true;
    let mut comp = Rig::with_params(compensated_params);
    comp.volts.set(10f64);
    comp.place(0f64, 0f64, 0f64);
    comp.follower.start_teleop_drive();
    comp.follower.set_teleop_movement(0f64, 0f64, 0.1, false);
    comp.follower.update().unwrap();

    assert!((comp.powers[2].get() - p * 1.2).abs() < 1e-9);
}
