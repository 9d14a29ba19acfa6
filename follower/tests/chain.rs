//! Path chains: segment advancement, callbacks, power ceilings.

mod common;

use common::{LinePath, Rig};
use follower::follower::{FollowerError, FollowerMode};
use follower::path::{CallbackTrigger, Path, PathCallback, PathChain};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn three_segment_chain() -> PathChain {
    PathChain::new(vec![
        Box::new(LinePath::new((0f64, 0f64), (10f64, 0f64), 0f64)) as Box<dyn Path + Send>,
        Box::new(LinePath::new((10f64, 0f64), (20f64, 0f64), 0f64)),
        Box::new(LinePath::new((20f64, 0f64), (30f64, 0f64), 0f64)),
    ])
}

fn counting_callback(segment: usize, trigger: CallbackTrigger) -> (PathCallback, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let count_in_hook = count.clone();
    let cb = PathCallback::new(
        segment,
        trigger,
        Box::new(move || {
            count_in_hook.fetch_add(1, Ordering::SeqCst);
        }),
    );
    (cb, count)
}

#[test]
fn empty_chain_is_rejected() {
    let mut rig = Rig::new();
    let result = rig.follower.follow_chain(PathChain::new(Vec::new()), false);
    assert!(matches!(result, Err(FollowerError::EmptyChain)));
    assert_eq!(rig.follower.mode(), FollowerMode::Idle);
}

#[test]
fn segment_end_advances_index_once() {
    let mut rig = Rig::new();
    rig.place(0f64, 0f64, 0f64);
    rig.follower.follow_chain(three_segment_chain(), false).unwrap();
    assert_eq!(rig.follower.chain_index(), 0);

    // Reach the end of segment 0
    rig.place(10f64, 0f64, 0f64);
    rig.follower.update().unwrap();
    assert_eq!(rig.follower.chain_index(), 1);
    assert!(rig.follower.is_busy());

    // Same pose is the start of segment 1, so no further advance
    rig.follower.update().unwrap();
    assert_eq!(rig.follower.chain_index(), 1);
}

#[test]
fn chain_completes_on_final_segment() {
    let mut rig = Rig::new();
    rig.place(0f64, 0f64, 0f64);
    rig.follower.follow_chain(three_segment_chain(), false).unwrap();

    for (x, expected_index) in [(10f64, 1usize), (20f64, 2usize)].iter() {
        rig.place(*x, 0f64, 0f64);
        rig.follower.update().unwrap();
        assert_eq!(rig.follower.chain_index(), *expected_index);
    }

    // End of the final segment, settled
    rig.place(30f64, 0f64, 0f64);
    rig.follower.update().unwrap();
    assert!(!rig.follower.is_busy());
    assert_eq!(rig.follower.mode(), FollowerMode::Idle);
}

#[test]
fn non_final_segment_drives_at_full_power() {
    let mut rig = Rig::new();
    rig.place(5f64, 0f64, 0f64);
    rig.follower.follow_chain(three_segment_chain(), false).unwrap();
    rig.follower.update().unwrap();

    let telem = rig.follower.telemetry();
    assert!((telem.drive_vector_magnitude - 1f64).abs() < 1e-9);
    assert!(telem.drive_vector_theta.abs() < 1e-9);
}

#[test]
fn chain_power_ceiling_applies() {
    let mut rig = Rig::new();
    rig.place(5f64, 0f64, 0f64);
    rig.follower
        .follow_chain_with_power(three_segment_chain(), 0.5, false)
        .unwrap();
    rig.follower.update().unwrap();

    assert_eq!(rig.follower.max_power(), 0.5);
    assert!((rig.follower.telemetry().drive_vector_magnitude - 0.5).abs() < 1e-9);
    for p in rig.powers.iter() {
        assert!(p.get().abs() <= 0.5 + 1e-9);
    }
}

#[test]
fn parametric_callback_fires_once() {
    let mut rig = Rig::new();
    let mut chain = three_segment_chain();
    let (cb, count) = counting_callback(0, CallbackTrigger::Parametric(0.5));
    chain.add_callback(cb);

    rig.place(0f64, 0f64, 0f64);
    rig.follower.follow_chain(chain, false).unwrap();
    rig.follower.update().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    rig.place(6f64, 0f64, 0f64);
    rig.follower.update().unwrap();
    rig.follower.update().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn time_callback_fires_after_delay() {
    let mut rig = Rig::new();
    let mut chain = three_segment_chain();
    let (cb, count) = counting_callback(0, CallbackTrigger::Time(5f64));
    chain.add_callback(cb);

    rig.place(0f64, 0f64, 0f64);
    rig.follower.follow_chain(chain, false).unwrap();
    rig.follower.update().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);

    std::thread::sleep(std::time::Duration::from_millis(10));
    rig.follower.update().unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn resume_following_requires_chain_mode() {
    let mut rig = Rig::new();
    assert!(matches!(
        rig.follower.resume_following(),
        Err(FollowerError::NotFollowingChain)
    ));

    rig.place(0f64, 0f64, 0f64);
    rig.follower.follow_chain(three_segment_chain(), false).unwrap();
    rig.follower.resume_following().unwrap();
    assert!(rig.follower.is_busy());
}

#[test]
fn break_following_drops_chain() {
    let mut rig = Rig::new();
    rig.place(0f64, 0f64, 0f64);
    rig.follower.follow_chain(three_segment_chain(), false).unwrap();
    rig.follower.update().unwrap();

    rig.follower.break_following();
    assert_eq!(rig.follower.mode(), FollowerMode::Idle);
    assert_eq!(rig.follower.chain_index(), 0);
    assert_eq!(rig.follower.t_value(), 1f64);
}
