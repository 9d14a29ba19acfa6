//! # Path chain
//!
//! An ordered sequence of paths followed back-to-back, with optional
//! callbacks fired as the chain progresses. Callbacks are either parametric
//! (fire when the closest-point t-value on a given segment crosses a
//! threshold) or time based (fire a fixed delay after a given segment
//! starts). Each callback fires at most once per run of the chain.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Instant;

// Internal
use super::Path;
use util::maths::roughly_equals;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Tolerance for parametric trigger comparison, so a trigger exactly at the
/// end of a segment still fires despite floating point noise.
const T_VALUE_TOLERANCE: f64 = 1e-4;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Condition on which a [`PathCallback`] fires.
#[derive(Debug, Clone, Copy)]
pub enum CallbackTrigger {
    /// Fire when the closest-point t-value on the callback's segment reaches
    /// this threshold
    Parametric(f64),

    /// Fire this many milliseconds after the callback's segment starts
    Time(f64),
}

/// A hook attached to a segment of a [`PathChain`].
pub struct PathCallback {
    /// Segment index the trigger refers to
    segment: usize,

    /// When to fire
    trigger: CallbackTrigger,

    /// Whether the callback has already fired on this run
    fired: bool,

    /// The hook itself
    hook: Box<dyn FnMut() + Send>,
}

/// An ordered sequence of paths with attached callbacks.
pub struct PathChain {
    /// The segments, followed in order
    paths: Vec<Box<dyn Path + Send>>,

    /// Callbacks attached to the chain
    callbacks: Vec<PathCallback>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathCallback {
    pub fn new(segment: usize, trigger: CallbackTrigger, hook: Box<dyn FnMut() + Send>) -> Self {
        Self {
            segment,
            trigger,
            fired: false,
            hook,
        }
    }
}

impl PathChain {
    pub fn new(paths: Vec<Box<dyn Path + Send>>) -> Self {
        Self {
            paths,
            callbacks: Vec::new(),
        }
    }

    /// Number of segments in the chain.
    pub fn size(&self) -> usize {
        self.paths.len()
    }

    /// The segment at the given index.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of range; callers index with the follower's
    /// current chain index, which is maintained within bounds.
    pub fn path(&self, index: usize) -> &dyn Path {
        self.paths[index].as_ref()
    }

    /// Attach a callback to the chain.
    pub fn add_callback(&mut self, callback: PathCallback) {
        self.callbacks.push(callback);
    }

    /// Re-arm all callbacks for a fresh run of the chain.
    pub fn reset_callbacks(&mut self) {
        for cb in self.callbacks.iter_mut() {
            cb.fired = false;
        }
    }

    /// Fire any callbacks that have become due.
    ///
    /// `chain_index` and `t_value` describe the follower's current progress;
    /// `segment_start_times` holds the instant each segment started, `None`
    /// for segments not yet reached. Time triggers on already-completed
    /// segments remain eligible, so a delay longer than its segment still
    /// fires eventually.
    pub fn process_callbacks(
        &mut self,
        chain_index: usize,
        t_value: f64,
        segment_start_times: &[Option<Instant>],
    ) {
        for cb in self.callbacks.iter_mut() {
            if cb.fired {
                continue;
            }

            let due = match cb.trigger {
                CallbackTrigger::Parametric(threshold) => {
                    chain_index == cb.segment
                        && (t_value >= threshold
                            || roughly_equals(t_value, threshold, T_VALUE_TOLERANCE))
                }
                CallbackTrigger::Time(delay_ms) => {
                    chain_index >= cb.segment
                        && segment_start_times
                            .get(cb.segment)
                            .copied()
                            .flatten()
                            .map(|start| start.elapsed().as_secs_f64() * 1e3 >= delay_ms)
                            .unwrap_or(false)
                }
            };

            if due {
                cb.fired = true;
                (cb.hook)();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::geom::Pose;
    use crate::path::HeldPoint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn chain_of(n: usize) -> PathChain {
        PathChain::new(
            (0..n)
                .map(|_| {
                    Box::new(HeldPoint::new(Pose::new(0f64, 0f64, 0f64)))
                        as Box<dyn Path + Send>
                })
                .collect(),
        )
    }

    fn counter_callback(
        segment: usize,
        trigger: CallbackTrigger,
    ) -> (PathCallback, Arc<AtomicUsize>) {
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
    fn test_parametric_fires_once() {
        let mut chain = chain_of(2);
        let (cb, count) = counter_callback(0, CallbackTrigger::Parametric(0.5));
        chain.add_callback(cb);

        let starts = [Some(Instant::now()), None];

        chain.process_callbacks(0, 0.3, &starts);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        chain.process_callbacks(0, 0.6, &starts);
        chain.process_callbacks(0, 0.7, &starts);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parametric_only_on_own_segment() {
        let mut chain = chain_of(2);
        let (cb, count) = counter_callback(1, CallbackTrigger::Parametric(0.5));
        chain.add_callback(cb);

        let starts = [Some(Instant::now()), None];
        chain.process_callbacks(0, 0.9, &starts);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_time_trigger_fires_after_delay() {
        let mut chain = chain_of(1);
        let (cb, count) = counter_callback(0, CallbackTrigger::Time(5f64));
        chain.add_callback(cb);

        let starts = [Some(Instant::now())];
        chain.process_callbacks(0, 0f64, &starts);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        std::thread::sleep(std::time::Duration::from_millis(10));
        chain.process_callbacks(0, 0f64, &starts);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_time_trigger_survives_segment_advance() {
        let mut chain = chain_of(2);
        let (cb, count) = counter_callback(0, CallbackTrigger::Time(5f64));
        chain.add_callback(cb);

        let starts = [Some(Instant::now()), Some(Instant::now())];
        std::thread::sleep(std::time::Duration::from_millis(10));

        // Follower already on segment 1, trigger on segment 0 still fires
        chain.process_callbacks(1, 0.1, &starts);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_rearms() {
        let mut chain = chain_of(1);
        let (cb, count) = counter_callback(0, CallbackTrigger::Parametric(0.5));
        chain.add_callback(cb);

        let starts = [Some(Instant::now())];
        chain.process_callbacks(0, 0.9, &starts);
        chain.reset_callbacks();
        chain.process_callbacks(0, 0.9, &starts);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
