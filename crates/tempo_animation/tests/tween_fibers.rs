//! Tweens driven by the fiber scheduler
//!
//! These tests verify that:
//! - A tween started as a fiber advances with the fiber's scaled delta
//! - Stopping the fiber applies the tween's cancel policy exactly once
//! - Tweens compose with sequences and waits inside one fiber

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tempo_animation::{CancelPolicy, Curve, LoopMode, Tween, TweenTarget};
use tempo_core::{FiberOptions, Phase, Scheduler, SchedulerConfig, Sequence};

#[derive(Clone, Default)]
struct Recorder {
    values: Rc<RefCell<Vec<f32>>>,
    ends: Rc<Cell<u32>>,
}

impl TweenTarget for Recorder {
    fn apply(&mut self, factor: f32) {
        self.values.borrow_mut().push(factor);
    }

    fn on_end(&mut self) {
        self.ends.set(self.ends.get() + 1);
    }
}

impl Recorder {
    fn last(&self) -> f32 {
        self.values.borrow().last().copied().unwrap_or(f32::NAN)
    }
}

#[test]
fn test_loop_tween_fiber_single_large_update() {
    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    let recorder = Recorder::default();
    let completions = Rc::new(Cell::new(0));
    let counter = completions.clone();

    let handle = scheduler.start(
        Tween::new(1.0, recorder.clone()).with_loop_mode(LoopMode::Loop(3)),
    );
    scheduler.on_complete(handle, move || counter.set(counter.get() + 1));
    assert!(scheduler.is_running(handle));

    scheduler.update_with_delta(Phase::Update, 3.5).unwrap();
    assert!(!scheduler.is_running(handle));
    assert_eq!(completions.get(), 1);
    assert_eq!(recorder.last(), 1.0);
    assert_eq!(recorder.ends.get(), 1);
}

#[test]
fn test_tween_follows_fiber_time_scale() {
    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    let recorder = Recorder::default();
    scheduler.start_with(
        Tween::new(2.0, recorder.clone()),
        FiberOptions::new().with_time_scale(0.5),
    );

    scheduler.update_with_delta(Phase::Update, 1.0).unwrap();
    assert!((recorder.last() - 0.25).abs() < 1e-5);

    scheduler.set_time_scale(2.0);
    scheduler.update_with_delta(Phase::Update, 1.0).unwrap();
    assert!((recorder.last() - 0.75).abs() < 1e-5);
}

#[test]
fn test_stopping_fiber_applies_cancel_policy_once() {
    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    let recorder = Recorder::default();
    let handle = scheduler.start(
        Tween::new(1.0, recorder.clone())
            .with_curve(Curve::QuadOut)
            .with_cancel_policy(CancelPolicy::Revert),
    );

    scheduler.update_with_delta(Phase::Update, 0.5).unwrap();
    assert!(recorder.last() > 0.5);

    scheduler.stop(handle);
    scheduler.stop(handle);
    assert_eq!(recorder.last(), 0.0);
    assert_eq!(recorder.ends.get(), 1);
}

#[test]
fn test_tween_inside_sequence() {
    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    let recorder = Recorder::default();
    let done = Rc::new(Cell::new(false));
    let flag = done.clone();

    let handle = scheduler.start(
        Sequence::new()
            .wait(1.0)
            .then(Tween::new(1.0, recorder.clone()).with_name("slide"))
            .call(move || flag.set(true)),
    );

    scheduler.update_with_delta(Phase::Update, 1.0).unwrap();
    // The wait just expired; the tween started with zero delta
    assert_eq!(recorder.values.borrow().len(), 1);

    scheduler.update_with_delta(Phase::Update, 0.5).unwrap();
    assert!((recorder.last() - 0.5).abs() < 1e-5);
    assert!(!done.get());

    scheduler.update_with_delta(Phase::Update, 0.6).unwrap();
    assert!(done.get());
    assert!(!scheduler.is_running(handle));
}

#[test]
fn test_deferred_start_applies_start_value_first() {
    let mut scheduler = Scheduler::new(SchedulerConfig::default().with_immediate_start(false));
    let recorder = Recorder::default();
    scheduler.start(Tween::new(1.0, recorder.clone()));
    assert!(recorder.values.borrow().is_empty());

    scheduler.update_with_delta(Phase::Update, 0.25).unwrap();
    assert_eq!(*recorder.values.borrow(), vec![0.0, 0.25]);
}
