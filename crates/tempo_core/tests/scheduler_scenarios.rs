//! End-to-end scheduler scenarios
//!
//! These tests drive the public API the way a frame loop would:
//! - Timed waits inside sequences
//! - Priority ordering within a phase, and priority changes mid-tick
//! - Stale handles after a slot is recycled and reissued
//! - Table growth past the initial capacity
//! - Nested routines, chained fibers and cancellation

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tempo_core::{
    routine, wait, Combine, FiberHandle, FiberOptions, Phase, Routine, RoutineContext, Scheduler,
    SchedulerConfig, Sequence, Yield, DEFAULT_CAPACITY,
};

fn scheduler() -> Scheduler {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    Scheduler::new(SchedulerConfig::default())
}

/// Records its id every time it is resumed
fn recorder(id: i32, log: Rc<RefCell<Vec<i32>>>) -> impl Routine {
    routine(move |_| {
        log.borrow_mut().push(id);
        Yield::Next
    })
}

#[test]
fn test_numeric_wait_then_complete() {
    let mut scheduler = scheduler();
    let completions = Rc::new(Cell::new(0));
    let counter = completions.clone();

    let mut waited = false;
    let handle = scheduler.start(routine(move |_| {
        if waited {
            return Yield::Done;
        }
        waited = true;
        Yield::from(2.0)
    }));
    scheduler.on_complete(handle, move || counter.set(counter.get() + 1));

    scheduler.update_with_delta(Phase::Update, 1.9).unwrap();
    assert!(scheduler.is_running(handle));
    assert_eq!(completions.get(), 0);

    scheduler.update_with_delta(Phase::Update, 0.2).unwrap();
    assert!(!scheduler.is_running(handle));
    assert_eq!(completions.get(), 1);

    // Further ticks never fire it again
    scheduler.update_with_delta(Phase::Update, 1.0).unwrap();
    assert_eq!(completions.get(), 1);
}

#[test]
fn test_fibers_run_in_ascending_priority() {
    let mut scheduler = scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    for priority in [5, 1, 3] {
        scheduler.start_with(
            recorder(priority, log.clone()),
            FiberOptions::new().with_priority(priority),
        );
    }
    log.borrow_mut().clear();

    scheduler.update_with_delta(Phase::Update, 0.016).unwrap();
    assert_eq!(*log.borrow(), vec![1, 3, 5]);
}

#[test]
fn test_equal_priorities_keep_start_order() {
    let mut scheduler = scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    for id in 0..4 {
        scheduler.start(recorder(id, log.clone()));
    }
    log.borrow_mut().clear();

    scheduler.update_with_delta(Phase::Update, 0.016).unwrap();
    assert_eq!(*log.borrow(), vec![0, 1, 2, 3]);
}

#[test]
fn test_priority_change_mid_tick_applies_next_tick() {
    let mut scheduler = scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));

    let last = scheduler.start_with(recorder(5, log.clone()), FiberOptions::new().with_priority(5));
    scheduler.start_with(recorder(3, log.clone()), FiberOptions::new().with_priority(3));

    // Priority 1 fiber promotes the priority 5 fiber to the front while the tick runs
    let first_log = log.clone();
    let mut promoted = false;
    scheduler.start_with(
        routine(move |cx: &mut RoutineContext<'_>| {
            first_log.borrow_mut().push(1);
            if !promoted && cx.elapsed() > 0.0 {
                promoted = true;
                cx.scheduler().set_priority(last, 0);
            }
            Yield::Next
        }),
        FiberOptions::new().with_priority(1),
    );
    log.borrow_mut().clear();

    scheduler.update_with_delta(Phase::Update, 0.016).unwrap();
    assert_eq!(*log.borrow(), vec![1, 3, 5]);

    log.borrow_mut().clear();
    scheduler.update_with_delta(Phase::Update, 0.016).unwrap();
    assert_eq!(*log.borrow(), vec![5, 1, 3]);
}

#[test]
fn test_stale_handle_never_touches_new_occupant() {
    let mut scheduler = scheduler();
    let stale = scheduler.start(wait(10.0));
    assert!(scheduler.stop(stale));

    // The freed slot is reissued to a new fiber
    let steps = Rc::new(Cell::new(0));
    let count = steps.clone();
    let fresh = scheduler.start(routine(move |_| {
        count.set(count.get() + 1);
        Yield::Next
    }));
    assert_ne!(stale, fresh);

    assert!(!scheduler.is_running(stale));
    assert!(!scheduler.pause(stale));
    assert!(!scheduler.stop(stale));
    assert!(!scheduler.set_priority(stale, 9));
    assert_eq!(scheduler.name(stale), None);
    assert!(scheduler.snapshot_of(stale).is_none());

    scheduler.update_with_delta(Phase::Update, 0.016).unwrap();
    assert!(scheduler.is_running(fresh));
    assert!(!scheduler.is_paused(fresh));
    assert_eq!(steps.get(), 2);
}

#[test]
fn test_table_grows_past_initial_capacity() {
    let mut scheduler = scheduler();
    assert_eq!(scheduler.capacity(), DEFAULT_CAPACITY);

    let elapsed: Vec<Rc<Cell<f32>>> = (0..DEFAULT_CAPACITY + 1)
        .map(|_| Rc::new(Cell::new(0.0)))
        .collect();
    let handles: Vec<FiberHandle> = elapsed
        .iter()
        .map(|cell| {
            let cell = cell.clone();
            scheduler.start(routine(move |cx| {
                cell.set(cx.elapsed());
                Yield::Next
            }))
        })
        .collect();

    assert!(scheduler.capacity() > DEFAULT_CAPACITY);
    assert_eq!(scheduler.active_count(), DEFAULT_CAPACITY + 1);

    scheduler.update_with_delta(Phase::Update, 0.5).unwrap();
    for (handle, cell) in handles.iter().zip(&elapsed) {
        assert!(scheduler.is_running(*handle));
        assert!((cell.get() - 0.5).abs() < 1e-6);
    }
}

#[test]
fn test_nested_sequences_unwind_in_order() {
    let mut scheduler = scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));
    let (a, b, c) = (log.clone(), log.clone(), log.clone());

    let inner = Sequence::new()
        .call(move || a.borrow_mut().push("inner start"))
        .wait(0.5)
        .call(move || b.borrow_mut().push("inner end"));
    let handle = scheduler.start(
        Sequence::new()
            .then(inner)
            .wait(0.5)
            .call(move || c.borrow_mut().push("outer end"))
            .named("outer"),
    );
    assert_eq!(scheduler.name(handle), Some("outer"));

    for _ in 0..3 {
        scheduler.update_with_delta(Phase::Update, 0.3).unwrap();
    }
    scheduler.update_with_delta(Phase::Update, 0.3).unwrap();
    assert_eq!(*log.borrow(), vec!["inner start", "inner end", "outer end"]);
    assert!(!scheduler.is_running(handle));
}

struct Cleanup {
    log: Rc<RefCell<Vec<&'static str>>>,
    label: &'static str,
}

impl Routine for Cleanup {
    fn resume(&mut self, _cx: &mut RoutineContext<'_>) -> Yield {
        Yield::Next
    }

    fn on_cancel(&mut self, _cx: &mut RoutineContext<'_>) {
        self.log.borrow_mut().push(self.label);
    }
}

#[test]
fn test_stop_cancels_stack_top_first() {
    let mut scheduler = scheduler();
    let log = Rc::new(RefCell::new(Vec::new()));
    let inner = Cleanup {
        log: log.clone(),
        label: "inner",
    };
    let outer_log = log.clone();

    struct Outer {
        inner: Option<Cleanup>,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Routine for Outer {
        fn resume(&mut self, _cx: &mut RoutineContext<'_>) -> Yield {
            match self.inner.take() {
                Some(inner) => Yield::call(inner),
                None => Yield::Done,
            }
        }

        fn on_cancel(&mut self, _cx: &mut RoutineContext<'_>) {
            self.log.borrow_mut().push("outer");
        }
    }

    let handle = scheduler.start(Outer {
        inner: Some(inner),
        log: outer_log,
    });
    scheduler.stop(handle);
    assert_eq!(*log.borrow(), vec!["inner", "outer"]);
}

#[test]
fn test_combined_children_follow_parent_time_scale() {
    let mut scheduler = scheduler();
    let handle = scheduler.start_with(
        Combine::all().with(wait(1.0)).with(wait(1.0)),
        FiberOptions::new().with_time_scale(2.0),
    );

    scheduler.update_with_delta(Phase::Update, 0.4).unwrap();
    assert!(scheduler.is_running(handle));
    scheduler.update_with_delta(Phase::Update, 0.2).unwrap();
    assert!(!scheduler.is_running(handle));
}

#[test]
fn test_fiber_started_from_routine_runs_independently() {
    let mut scheduler = scheduler();
    let spawned = Rc::new(Cell::new(None));
    let out = spawned.clone();

    let parent = scheduler.start(routine(move |cx| {
        out.set(Some(cx.start(wait(1.0))));
        Yield::Done
    }));
    assert!(!scheduler.is_running(parent));

    let child = spawned.get().unwrap();
    assert!(scheduler.is_running(child));
    scheduler.update_with_delta(Phase::Update, 1.0).unwrap();
    assert!(!scheduler.is_running(child));
}
