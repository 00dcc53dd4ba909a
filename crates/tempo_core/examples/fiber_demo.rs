//! Fiber Demo
//!
//! Runs a handful of fibers in priority order, pauses a group mid-way and
//! prints the scheduler snapshot each frame.
//!
//! Run with: cargo run -p tempo_core --example fiber_demo

use tempo_core::{
    routine, FiberOptions, FixedClock, GroupMask, Phase, Scheduler, SchedulerConfig, Sequence,
    Yield,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tempo_core=trace")),
        )
        .init();

    let ui = GroupMask::group(0);
    let mut scheduler =
        Scheduler::with_clock(SchedulerConfig::default(), Box::new(FixedClock(0.25)));

    for priority in [5, 1, 3] {
        let mut ticks = 0;
        scheduler.start_with(
            routine(move |cx| {
                ticks += 1;
                println!("  priority {} tick {} (dt {:.2})", priority, ticks, cx.delta_time());
                if ticks < 4 {
                    Yield::Next
                } else {
                    Yield::Done
                }
            }),
            FiberOptions::new()
                .with_priority(priority)
                .with_name(format!("worker-{priority}")),
        );
    }

    scheduler.start_with(
        Sequence::new()
            .wait(0.5)
            .call(|| println!("  ui fade finished"))
            .named("ui-fade"),
        FiberOptions::new().with_group(ui).with_priority(10),
    );

    for frame in 0..6 {
        println!("frame {frame}");
        if frame == 1 {
            scheduler.pause_group(ui);
        } else if frame == 3 {
            scheduler.resume_group(ui);
        }
        if let Err(e) = scheduler.update(Phase::Update) {
            eprintln!("update failed: {e}");
            break;
        }
        for fiber in scheduler.snapshot() {
            println!("  {:?}", fiber);
        }
    }

    println!("{:?}", scheduler.stats());
    scheduler.shutdown();
}
