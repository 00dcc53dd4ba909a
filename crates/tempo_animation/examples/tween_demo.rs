//! Tween Demo
//!
//! Drives a few tweens through the fiber scheduler with a fixed clock and
//! prints the sampled values.
//!
//! Run with: cargo run -p tempo_animation --example tween_demo

use std::cell::Cell;
use std::rc::Rc;

use tempo_animation::{Curve, LoopMode, Tween, Wave, WaveKind};
use tempo_core::{FixedClock, Phase, Scheduler, SchedulerConfig, Sequence};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tempo_core=debug")),
        )
        .init();

    let mut scheduler = Scheduler::with_clock(SchedulerConfig::default(), Box::new(FixedClock(0.1)));

    let x = Rc::new(Cell::new(0.0f32));
    let scale = Rc::new(Cell::new(1.0f32));

    let sink = x.clone();
    let slide = scheduler.start(
        Sequence::new()
            .wait(0.2)
            .then(
                Tween::between(0.0f32, 200.0, 0.8, move |v| sink.set(v))
                    .with_curve(Curve::BackOut)
                    .with_name("slide"),
            )
            .named("slide-in"),
    );

    let sink = scale.clone();
    let pulse = scheduler.start(
        Tween::between(1.0f32, 1.2, 0.5, move |v| sink.set(v))
            .with_curve(Curve::SineInOut)
            .with_wave(Wave::new(WaveKind::SineFade, 3.0))
            .with_loop_mode(LoopMode::YoyoLoop(2)),
    );

    for frame in 0..15 {
        if let Err(e) = scheduler.update(Phase::Update) {
            eprintln!("update failed: {e}");
            break;
        }
        println!(
            "frame {:2}: x = {:7.2}  scale = {:5.3}  running = [{}, {}]",
            frame,
            x.get(),
            scale.get(),
            scheduler.is_running(slide),
            scheduler.is_running(pulse)
        );
    }

    scheduler.shutdown();
}
