//! Job Tiers Demo
//!
//! Schedules stepped jobs in each priority tier and pumps the scheduler
//! like a 60 Hz frame loop until they all report back.
//!
//! Run with: cargo run -p tempo_jobs --example job_tiers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempo_jobs::{step_fn, AsyncPriority, JobConfig, JobScheduler, JobYield};

const FRAME: Duration = Duration::from_millis(16);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tempo_jobs=debug")),
        )
        .init();

    let mut jobs = match JobScheduler::new(JobConfig::default()) {
        Ok(jobs) => jobs,
        Err(e) => {
            eprintln!("failed to start job scheduler: {e}");
            return;
        }
    };
    println!("threaded: {}", jobs.is_threaded());

    let finished = Arc::new(AtomicUsize::new(0));
    for priority in AsyncPriority::ALL {
        for n in 0..3 {
            let mut remaining = 5 + n;
            let scheduled = jobs.schedule_steps(
                step_fn(move |_| {
                    remaining -= 1;
                    if remaining == 0 {
                        JobYield::Done
                    } else {
                        JobYield::Sleep(Duration::from_millis(2))
                    }
                }),
                priority.into(),
            );
            let Ok(handle) = scheduled else {
                continue;
            };
            let counter = finished.clone();
            handle.on_complete(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                println!("{} priority job {} done", priority.name(), n);
            });
        }
    }

    let mut frame = 0;
    while finished.load(Ordering::SeqCst) < 9 && frame < 600 {
        if let Err(e) = jobs.update(FRAME / 4) {
            eprintln!("update failed: {e}");
            break;
        }
        thread::sleep(FRAME);
        frame += 1;
    }

    println!("{:?}", jobs.stats());
    jobs.shutdown();
}
