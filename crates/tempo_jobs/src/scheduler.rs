//! Job scheduler
//!
//! [`JobScheduler`] owns the shared job state, the optional worker threads
//! and the main-thread dispatcher. The host calls [`JobScheduler::update`]
//! once per frame with a time budget; it runs queued callbacks, then
//! time-slices the main-thread queues (and the background queues when no
//! workers run) in tier order.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{JobError, Result};
use crate::flags::{AsyncFlags, AsyncPriority, TIER_COUNT};
use crate::handle::AsyncHandle;
use crate::job::{JobStep, OnceJob};
use crate::shared::{Lane, PanicHook, Shared, StepOutcome};
use crate::worker::Worker;

/// Worker thread strategy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Threading {
    /// One worker per tier when the machine has more than one core
    #[default]
    Auto,
    /// Every job runs inside `update` on the calling thread
    SingleThreaded,
}

/// Job scheduler configuration
#[derive(Clone)]
pub struct JobConfig {
    pub threading: Threading,
    /// Share of the frame budget per tier, indexed by [`AsyncPriority::index`]
    pub tier_weights: [f32; TIER_COUNT],
    /// How long shutdown waits for workers before detaching them
    pub join_timeout: Duration,
    /// Initial number of job slots
    pub initial_capacity: usize,
    pub panic_hook: Option<PanicHook>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            threading: Threading::Auto,
            tier_weights: [0.5, 0.35, 0.15],
            join_timeout: Duration::from_secs(1),
            initial_capacity: 16,
            panic_hook: None,
        }
    }
}

impl JobConfig {
    pub fn with_threading(mut self, threading: Threading) -> Self {
        self.threading = threading;
        self
    }

    /// Set the budget share of each tier (negative weights count as zero)
    pub fn with_tier_weights(mut self, weights: [f32; TIER_COUNT]) -> Self {
        self.tier_weights = weights.map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 });
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Report panics raised by job steps and callbacks
    pub fn with_panic_hook(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.panic_hook = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("threading", &self.threading)
            .field("tier_weights", &self.tier_weights)
            .field("join_timeout", &self.join_timeout)
            .field("initial_capacity", &self.initial_capacity)
            .field("panic_hook", &self.panic_hook.is_some())
            .finish()
    }
}

/// Queue and pool counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Background jobs waiting per tier
    pub queued: [usize; TIER_COUNT],
    /// Main-thread-only jobs waiting per tier
    pub main_thread_queued: [usize; TIER_COUNT],
    /// Live jobs, sleeping and executing ones included
    pub live: usize,
    /// Allocated job slots
    pub pooled_capacity: usize,
    /// Running worker threads
    pub workers: usize,
    /// Callbacks waiting for the next `update`
    pub pending_callbacks: usize,
}

/// Prioritized, time-sliced job scheduler
pub struct JobScheduler {
    config: JobConfig,
    shared: Arc<Shared>,
    workers: Vec<Worker>,
    shut_down: bool,
}

impl JobScheduler {
    pub fn new(config: JobConfig) -> Result<Self> {
        let shared = Arc::new(Shared::new(
            config.initial_capacity,
            config.panic_hook.clone(),
        ));

        let cores = thread::available_parallelism().map_or(1, |n| n.get());
        let threaded = config.threading == Threading::Auto && cores > 1;

        let mut scheduler = Self {
            config,
            shared,
            workers: Vec::new(),
            shut_down: false,
        };

        if threaded {
            for tier in AsyncPriority::ALL {
                // On failure, Drop stops the workers already running
                let worker = Worker::spawn(scheduler.shared.clone(), tier)?;
                scheduler.workers.push(worker);
            }
        }

        tracing::debug!(
            "Created job scheduler ({} workers, {} cores)",
            scheduler.workers.len(),
            cores
        );
        Ok(scheduler)
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Whether background jobs run on worker threads
    pub fn is_threaded(&self) -> bool {
        !self.workers.is_empty()
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Run a closure once as a job
    pub fn schedule(&self, f: impl FnOnce() + Send + 'static, flags: AsyncFlags) -> Result<AsyncHandle> {
        self.schedule_steps(OnceJob(Some(f)), flags)
    }

    /// Schedule a stepped job
    pub fn schedule_steps(&self, job: impl JobStep + 'static, flags: AsyncFlags) -> Result<AsyncHandle> {
        if self.shut_down || self.shared.is_shutting_down() {
            return Err(JobError::ShutDown);
        }
        Ok(self.shared.insert(Box::new(job), flags, None))
    }

    /// Cancel every job
    pub fn cancel_all(&self) -> usize {
        self.shared.cancel_all()
    }

    // ========================================================================
    // Frame update
    // ========================================================================

    /// Run queued callbacks and spend up to `budget` stepping jobs
    ///
    /// Each tier gets its weighted share of the budget plus whatever the
    /// tier before it left unspent. A non-empty tier always runs at least
    /// one step, so a zero budget still makes progress. Returns the number
    /// of job steps run.
    pub fn update(&mut self, budget: Duration) -> Result<usize> {
        if self.shut_down {
            return Err(JobError::ShutDown);
        }

        self.drain_callbacks();

        let mut steps = 0;
        let mut carry = Duration::ZERO;
        for tier in AsyncPriority::ALL {
            let tier_budget = tier_share(budget, self.config.tier_weights[tier.index()]) + carry;
            let started = Instant::now();

            steps += self.run_lane(Lane::MainThread, tier, started, tier_budget);
            if self.workers.is_empty() {
                steps += self.run_lane(Lane::Background, tier, started, tier_budget);
            }

            carry = tier_budget.saturating_sub(started.elapsed());
        }

        self.drain_callbacks();
        Ok(steps)
    }

    /// Step jobs of one queue until the tier budget runs out
    fn run_lane(&self, lane: Lane, tier: AsyncPriority, started: Instant, budget: Duration) -> usize {
        let mut steps = 0;
        let mut sleepers = 0;

        loop {
            if steps > 0 && started.elapsed() >= budget {
                break;
            }
            let (id, queued) = {
                let mut state = self.shared.state.lock();
                let queued = state.queued(lane, tier);
                (state.pop(lane, tier), queued)
            };
            let Some(id) = id else {
                break;
            };

            match self.shared.run_step(id, true) {
                StepOutcome::Stale => {}
                StepOutcome::Sleeping(_) => {
                    sleepers += 1;
                    if sleepers >= queued {
                        break;
                    }
                }
                StepOutcome::Pending | StepOutcome::Finished => {
                    steps += 1;
                    sleepers = 0;
                }
            }
        }

        if steps > 0 {
            tracing::trace!("Ran {} {:?} steps in {} tier", steps, lane, tier.name());
        }
        steps
    }

    fn drain_callbacks(&self) -> usize {
        let shared = &self.shared;
        shared.dispatcher.drain(|message| {
            tracing::error!("Job callback panicked: {}", message);
            shared.report_panic(message);
        })
    }

    // ========================================================================
    // Shutdown
    // ========================================================================

    /// Stop the workers and cancel every remaining job
    ///
    /// Workers get `join_timeout` in total to finish their current step;
    /// stragglers are detached. Stop callbacks of cancelled jobs run before
    /// this returns. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        {
            let _state = self.shared.state.lock();
            self.shared.shutting_down.store(true, Ordering::Release);
        }
        self.shared.work_ready.notify_all();

        let deadline = Instant::now() + self.config.join_timeout;
        let workers = std::mem::take(&mut self.workers);
        let total = workers.len();
        let joined = workers
            .into_iter()
            .map(|worker| worker.join_until(deadline))
            .filter(|joined| *joined)
            .count();

        let cancelled = self.shared.cancel_all();
        self.drain_callbacks();
        tracing::debug!(
            "Job scheduler shut down ({}/{} workers joined, {} jobs cancelled)",
            joined,
            total,
            cancelled
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub fn stats(&self) -> JobStats {
        let state = self.shared.state.lock();
        let mut stats = JobStats {
            live: state.units.len(),
            pooled_capacity: state.units.capacity(),
            workers: self.workers.len(),
            ..JobStats::default()
        };
        for tier in AsyncPriority::ALL {
            stats.queued[tier.index()] = state.queued(Lane::Background, tier);
            stats.main_thread_queued[tier.index()] = state.queued(Lane::MainThread, tier);
        }
        drop(state);
        stats.pending_callbacks = self.shared.dispatcher.len();
        stats
    }
}

/// `budget * weight`, zero for weights that are not positive and finite
fn tier_share(budget: Duration, weight: f32) -> Duration {
    Duration::try_from_secs_f32(budget.as_secs_f32() * weight).unwrap_or(Duration::ZERO)
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobScheduler")
            .field("workers", &self.workers.len())
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
