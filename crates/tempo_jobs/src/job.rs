//! Jobs
//!
//! A job is a unit of background work split into steps. Each call to
//! [`JobStep::step`] runs one slice and reports whether there is more to
//! do, so the scheduler can time-slice many jobs within a frame budget and
//! observe cancellation between steps.

use slotmap::new_key_type;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::flags::AsyncFlags;
use crate::handle::AsyncHandle;
use crate::shared::Shared;

new_key_type! {
    /// Generation-guarded id of a pooled job
    pub struct JobId;
}

/// Callback delivered on the main thread by the dispatcher
pub type MainCallback = Box<dyn FnOnce() + Send>;

/// What a job step asks for next
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobYield {
    /// Run another step when the job's turn comes again
    Continue,
    /// Do not step again before this much time has passed
    Sleep(Duration),
    /// The job is finished
    Done,
}

/// A job that runs in steps
pub trait JobStep: Send {
    fn step(&mut self, cx: &mut JobContext<'_>) -> JobYield;
}

impl<S: JobStep + ?Sized> JobStep for Box<S> {
    fn step(&mut self, cx: &mut JobContext<'_>) -> JobYield {
        (**self).step(cx)
    }
}

/// Access handed to a job while it steps
pub struct JobContext<'a> {
    shared: &'a Arc<Shared>,
    id: JobId,
    main_thread: bool,
}

impl<'a> JobContext<'a> {
    pub(crate) fn new(shared: &'a Arc<Shared>, id: JobId, main_thread: bool) -> Self {
        Self {
            shared,
            id,
            main_thread,
        }
    }

    /// Handle of the running job
    pub fn handle(&self) -> AsyncHandle {
        AsyncHandle::new(Arc::downgrade(self.shared), self.id)
    }

    /// Whether the job was cancelled while this step runs
    ///
    /// Long steps can poll this to bail out early; the job is disposed as
    /// soon as the step returns either way.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled(self.id)
    }

    /// Whether this step runs inside `JobScheduler::update`
    pub fn is_main_thread(&self) -> bool {
        self.main_thread
    }

    /// Schedule a nested job owned by this one
    ///
    /// Cancelling this job cancels the child too. A child scheduled after
    /// this job was cancelled never runs.
    pub fn schedule_child(&mut self, job: impl JobStep + 'static, flags: AsyncFlags) -> AsyncHandle {
        self.shared.insert(Box::new(job), flags, Some(self.id))
    }

    /// Schedule a nested one-shot closure
    pub fn schedule_child_fn(&mut self, f: impl FnOnce() + Send + 'static, flags: AsyncFlags) -> AsyncHandle {
        self.schedule_child(OnceJob(Some(f)), flags)
    }
}

/// A closure run once as a single-step job
pub(crate) struct OnceJob<F>(pub Option<F>);

impl<F: FnOnce() + Send> JobStep for OnceJob<F> {
    fn step(&mut self, _cx: &mut JobContext<'_>) -> JobYield {
        if let Some(f) = self.0.take() {
            f();
        }
        JobYield::Done
    }
}

/// A closure run once per step
pub struct StepFn<F> {
    f: F,
}

impl<F> JobStep for StepFn<F>
where
    F: FnMut(&mut JobContext<'_>) -> JobYield + Send,
{
    fn step(&mut self, cx: &mut JobContext<'_>) -> JobYield {
        (self.f)(cx)
    }
}

/// Build a stepped job from a closure
pub fn step_fn<F>(f: F) -> StepFn<F>
where
    F: FnMut(&mut JobContext<'_>) -> JobYield + Send,
{
    StepFn { f }
}

/// One pooled job
pub(crate) struct JobUnit {
    /// Checked out (`None`) while a step runs
    pub step: Option<Box<dyn JobStep>>,
    pub flags: AsyncFlags,
    pub cancelled: bool,
    pub executing: bool,
    pub sleep_until: Option<Instant>,
    pub parent: Option<JobId>,
    pub children: SmallVec<[JobId; 4]>,
    pub on_complete: SmallVec<[MainCallback; 1]>,
    pub on_stop: SmallVec<[MainCallback; 1]>,
}

impl JobUnit {
    pub fn new(step: Box<dyn JobStep>, flags: AsyncFlags, parent: Option<JobId>) -> Self {
        Self {
            step: Some(step),
            flags,
            cancelled: false,
            executing: false,
            sleep_until: None,
            parent,
            children: SmallVec::new(),
            on_complete: SmallVec::new(),
            on_stop: SmallVec::new(),
        }
    }
}
