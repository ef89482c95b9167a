//! The capability surface a running task sees.
//!
//! There is no ambient "current task": every resume receives an explicit
//! [`TaskCx`] handle, and every scheduler interaction goes through it.
//! The handle borrows the reactor's internals for exactly the duration of
//! one resume, so call sites can never disagree about which context is
//! current.

use crate::program::{Program, TaskFault};
use crate::scheduler::clock::VirtualTime;
use crate::scheduler::context::TaskId;
use crate::scheduler::reactor::{admit, Contexts, ReactorStats};
use crate::scheduler::timer::TimerQueue;
use crate::value::Value;
use std::sync::Arc;

/// The fixed capability bundle shared by every task.
///
/// Built once at startup and handed (behind an `Arc`) to each new context
/// at creation; read-mostly thereafter. The callable capabilities,
/// `sleep` and `thread.spawn`, live on [`TaskCx`], which every resume
/// receives.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Constant descriptive string exposed to every task.
    pub welcome: String,
}

impl Capabilities {
    /// Build a bundle with the given welcome constant.
    pub fn new(welcome: impl Into<String>) -> Self {
        Self {
            welcome: welcome.into(),
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::new("Hello World!")
    }
}

/// Synchronous Task API failure. The calling task keeps running; nothing
/// was armed or spawned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// `sleep` was called with a non-finite or negative duration.
    #[error("invalid sleep duration: {0}")]
    InvalidDuration(f64),

    /// `spawn` would exceed the configured live-task limit.
    #[error("task limit reached: {0} live tasks")]
    TaskLimit(usize),
}

/// Result alias for Task API calls.
pub type ApiResult<T> = Result<T, ApiError>;

impl From<ApiError> for TaskFault {
    fn from(err: ApiError) -> Self {
        TaskFault::runtime(err.to_string())
    }
}

/// Explicit handle on the scheduler for the context currently being
/// resumed. Valid for one resume only.
pub struct TaskCx<'a> {
    pub(crate) task: TaskId,
    pub(crate) now: VirtualTime,
    pub(crate) timers: &'a mut TimerQueue,
    pub(crate) contexts: &'a mut Contexts,
    pub(crate) next_task_id: &'a mut u64,
    pub(crate) caps: Arc<Capabilities>,
    pub(crate) max_tasks: Option<usize>,
    pub(crate) stats: &'a mut ReactorStats,
}

impl<'a> TaskCx<'a> {
    /// Id of the running context.
    pub fn task_id(&self) -> TaskId {
        self.task
    }

    /// Virtual time of the current reactor iteration.
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// The shared capability table.
    pub fn caps(&self) -> &Capabilities {
        &self.caps
    }

    /// The shared welcome constant.
    pub fn welcome(&self) -> &str {
        &self.caps.welcome
    }

    /// Arm a wake-up `seconds` from now and request suspension.
    ///
    /// `seconds` must be finite and non-negative, otherwise
    /// [`ApiError::InvalidDuration`] is returned, no timer is armed, and
    /// the task keeps running. On success the program must return
    /// [`Outcome::Yielded`](crate::program::Outcome::Yielded); the reactor
    /// resumes it once the deadline passes. Calling `sleep` again before
    /// yielding supersedes the earlier wake-up.
    pub fn sleep(&mut self, seconds: f64) -> ApiResult<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(ApiError::InvalidDuration(seconds));
        }
        let delay_ms = (seconds * 1000.0) as u64;
        self.timers.schedule(self.task, delay_ms, self.now);
        tracing::trace!(task = %self.task, delay_ms, "sleep armed");
        Ok(())
    }

    /// The nested `thread` capability namespace.
    pub fn thread(&mut self) -> ThreadCx<'_, 'a> {
        ThreadCx { cx: self }
    }
}

/// The `thread` sub-namespace of the capability table.
pub struct ThreadCx<'s, 'a> {
    cx: &'s mut TaskCx<'a>,
}

impl ThreadCx<'_, '_> {
    /// Create a sibling context running `program` and request suspension.
    ///
    /// The child gets a fresh private namespace, the shared capability
    /// table, and `args` forwarded to its first resume. Its wake-up is
    /// armed near-immediately (delay 0) and the caller is re-armed right
    /// behind it, so on the next reactor iteration the child runs first
    /// and the spawner continues after it. The program must return
    /// [`Outcome::Yielded`](crate::program::Outcome::Yielded) after this
    /// call, exactly as for `sleep`.
    ///
    /// Fire-and-forget: the returned id identifies the child for tracing
    /// but carries no join or cancellation capability.
    pub fn spawn(&mut self, program: Box<dyn Program>, args: Vec<Value>) -> ApiResult<TaskId> {
        let cx = &mut *self.cx;
        if let Some(max) = cx.max_tasks {
            // The caller is detached from the arena while it runs.
            let live = cx.contexts.len() + 1;
            if live >= max {
                return Err(ApiError::TaskLimit(live));
            }
        }
        let child = admit(
            cx.contexts,
            cx.next_task_id,
            cx.timers,
            cx.now,
            program,
            args,
            Arc::clone(&cx.caps),
            Some(cx.task),
            cx.stats,
        );
        // Park the spawner behind the child at the same deadline; FIFO
        // tie-break guarantees the child's first resume happens first.
        cx.timers.schedule(cx.task, 0, cx.now);
        Ok(child)
    }
}
