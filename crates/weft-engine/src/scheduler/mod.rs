//! Task scheduling: virtual clock, timer queue, contexts, and the
//! reactor loop that ties them together.
//!
//! Everything here runs on one thread. The reactor owns the live-context
//! arena and the timer queue outright; a task only ever touches them
//! through the [`TaskCx`](crate::api::TaskCx) handle it is resumed with.

pub(crate) mod clock;
pub(crate) mod context;
pub(crate) mod reactor;
pub(crate) mod timer;

pub use clock::{VirtualClock, VirtualTime};
pub use context::{Context, Namespace, TaskId, TaskState};
pub use reactor::{Completion, Reactor, ReactorConfig, ReactorStats};
pub use timer::{TimerHandle, TimerQueue};
